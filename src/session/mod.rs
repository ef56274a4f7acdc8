pub mod registry;

use crate::game::types::{ActorId, Direction};
use crate::game::world::{RegisterError, World};
use crate::protocol::ServerMessage;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
  #[error("session {0} does not exist")]
  UnknownSession(String),
  #[error("session {0} already exists")]
  AlreadyExists(String),
  #[error("invalid session: {0}")]
  Invalid(String),
  #[error("session {0} has shut down")]
  Closed(String),
  #[error(transparent)]
  Register(#[from] RegisterError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
  Player(ActorId),
  Observer,
}

#[derive(Debug)]
enum SessionCommand {
  Join {
    connection_id: Uuid,
    actor_id: ActorId,
    sender: UnboundedSender<String>,
    reply: oneshot::Sender<Result<(), RegisterError>>,
  },
  Observe {
    connection_id: Uuid,
    sender: UnboundedSender<String>,
  },
  Input {
    connection_id: Uuid,
    actor_id: ActorId,
    direction: Direction,
  },
  Detach {
    connection_id: Uuid,
  },
}

#[derive(Debug, Default)]
struct SessionStats {
  players: AtomicUsize,
  observers: AtomicUsize,
  ticks: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
  pub session_id: String,
  pub rows: i32,
  pub cols: i32,
  pub players: usize,
  pub observers: usize,
  pub tick: u64,
}

#[derive(Debug)]
pub struct Session {
  name: String,
  rows: i32,
  cols: i32,
  commands: UnboundedSender<SessionCommand>,
  stats: Arc<SessionStats>,
  shutdown: watch::Sender<bool>,
  task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
  pub fn spawn(name: String, world: World, tick_interval: Duration) -> Arc<Self> {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stats = Arc::new(SessionStats::default());
    let rows = world.config().rows;
    let cols = world.config().cols;

    let runner = SessionRunner {
      name: name.clone(),
      world,
      connections: HashMap::new(),
      stats: Arc::clone(&stats),
    };
    let task = tokio::spawn(runner.run(commands_rx, shutdown_rx, tick_interval));
    tracing::info!(session = %name, rows, cols, "session started");

    Arc::new(Self {
      name,
      rows,
      cols,
      commands: commands_tx,
      stats,
      shutdown: shutdown_tx,
      task: Mutex::new(Some(task)),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn summary(&self) -> SessionSummary {
    SessionSummary {
      session_id: self.name.clone(),
      rows: self.rows,
      cols: self.cols,
      players: self.stats.players.load(Ordering::Relaxed),
      observers: self.stats.observers.load(Ordering::Relaxed),
      tick: self.stats.ticks.load(Ordering::Relaxed),
    }
  }

  pub async fn join(
    &self,
    connection_id: Uuid,
    actor_id: ActorId,
    sender: UnboundedSender<String>,
  ) -> Result<(), SessionError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self.send(SessionCommand::Join {
      connection_id,
      actor_id,
      sender,
      reply: reply_tx,
    })?;
    let result = reply_rx.await.map_err(|_| self.closed())?;
    result.map_err(SessionError::from)
  }

  pub fn observe(
    &self,
    connection_id: Uuid,
    sender: UnboundedSender<String>,
  ) -> Result<(), SessionError> {
    self.send(SessionCommand::Observe {
      connection_id,
      sender,
    })
  }

  pub fn enqueue_input(
    &self,
    connection_id: Uuid,
    actor_id: ActorId,
    direction: Direction,
  ) -> Result<(), SessionError> {
    self.send(SessionCommand::Input {
      connection_id,
      actor_id,
      direction,
    })
  }

  pub fn detach(&self, connection_id: Uuid) {
    let _ = self.send(SessionCommand::Detach { connection_id });
  }

  pub async fn shutdown(&self) {
    let _ = self.shutdown.send(true);
    let Some(task) = self.task.lock().await.take() else { return };
    if let Err(error) = task.await {
      tracing::warn!(session = %self.name, ?error, "session task ended abnormally");
    }
  }

  fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
    self.commands.send(command).map_err(|_| self.closed())
  }

  fn closed(&self) -> SessionError {
    SessionError::Closed(self.name.clone())
  }
}

#[derive(Debug)]
struct Connection {
  sender: UnboundedSender<String>,
  role: Role,
}

struct SessionRunner {
  name: String,
  world: World,
  connections: HashMap<Uuid, Connection>,
  stats: Arc<SessionStats>,
}

impl SessionRunner {
  async fn run(
    mut self,
    mut commands: UnboundedReceiver<SessionCommand>,
    mut shutdown: watch::Receiver<bool>,
    tick_interval: Duration,
  ) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      tokio::select! {
        biased;
        _ = shutdown.changed() => break,
        _ = interval.tick() => self.tick(),
        command = commands.recv() => match command {
          Some(command) => self.apply(command),
          None => break,
        },
      }
    }
    tracing::info!(session = %self.name, ticks = self.world.ticks(), "session stopped");
  }

  fn apply(&mut self, command: SessionCommand) {
    match command {
      SessionCommand::Join {
        connection_id,
        actor_id,
        sender,
        reply,
      } => {
        let result = self.world.register(actor_id);
        if result.is_ok() {
          let name = self.name.clone();
          let config = *self.world.config();
          let greeting = ServerMessage::Joined {
            session_id: &name,
            user_id: actor_id,
            rows: config.rows,
            cols: config.cols,
          };
          self.release_owner(actor_id);
          self.attach(connection_id, sender, Role::Player(actor_id), &greeting);
          tracing::info!(session = %self.name, actor_id, %connection_id, "player joined");
        }
        let _ = reply.send(result);
      }
      SessionCommand::Observe {
        connection_id,
        sender,
      } => {
        let name = self.name.clone();
        let config = *self.world.config();
        let greeting = ServerMessage::Observing {
          session_id: &name,
          rows: config.rows,
          cols: config.cols,
        };
        self.attach(connection_id, sender, Role::Observer, &greeting);
        tracing::info!(session = %self.name, %connection_id, "observer joined");
      }
      SessionCommand::Input {
        connection_id,
        actor_id,
        direction,
      } => {
        let owns = self
          .connections
          .get(&connection_id)
          .is_some_and(|connection| connection.role == Role::Player(actor_id));
        if owns {
          self.world.enqueue_input(actor_id, direction);
        } else {
          tracing::debug!(
            session = %self.name,
            actor_id,
            %connection_id,
            "input from non-owner dropped"
          );
        }
      }
      SessionCommand::Detach { connection_id } => self.detach(connection_id),
    }
  }

  fn attach(
    &mut self,
    connection_id: Uuid,
    sender: UnboundedSender<String>,
    role: Role,
    greeting: &ServerMessage<'_>,
  ) {
    match greeting.encode() {
      Ok(payload) => {
        let _ = sender.send(payload);
      }
      Err(error) => tracing::error!(session = %self.name, %error, "failed to encode greeting"),
    }
    self.connections.insert(connection_id, Connection { sender, role });
    self.refresh_counts();
  }

  // A dead player's connection stays attached. If the id is taken again the
  // old connection only watches from then on.
  fn release_owner(&mut self, actor_id: ActorId) {
    for (connection_id, connection) in &mut self.connections {
      if connection.role == Role::Player(actor_id) {
        connection.role = Role::Observer;
        tracing::debug!(session = %self.name, actor_id, %connection_id, "previous owner demoted");
      }
    }
  }

  fn detach(&mut self, connection_id: Uuid) {
    let Some(connection) = self.connections.remove(&connection_id) else { return };
    if let Role::Player(actor_id) = connection.role {
      self.world.remove(actor_id);
    }
    tracing::info!(session = %self.name, %connection_id, "connection left");
    self.refresh_counts();
  }

  fn refresh_counts(&self) {
    let players = self
      .connections
      .values()
      .filter(|connection| matches!(connection.role, Role::Player(_)))
      .count();
    let observers = self.connections.len() - players;
    self.stats.players.store(players, Ordering::Relaxed);
    self.stats.observers.store(observers, Ordering::Relaxed);
  }

  fn tick(&mut self) {
    self.world.tick();
    self.stats.ticks.store(self.world.ticks(), Ordering::Relaxed);
    self.broadcast_state();
  }

  fn broadcast_state(&mut self) {
    let snapshot = self.world.snapshot();
    let payload = match ServerMessage::Tick(&snapshot).encode() {
      Ok(payload) => payload,
      Err(error) => {
        tracing::error!(session = %self.name, %error, "failed to encode tick");
        return;
      }
    };
    let mut stale = Vec::new();
    for (connection_id, connection) in &self.connections {
      if connection.sender.send(payload.clone()).is_err() {
        stale.push(*connection_id);
      }
    }
    for connection_id in stale {
      tracing::debug!(session = %self.name, %connection_id, "dropping closed connection");
      self.detach(connection_id);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::game::world::WorldConfig;
  use serde_json::Value;
  use tokio::time::timeout;

  fn small_world() -> World {
    World::with_seed(
      WorldConfig {
        rows: 40,
        cols: 40,
        initial_length: 8,
        apples_per_snake: 2,
        max_register_attempts: 64,
      },
      5,
    )
  }

  fn spawn_session() -> Arc<Session> {
    Session::spawn("unit".to_string(), small_world(), Duration::from_millis(10))
  }

  async fn next_message(rx: &mut UnboundedReceiver<String>) -> Value {
    let text = timeout(Duration::from_secs(2), rx.recv())
      .await
      .expect("message should arrive")
      .expect("channel should be open");
    serde_json::from_str(&text).unwrap()
  }

  async fn next_tick(rx: &mut UnboundedReceiver<String>) -> Value {
    loop {
      let message = next_message(rx).await;
      if message["type"] == "tick" {
        return message;
      }
    }
  }

  #[tokio::test]
  async fn join_greets_then_streams_ticks() {
    let session = spawn_session();
    let (tx, mut rx) = mpsc::unbounded_channel();
    session.join(Uuid::new_v4(), 7, tx).await.unwrap();

    let greeting = next_message(&mut rx).await;
    assert_eq!(greeting["type"], "joined");
    assert_eq!(greeting["user_id"], 7);
    assert_eq!(greeting["rows"], 40);

    let tick = next_tick(&mut rx).await;
    assert_eq!(tick["snakes"]["7"]["cells"].as_array().unwrap().len(), 8);
    assert_eq!(session.summary().players, 1);

    session.shutdown().await;
  }

  #[tokio::test]
  async fn duplicate_join_is_rejected() {
    let session = spawn_session();
    let (tx, _rx) = mpsc::unbounded_channel();
    session.join(Uuid::new_v4(), 1, tx.clone()).await.unwrap();
    let error = session.join(Uuid::new_v4(), 1, tx).await.unwrap_err();
    assert!(matches!(
      error,
      SessionError::Register(RegisterError::AlreadyRegistered(1))
    ));
    session.shutdown().await;
  }

  #[tokio::test]
  async fn input_turns_the_snake() {
    let session = spawn_session();
    let player = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    session.join(player, 3, tx).await.unwrap();

    let tick = next_tick(&mut rx).await;
    let heading: Direction =
      serde_json::from_value(tick["snakes"]["3"]["direction"].clone()).unwrap();
    let turn = match heading {
      Direction::Up | Direction::Down => Direction::Left,
      Direction::Left | Direction::Right => Direction::Up,
    };
    session.enqueue_input(player, 3, turn).unwrap();

    let expected = serde_json::to_value(turn).unwrap();
    loop {
      let tick = next_tick(&mut rx).await;
      if tick["snakes"]["3"]["direction"] == expected {
        break;
      }
    }
    session.shutdown().await;
  }

  #[tokio::test]
  async fn detaching_a_player_removes_the_snake() {
    let session = spawn_session();
    let player = Uuid::new_v4();
    let (player_tx, _player_rx) = mpsc::unbounded_channel();
    session.join(player, 9, player_tx).await.unwrap();

    let (observer_tx, mut observer_rx) = mpsc::unbounded_channel();
    session.observe(Uuid::new_v4(), observer_tx).unwrap();
    assert_eq!(next_message(&mut observer_rx).await["type"], "observing");
    assert!(next_tick(&mut observer_rx).await["snakes"].get("9").is_some());

    session.detach(player);
    loop {
      let tick = next_tick(&mut observer_rx).await;
      if tick["snakes"].get("9").is_none() {
        assert!(tick["apples"].as_array().unwrap().len() >= 8);
        break;
      }
    }
    assert_eq!(session.summary().players, 0);
    assert_eq!(session.summary().observers, 1);
    session.shutdown().await;
  }

  #[tokio::test]
  async fn shutdown_stops_ticks_and_closes_connections() {
    let session = spawn_session();
    let (tx, mut rx) = mpsc::unbounded_channel();
    session.observe(Uuid::new_v4(), tx).unwrap();
    next_tick(&mut rx).await;

    session.shutdown().await;
    let ticks = session.summary().tick;

    while rx.recv().await.is_some() {}
    assert_eq!(session.summary().tick, ticks);
    assert!(matches!(
      session.enqueue_input(Uuid::new_v4(), 1, Direction::Up),
      Err(SessionError::Closed(_))
    ));
    // Second shutdown is a no-op.
    session.shutdown().await;
  }

  #[tokio::test]
  async fn rejoining_a_dead_id_takes_ownership_from_the_old_connection() {
    let session = Session::spawn(
      "rejoin".to_string(),
      World::with_seed(
        WorldConfig {
          rows: 12,
          cols: 12,
          initial_length: 4,
          apples_per_snake: 1,
          max_register_attempts: 64,
        },
        11,
      ),
      Duration::from_millis(10),
    );

    let first = Uuid::new_v4();
    let (first_tx, mut first_rx) = mpsc::unbounded_channel();
    session.join(first, 5, first_tx).await.unwrap();
    loop {
      let tick = next_tick(&mut first_rx).await;
      if tick["deaths"].as_array().unwrap().contains(&Value::from(5)) {
        break;
      }
    }

    let second = Uuid::new_v4();
    let (second_tx, mut second_rx) = mpsc::unbounded_channel();
    session.join(second, 5, second_tx).await.unwrap();
    assert_eq!(next_message(&mut second_rx).await["type"], "joined");
    let tick = next_tick(&mut second_rx).await;
    let heading = tick["snakes"]["5"]["direction"].clone();
    let turn = match serde_json::from_value::<Direction>(heading.clone()).unwrap() {
      Direction::Up | Direction::Down => Direction::Left,
      Direction::Left | Direction::Right => Direction::Up,
    };

    session.enqueue_input(first, 5, turn).unwrap();
    session.detach(first);

    for _ in 0..2 {
      let tick = next_tick(&mut second_rx).await;
      assert_eq!(tick["snakes"]["5"]["direction"], heading);
    }
    assert_eq!(session.summary().players, 1);
    assert_eq!(session.summary().observers, 0);
    session.shutdown().await;
  }
}
