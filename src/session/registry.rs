use super::{Session, SessionError, SessionSummary};
use crate::game::world::{World, WorldConfig};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

const MAX_SESSION_NAME_LENGTH: usize = 64;
const MAX_GRID_SIDE: i32 = 500;

/// Every live session in the process. Owned by the server and handed to
/// handlers through router state.
#[derive(Debug)]
pub struct SessionRegistry {
  sessions: DashMap<String, Arc<Session>>,
  world: WorldConfig,
  tick_interval: Duration,
}

impl SessionRegistry {
  pub fn new(world: WorldConfig, tick_interval: Duration) -> Self {
    Self {
      sessions: DashMap::new(),
      world,
      tick_interval,
    }
  }

  /// Starts a new session. `rows`/`cols` override the server default size.
  pub fn create(
    &self,
    name: &str,
    rows: Option<i32>,
    cols: Option<i32>,
  ) -> Result<Arc<Session>, SessionError> {
    let name = sanitize_session_name(name)?;
    let config = WorldConfig {
      rows: rows.unwrap_or(self.world.rows),
      cols: cols.unwrap_or(self.world.cols),
      ..self.world
    };
    if config.rows > MAX_GRID_SIDE || config.cols > MAX_GRID_SIDE || !config.fits_spawn_margin() {
      return Err(SessionError::Invalid(format!(
        "{}x{} board is outside the supported size",
        config.rows, config.cols
      )));
    }

    match self.sessions.entry(name) {
      Entry::Occupied(entry) => Err(SessionError::AlreadyExists(entry.key().clone())),
      Entry::Vacant(entry) => {
        let session = Session::spawn(entry.key().clone(), World::new(config), self.tick_interval);
        entry.insert(Arc::clone(&session));
        Ok(session)
      }
    }
  }

  pub fn get(&self, name: &str) -> Result<Arc<Session>, SessionError> {
    self
      .sessions
      .get(name.trim())
      .map(|entry| Arc::clone(entry.value()))
      .ok_or_else(|| SessionError::UnknownSession(name.to_string()))
  }

  /// Removes the session and waits for its task to finish.
  pub async fn destroy(&self, name: &str) -> Result<(), SessionError> {
    let (_, session) = self
      .sessions
      .remove(name.trim())
      .ok_or_else(|| SessionError::UnknownSession(name.to_string()))?;
    session.shutdown().await;
    tracing::info!(session = %session.name(), "session destroyed");
    Ok(())
  }

  pub fn list(&self) -> Vec<SessionSummary> {
    let mut summaries: Vec<SessionSummary> = self
      .sessions
      .iter()
      .map(|entry| entry.value().summary())
      .collect();
    summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
    summaries
  }

  pub async fn shutdown_all(&self) {
    let names: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
    for name in names {
      let _ = self.destroy(&name).await;
    }
  }
}

fn sanitize_session_name(value: &str) -> Result<String, SessionError> {
  let trimmed = value.trim();
  let valid = !trimmed.is_empty()
    && trimmed.len() <= MAX_SESSION_NAME_LENGTH
    && trimmed
      .chars()
      .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
  if !valid {
    return Err(SessionError::Invalid(format!("bad session name {value:?}")));
  }
  Ok(trimmed.to_string())
}
