use super::apples::ApplePool;
use super::board::{Board, Occupant};
use super::constants::{
  DEFAULT_COLS, DEFAULT_ROWS, MAX_APPLES_PER_SNAKE, MAX_REGISTER_ATTEMPTS, MIN_SPAWN_DISTANCE,
  SNAKE_LENGTH_INITIAL,
};
use super::input::InputQueue;
use super::snake::Snake;
use super::types::{ActorId, Cell, Direction, SnakeSnapshot, WorldSnapshot};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldConfig {
  pub rows: i32,
  pub cols: i32,
  pub initial_length: usize,
  pub apples_per_snake: usize,
  pub max_register_attempts: usize,
}

impl Default for WorldConfig {
  fn default() -> Self {
    Self {
      rows: DEFAULT_ROWS,
      cols: DEFAULT_COLS,
      initial_length: SNAKE_LENGTH_INITIAL,
      apples_per_snake: MAX_APPLES_PER_SNAKE,
      max_register_attempts: MAX_REGISTER_ATTEMPTS,
    }
  }
}

impl WorldConfig {
  pub fn fits_spawn_margin(&self) -> bool {
    let margin = self.initial_length as i64;
    margin > 0 && self.rows as i64 > margin * 2 && self.cols as i64 > margin * 2
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
  #[error("snake {0} is already on the board")]
  AlreadyRegistered(ActorId),
  #[error("no free placement for snake {actor_id} after {attempts} attempts")]
  NoFreePlacement { actor_id: ActorId, attempts: usize },
}

#[derive(Debug)]
pub struct World {
  config: WorldConfig,
  board: Board,
  snakes: BTreeMap<ActorId, Snake>,
  apples: ApplePool,
  inputs: HashMap<ActorId, InputQueue>,
  deaths: Vec<ActorId>,
  ticks: u64,
  rng: StdRng,
}

impl World {
  pub fn new(config: WorldConfig) -> Self {
    Self::with_rng(config, StdRng::from_entropy())
  }

  pub fn with_seed(config: WorldConfig, seed: u64) -> Self {
    Self::with_rng(config, StdRng::seed_from_u64(seed))
  }

  fn with_rng(config: WorldConfig, rng: StdRng) -> Self {
    Self {
      config,
      board: Board::new(config.rows, config.cols),
      snakes: BTreeMap::new(),
      apples: ApplePool::new(),
      inputs: HashMap::new(),
      deaths: Vec::new(),
      ticks: 0,
      rng,
    }
  }

  pub fn config(&self) -> &WorldConfig {
    &self.config
  }

  pub fn board(&self) -> &Board {
    &self.board
  }

  pub fn apples(&self) -> &ApplePool {
    &self.apples
  }

  pub fn snake(&self, actor_id: ActorId) -> Option<&Snake> {
    self.snakes.get(&actor_id)
  }

  pub fn snakes(&self) -> impl Iterator<Item = &Snake> {
    self.snakes.values()
  }

  pub fn snake_count(&self) -> usize {
    self.snakes.len()
  }

  pub fn deaths(&self) -> &[ActorId] {
    &self.deaths
  }

  pub fn ticks(&self) -> u64 {
    self.ticks
  }

  pub fn register(&mut self, actor_id: ActorId) -> Result<(), RegisterError> {
    if self.snakes.contains_key(&actor_id) {
      return Err(RegisterError::AlreadyRegistered(actor_id));
    }

    let attempts = self.config.max_register_attempts;
    // Spacing from other snakes is only a preference; late attempts take any
    // free run.
    let spaced_attempts = attempts / 2;
    for attempt in 0..attempts {
      let Some(snake) = self.propose_snake(actor_id) else { continue };
      if attempt < spaced_attempts && self.is_snake_too_close(&snake) {
        continue;
      }
      tracing::debug!(
        actor_id,
        attempt,
        head = ?snake.head(),
        heading = ?snake.heading,
        "snake registered"
      );
      self.insert_snake(snake);
      return Ok(());
    }

    tracing::debug!(actor_id, attempts, "snake placement exhausted");
    Err(RegisterError::NoFreePlacement { actor_id, attempts })
  }

  pub fn enqueue_input(&mut self, actor_id: ActorId, direction: Direction) {
    let Some(queue) = self.inputs.get_mut(&actor_id) else { return };
    queue.push(direction);
  }

  // Not reported in `deaths`.
  pub fn remove(&mut self, actor_id: ActorId) -> bool {
    if !self.snakes.contains_key(&actor_id) {
      return false;
    }
    self.kill(actor_id);
    tracing::debug!(actor_id, "snake removed");
    true
  }

  pub fn tick(&mut self) {
    let target = self
      .apples
      .target(&self.board, self.snakes.len(), self.config.apples_per_snake);
    self.apples.replenish(&mut self.board, target, &mut self.rng);

    self.ensure_inputs_match_snakes();

    // Ascending id order. Each move is written to the board before the next
    // snake looks, so the lower id wins a cell two heads reach together.
    let snake_ids: Vec<ActorId> = self.snakes.keys().copied().collect();
    let mut dead = Vec::new();
    for id in snake_ids {
      if !self.advance_snake(id) {
        dead.push(id);
      }
    }

    for id in &dead {
      self.kill(*id);
      tracing::debug!(actor_id = *id, tick = self.ticks, "snake died");
    }
    self.deaths = dead;
    self.ticks += 1;

    if cfg!(debug_assertions) {
      if let Some(violation) = self.consistency_violation() {
        invariant_violation(&violation);
      }
    }
  }

  pub fn snapshot(&self) -> WorldSnapshot {
    let snakes = self
      .snakes
      .iter()
      .map(|(id, snake)| {
        (
          *id,
          SnakeSnapshot {
            direction: snake.heading,
            cells: snake.body.iter().copied().collect(),
          },
        )
      })
      .collect();
    WorldSnapshot {
      snakes,
      apples: self.apples.iter().collect(),
      deaths: self.deaths.clone(),
    }
  }

  fn advance_snake(&mut self, id: ActorId) -> bool {
    let Some(snake) = self.snakes.get_mut(&id) else { return true };
    if let Some(queue) = self.inputs.get_mut(&id) {
      snake.heading = queue.resolve(snake.heading);
    }

    let next_head = snake.next_head();
    match self.board.get(next_head) {
      None | Some(Occupant::Snake(_)) => return false,
      Some(Occupant::Apple) => {
        if !self.apples.take(next_head) {
          invariant_violation(&format!("board apple at {next_head:?} missing from pool"));
        }
        snake.swallow();
      }
      Some(Occupant::Empty) => {}
    }

    let (evicted, head) = snake.step();
    self.board.set(head, Occupant::Snake(id));
    if let Some(evicted) = evicted {
      self.board.set(evicted, Occupant::Empty);
    }
    true
  }

  fn kill(&mut self, actor_id: ActorId) {
    let Some(snake) = self.snakes.remove(&actor_id) else { return };
    self.inputs.remove(&actor_id);
    for cell in snake.body {
      if self.board.get(cell) != Some(Occupant::Snake(actor_id)) {
        invariant_violation(&format!(
          "snake {actor_id} body cell {cell:?} tagged {:?}",
          self.board.get(cell)
        ));
      }
      self.apples.place(&mut self.board, cell);
    }
  }

  fn propose_snake(&mut self, actor_id: ActorId) -> Option<Snake> {
    if !self.config.fits_spawn_margin() {
      return None;
    }
    let margin = self.config.initial_length as i32;
    let anchor = Cell::new(
      self.rng.gen_range(margin..self.board.rows() - margin),
      self.rng.gen_range(margin..self.board.cols() - margin),
    );
    let heading = *Direction::ALL.choose(&mut self.rng)?;

    // Lay the body out behind the anchor so the head ends on it.
    let mut body = VecDeque::with_capacity(self.config.initial_length);
    let mut cell = anchor;
    for _ in 0..self.config.initial_length {
      if !self.board.in_bounds(cell) || self.board.is_snake(cell) {
        return None;
      }
      body.push_front(cell);
      cell = cell.step(heading.opposite());
    }
    Some(Snake::new(actor_id, heading, body))
  }

  fn is_snake_too_close(&self, candidate: &Snake) -> bool {
    self
      .snakes
      .values()
      .any(|snake| snake.approx_distance(candidate) < MIN_SPAWN_DISTANCE)
  }

  fn insert_snake(&mut self, snake: Snake) {
    for cell in &snake.body {
      self.apples.take(*cell);
      self.board.set(*cell, Occupant::Snake(snake.id));
    }
    self.inputs.insert(snake.id, InputQueue::new());
    self.snakes.insert(snake.id, snake);
  }

  fn ensure_inputs_match_snakes(&self) {
    if let Some(orphan) = self.inputs.keys().find(|id| !self.snakes.contains_key(id)) {
      invariant_violation(&format!("input queue for unknown snake {orphan}"));
    }
  }

  pub fn consistency_violation(&self) -> Option<String> {
    let mut expected: HashMap<Cell, Occupant> = HashMap::new();
    for snake in self.snakes.values() {
      for cell in &snake.body {
        if let Some(previous) = expected.insert(*cell, Occupant::Snake(snake.id)) {
          return Some(format!(
            "cell {cell:?} claimed by snake {} and {previous:?}",
            snake.id
          ));
        }
      }
    }
    for cell in self.apples.iter() {
      if let Some(previous) = expected.insert(cell, Occupant::Apple) {
        return Some(format!("apple at {cell:?} overlaps {previous:?}"));
      }
    }
    for (cell, occupant) in self.board.iter() {
      let wanted = expected.get(&cell).copied().unwrap_or(Occupant::Empty);
      if occupant != wanted {
        return Some(format!("board has {occupant:?} at {cell:?}, expected {wanted:?}"));
      }
    }
    if expected.len() != self.board.iter().filter(|(_, o)| *o != Occupant::Empty).count() {
      return Some("snake or apple cell outside the board".to_string());
    }
    None
  }
}

fn invariant_violation(message: &str) -> ! {
  tracing::error!(violation = message, "world state desynchronized");
  panic!("world state desynchronized: {message}");
}
