use super::types::Direction;
use std::collections::VecDeque;

/// Pending heading requests for one snake, oldest first.
#[derive(Debug, Clone, Default)]
pub struct InputQueue {
  pending: VecDeque<Direction>,
}

impl InputQueue {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, direction: Direction) {
    self.pending.push_back(direction);
  }

  pub fn len(&self) -> usize {
    self.pending.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pending.is_empty()
  }

  pub fn clear(&mut self) {
    self.pending.clear();
  }

  /// Pops requests until one is not a reversal of `current`. Reversals are
  /// dropped; requests behind the accepted one wait for later ticks.
  pub fn resolve(&mut self, current: Direction) -> Direction {
    while let Some(candidate) = self.pending.pop_front() {
      if is_valid_turn(candidate, current) {
        return candidate;
      }
    }
    current
  }
}

pub fn is_valid_turn(requested: Direction, current: Direction) -> bool {
  requested != current.opposite()
}
