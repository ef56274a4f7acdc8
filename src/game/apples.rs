use super::board::{Board, Occupant};
use super::constants::APPLE_PLACEMENT_ATTEMPT_FACTOR;
use super::types::Cell;
use rand::Rng;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct ApplePool {
  cells: BTreeSet<Cell>,
}

impl ApplePool {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.cells.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }

  pub fn contains(&self, cell: Cell) -> bool {
    self.cells.contains(&cell)
  }

  pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
    self.cells.iter().copied()
  }

  pub fn place(&mut self, board: &mut Board, cell: Cell) {
    board.set(cell, Occupant::Apple);
    self.cells.insert(cell);
  }

  // Pool only; the caller retags the cell.
  pub fn take(&mut self, cell: Cell) -> bool {
    self.cells.remove(&cell)
  }

  pub fn target(&self, board: &Board, snake_count: usize, per_snake: usize) -> usize {
    snake_count
      .saturating_mul(per_snake)
      .min(board.free_cells() + self.cells.len())
  }

  /// Gives up after a bounded number of draws. Returns how many were placed.
  pub fn replenish<R: Rng>(&mut self, board: &mut Board, target: usize, rng: &mut R) -> usize {
    if self.cells.len() >= target {
      return 0;
    }
    let max_attempts = board.free_cells().saturating_mul(APPLE_PLACEMENT_ATTEMPT_FACTOR);
    let mut placed = 0;
    let mut attempts = 0;
    while self.cells.len() < target && attempts < max_attempts {
      attempts += 1;
      let candidate = Cell::new(
        rng.gen_range(0..board.rows()),
        rng.gen_range(0..board.cols()),
      );
      if board.get(candidate) == Some(Occupant::Empty) {
        self.place(board, candidate);
        placed += 1;
      }
    }
    if self.cells.len() < target {
      tracing::debug!(
        pool = self.cells.len(),
        target,
        attempts,
        "apple replenishment gave up below target"
      );
    }
    placed
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  #[test]
  fn target_is_capped_by_free_cells() {
    let mut board = Board::new(3, 3);
    let mut pool = ApplePool::new();
    assert_eq!(pool.target(&board, 2, 3), 6);
    assert_eq!(pool.target(&board, 4, 3), 9);
    board.set(Cell::new(0, 0), Occupant::Snake(1));
    assert_eq!(pool.target(&board, 4, 3), 8);
    pool.place(&mut board, Cell::new(1, 1));
    assert_eq!(pool.target(&board, 4, 3), 8);
    assert_eq!(pool.target(&board, 0, 50), 0);
  }

  #[test]
  fn replenish_only_uses_empty_cells() {
    let mut board = Board::new(4, 4);
    for col in 0..4 {
      board.set(Cell::new(0, col), Occupant::Snake(7));
    }
    let mut pool = ApplePool::new();
    let mut rng = StdRng::seed_from_u64(11);
    let placed = pool.replenish(&mut board, 5, &mut rng);

    assert_eq!(placed, 5);
    assert_eq!(pool.len(), 5);
    for cell in pool.iter() {
      assert_ne!(cell.row, 0);
      assert_eq!(board.get(cell), Some(Occupant::Apple));
    }
  }

  #[test]
  fn replenish_on_saturated_board_gives_up_without_error() {
    let mut board = Board::new(2, 2);
    for (cell, _) in board.clone().iter() {
      board.set(cell, Occupant::Snake(1));
    }
    let mut pool = ApplePool::new();
    let mut rng = StdRng::seed_from_u64(3);
    assert_eq!(pool.replenish(&mut board, 10, &mut rng), 0);
    assert!(pool.is_empty());
  }

  #[test]
  fn replenish_is_a_no_op_at_target() {
    let mut board = Board::new(5, 5);
    let mut pool = ApplePool::new();
    pool.place(&mut board, Cell::new(1, 1));
    let mut rng = StdRng::seed_from_u64(5);
    assert_eq!(pool.replenish(&mut board, 1, &mut rng), 0);
    assert!(pool.take(Cell::new(1, 1)));
    assert!(!pool.take(Cell::new(1, 1)));
  }
}
