use super::types::{ActorId, Cell};

/// What a board cell currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
  Empty,
  Snake(ActorId),
  Apple,
}

/// Occupancy cache over the grid. Snake bodies and the apple pool are the
/// source of truth; every write here must mirror a write there.
#[derive(Debug, Clone)]
pub struct Board {
  rows: i32,
  cols: i32,
  cells: Vec<Occupant>,
}

impl Board {
  pub fn new(rows: i32, cols: i32) -> Self {
    let len = (rows.max(0) as usize) * (cols.max(0) as usize);
    Self {
      rows,
      cols,
      cells: vec![Occupant::Empty; len],
    }
  }

  pub fn rows(&self) -> i32 {
    self.rows
  }

  pub fn cols(&self) -> i32 {
    self.cols
  }

  pub fn in_bounds(&self, cell: Cell) -> bool {
    (0..self.rows).contains(&cell.row) && (0..self.cols).contains(&cell.col)
  }

  fn index(&self, cell: Cell) -> Option<usize> {
    if !self.in_bounds(cell) {
      return None;
    }
    Some(cell.row as usize * self.cols as usize + cell.col as usize)
  }

  /// Out-of-bounds cells read as `None`.
  pub fn get(&self, cell: Cell) -> Option<Occupant> {
    self.index(cell).map(|index| self.cells[index])
  }

  pub fn set(&mut self, cell: Cell, occupant: Occupant) {
    match self.index(cell) {
      Some(index) => self.cells[index] = occupant,
      None => panic!("board write outside {}x{}: {:?}", self.rows, self.cols, cell),
    }
  }

  pub fn is_snake(&self, cell: Cell) -> bool {
    matches!(self.get(cell), Some(Occupant::Snake(_)))
  }

  pub fn free_cells(&self) -> usize {
    self
      .cells
      .iter()
      .filter(|occupant| **occupant == Occupant::Empty)
      .count()
  }

  pub fn iter(&self) -> impl Iterator<Item = (Cell, Occupant)> + '_ {
    let cols = self.cols;
    self.cells.iter().enumerate().map(move |(index, occupant)| {
      let cell = Cell::new(index as i32 / cols, index as i32 % cols);
      (cell, *occupant)
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bounds_are_half_open() {
    let board = Board::new(3, 4);
    assert!(board.in_bounds(Cell::new(0, 0)));
    assert!(board.in_bounds(Cell::new(2, 3)));
    assert!(!board.in_bounds(Cell::new(3, 0)));
    assert!(!board.in_bounds(Cell::new(0, 4)));
    assert!(!board.in_bounds(Cell::new(-1, 2)));
    assert_eq!(board.get(Cell::new(0, -1)), None);
  }

  #[test]
  fn set_and_count_free_cells() {
    let mut board = Board::new(2, 2);
    assert_eq!(board.free_cells(), 4);
    board.set(Cell::new(0, 1), Occupant::Snake(9));
    board.set(Cell::new(1, 1), Occupant::Apple);
    assert_eq!(board.free_cells(), 2);
    assert!(board.is_snake(Cell::new(0, 1)));
    assert_eq!(board.get(Cell::new(1, 1)), Some(Occupant::Apple));

    let tagged: Vec<_> = board
      .iter()
      .filter(|(_, occupant)| *occupant != Occupant::Empty)
      .collect();
    assert_eq!(
      tagged,
      vec![
        (Cell::new(0, 1), Occupant::Snake(9)),
        (Cell::new(1, 1), Occupant::Apple)
      ]
    );
  }

  #[test]
  #[should_panic(expected = "board write outside")]
  fn writes_outside_the_grid_panic() {
    let mut board = Board::new(2, 2);
    board.set(Cell::new(2, 0), Occupant::Apple);
  }
}
