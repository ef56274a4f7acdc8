use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

pub type ActorId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
  pub row: i32,
  pub col: i32,
}

impl Cell {
  pub const fn new(row: i32, col: i32) -> Self {
    Self { row, col }
  }

  /// Adjacent cell in `direction`. Not clamped to any board.
  pub fn step(self, direction: Direction) -> Cell {
    match direction {
      Direction::Up => Cell::new(self.row - 1, self.col),
      Direction::Down => Cell::new(self.row + 1, self.col),
      Direction::Left => Cell::new(self.row, self.col - 1),
      Direction::Right => Cell::new(self.row, self.col + 1),
    }
  }

  pub fn manhattan(self, other: Cell) -> i32 {
    (self.row - other.row).abs() + (self.col - other.col).abs()
  }
}

// Cells travel as `[row, col]` pairs.
impl Serialize for Cell {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    (self.row, self.col).serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for Cell {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let (row, col) = <(i32, i32)>::deserialize(deserializer)?;
    Ok(Cell { row, col })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Up,
  Down,
  Left,
  Right,
}

impl Direction {
  pub const ALL: [Direction; 4] = [
    Direction::Up,
    Direction::Down,
    Direction::Left,
    Direction::Right,
  ];

  pub fn opposite(self) -> Direction {
    match self {
      Direction::Up => Direction::Down,
      Direction::Down => Direction::Up,
      Direction::Left => Direction::Right,
      Direction::Right => Direction::Left,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnakeSnapshot {
  pub direction: Direction,
  pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldSnapshot {
  pub snakes: BTreeMap<ActorId, SnakeSnapshot>,
  pub apples: Vec<Cell>,
  pub deaths: Vec<ActorId>,
}
