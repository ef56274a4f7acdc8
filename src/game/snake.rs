use super::types::{ActorId, Cell, Direction};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Snake {
  pub id: ActorId,
  pub heading: Direction,
  /// Tail at the front, head at the back.
  pub body: VecDeque<Cell>,
  /// Cells holding an apple that still has to clear the tail.
  pub digesting: VecDeque<Cell>,
}

impl Snake {
  pub fn new(id: ActorId, heading: Direction, body: VecDeque<Cell>) -> Self {
    assert!(!body.is_empty(), "snake {id} spawned without a body");
    Self {
      id,
      heading,
      body,
      digesting: VecDeque::new(),
    }
  }

  pub fn head(&self) -> Cell {
    self.body[self.body.len() - 1]
  }

  pub fn tail(&self) -> Cell {
    self.body[0]
  }

  pub fn torso(&self) -> Cell {
    self.body[self.body.len() / 2]
  }

  pub fn len(&self) -> usize {
    self.body.len()
  }

  pub fn is_tail_digesting(&self) -> bool {
    self.digesting.front() == Some(&self.tail())
  }

  /// Cheap proximity estimate between two snakes: the smallest Manhattan
  /// distance among their head, torso and tail cells. Not exact.
  pub fn approx_distance(&self, other: &Snake) -> i32 {
    let mine = [self.head(), self.torso(), self.tail()];
    let theirs = [other.head(), other.torso(), other.tail()];
    mine
      .iter()
      .flat_map(|a| theirs.iter().map(move |b| a.manhattan(*b)))
      .min()
      .unwrap_or(i32::MAX)
  }

  pub fn next_head(&self) -> Cell {
    self.head().step(self.heading)
  }

  /// Holds the current tail in place for the next `step`.
  pub fn swallow(&mut self) {
    let tail = self.tail();
    self.digesting.push_back(tail);
  }

  /// Advances the body one cell along `heading`. Returns the cell vacated by
  /// the tail (none while the tail is digesting) and the new head.
  pub fn step(&mut self) -> (Option<Cell>, Cell) {
    let next_head = self.next_head();
    let evicted = if self.is_tail_digesting() {
      self.digesting.pop_front();
      None
    } else {
      self.body.pop_front()
    };
    self.body.push_back(next_head);
    (evicted, next_head)
  }
}
