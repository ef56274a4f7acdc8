pub mod apples;
pub mod board;
pub mod constants;
pub mod input;
pub mod snake;
pub mod types;
pub mod world;
