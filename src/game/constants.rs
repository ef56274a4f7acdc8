pub const DEFAULT_ROWS: i32 = 75;
pub const DEFAULT_COLS: i32 = 100;
pub const SNAKE_LENGTH_INITIAL: usize = 10;
pub const MAX_APPLES_PER_SNAKE: usize = 50;
pub const TICK_MS: u64 = 100;
pub const MAX_REGISTER_ATTEMPTS: usize = 256;
pub const MIN_SPAWN_DISTANCE: i32 = 5;
pub const APPLE_PLACEMENT_ATTEMPT_FACTOR: usize = 4;
