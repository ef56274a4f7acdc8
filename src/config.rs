use crate::game::constants::TICK_MS;
use crate::game::world::WorldConfig;
use anyhow::{bail, Context};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8001;
const DEFAULT_SESSION: &str = "test";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub tick_interval: Duration,
    pub world: WorldConfig,
    /// Session created at startup so clients have somewhere to join.
    pub default_session: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = WorldConfig::default();
        let world = WorldConfig {
            rows: parse_or(&lookup, "GRID_ROWS", defaults.rows),
            cols: parse_or(&lookup, "GRID_COLS", defaults.cols),
            initial_length: parse_or(&lookup, "SNAKE_LENGTH", defaults.initial_length),
            apples_per_snake: parse_or(&lookup, "APPLES_PER_SNAKE", defaults.apples_per_snake),
            max_register_attempts: defaults.max_register_attempts,
        };
        let tick_ms: u64 = parse_or(&lookup, "TICK_MS", TICK_MS);
        let default_session = match lookup("DEFAULT_SESSION") {
            Some(value) => Some(value.trim().to_string()).filter(|value| !value.is_empty()),
            None => Some(DEFAULT_SESSION.to_string()),
        };

        let config = Self {
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            tick_interval: Duration::from_millis(tick_ms),
            world,
            default_session,
        };
        config.validate().context("invalid server configuration")?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval.is_zero() {
            bail!("TICK_MS must be greater than zero");
        }
        if !self.world.fits_spawn_margin() {
            bail!(
                "a {}x{} board cannot spawn snakes of length {}",
                self.world.rows,
                self.world.cols,
                self.world.initial_length
            );
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
