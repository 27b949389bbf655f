use std::path::PathBuf;
use std::str::FromStr;

use crate::engine::types::Difficulty;

/// Server configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server listen port.
    pub port: u16,
    /// Server bind host.
    pub host: String,
    /// Difficulty used when a request does not give one.
    pub default_difficulty: Difficulty,
    /// Engine move timeout in milliseconds.
    pub ai_timeout_ms: u64,
    /// UCI engine executable; unset means the built-in random mover.
    pub stockfish_path: Option<PathBuf>,
    /// Search depth sent to the UCI engine.
    pub stockfish_depth: u32,
    /// Maximum number of engine processes.
    pub stockfish_pool_size: usize,
}

impl AppConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup; unparsable values fall back
    /// to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = AppConfig::default();
        AppConfig {
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            host: lookup("HOST").unwrap_or(defaults.host),
            default_difficulty: lookup("CHESS_AI_DEFAULT_DIFFICULTY")
                .and_then(|v| Difficulty::from_str_loose(&v))
                .unwrap_or(defaults.default_difficulty),
            ai_timeout_ms: parsed(&lookup, "CHESS_AI_TIMEOUT").unwrap_or(defaults.ai_timeout_ms),
            stockfish_path: lookup("STOCKFISH_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            stockfish_depth: parsed(&lookup, "STOCKFISH_DEPTH").unwrap_or(defaults.stockfish_depth),
            stockfish_pool_size: parsed(&lookup, "STOCKFISH_POOL_SIZE")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.stockfish_pool_size),
        }
    }

    /// Socket address string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            port: 8082,
            host: "0.0.0.0".to_string(),
            default_difficulty: Difficulty::default(),
            ai_timeout_ms: 5000,
            stockfish_path: None,
            stockfish_depth: 10,
            stockfish_pool_size: 10,
        }
    }
}
