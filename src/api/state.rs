use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::ai::Oracle;
use crate::config::AppConfig;
use crate::engine::game::Game;

/// One game behind its own lock, so an engine query for one game does not
/// block the others.
pub type GameHandle = Arc<Mutex<Game>>;

/// Games stored by UUID.
pub type GameStore = RwLock<HashMap<String, GameHandle>>;

/// Shared application state passed to all handlers via Axum's State extractor.
pub struct AppState {
    pub games: GameStore,
    pub config: AppConfig,
    pub start_time: std::time::Instant,
    pub oracle: Oracle,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig) -> SharedState {
        let oracle = Oracle::from_config(&config);
        Self::with_oracle(config, oracle)
    }

    /// State with an explicitly chosen engine.
    pub fn with_oracle(config: AppConfig, oracle: Oracle) -> SharedState {
        Arc::new(AppState {
            games: RwLock::new(HashMap::new()),
            config,
            start_time: std::time::Instant::now(),
            oracle,
        })
    }

    /// Look up a game handle without holding the store lock afterwards.
    pub async fn game(&self, id: &str) -> Option<GameHandle> {
        self.games.read().await.get(id).cloned()
    }
}
