pub mod engine;
pub mod uci;

use std::future::Future;
use std::time::Duration;

use tracing::info;

pub use engine::{AiEngine, RandomAi};
pub use uci::{UciEngine, UciSettings};

use crate::config::AppConfig;
use crate::engine::types::{ChessError, Difficulty};

/// Which engine answers move queries.
pub enum Backend {
    Uci(UciEngine),
    Random(RandomAi),
}

/// The engine the server plays with: a backend plus the query timeout.
pub struct Oracle {
    backend: Backend,
    timeout: Duration,
}

impl Oracle {
    pub fn new(backend: Backend, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Build from configuration: a UCI engine if a path is set, otherwise
    /// the random mover.
    pub fn from_config(config: &AppConfig) -> Self {
        let timeout = Duration::from_millis(config.ai_timeout_ms);
        let backend = match &config.stockfish_path {
            Some(path) => {
                info!(path = %path.display(), depth = config.stockfish_depth, "using UCI engine");
                Backend::Uci(UciEngine::new(UciSettings {
                    path: path.clone(),
                    args: Vec::new(),
                    depth: config.stockfish_depth,
                    pool_size: config.stockfish_pool_size,
                }))
            }
            None => {
                info!("no engine path configured, using RandomAi");
                Backend::Random(RandomAi)
            }
        };
        Self::new(backend, timeout)
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn query(&self, difficulty: Difficulty, fen: &str) -> Result<String, ChessError> {
        let pending = async {
            match &self.backend {
                Backend::Uci(e) => e.best_move(difficulty, fen).await,
                Backend::Random(e) => e.best_move(difficulty, fen).await,
            }
        };
        tokio::time::timeout(self.timeout, pending)
            .await
            .map_err(|_| ChessError::EngineTimeout(self.timeout.as_millis() as u64))?
    }
}

impl AiEngine for Oracle {
    fn best_move(
        &self,
        difficulty: Difficulty,
        fen: &str,
    ) -> impl Future<Output = Result<String, ChessError>> + Send {
        self.query(difficulty, fen)
    }

    fn name(&self) -> &str {
        match &self.backend {
            Backend::Uci(e) => e.name(),
            Backend::Random(e) => e.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::board::STARTING_FEN;

    #[tokio::test]
    async fn random_backend_answers() {
        let oracle = Oracle::new(Backend::Random(RandomAi), Duration::from_secs(1));
        let reply = oracle.best_move(Difficulty::default(), STARTING_FEN).await.unwrap();
        assert!(reply.len() == 4);
        assert_eq!(oracle.name(), "RandomAi");
    }

    #[test]
    fn config_without_path_picks_random() {
        let oracle = Oracle::from_config(&AppConfig::default());
        assert!(matches!(oracle.backend(), Backend::Random(_)));
        assert_eq!(oracle.timeout(), Duration::from_millis(5000));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_engine_times_out() {
        let silent = r#"
while read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
  esac
done
"#;
        let engine = UciEngine::new(UciSettings {
            path: "sh".into(),
            args: vec!["-c".to_string(), silent.to_string()],
            depth: 1,
            pool_size: 1,
        });
        let oracle = Oracle::new(Backend::Uci(engine), Duration::from_millis(300));
        let err = oracle
            .best_move(Difficulty::default(), STARTING_FEN)
            .await
            .unwrap_err();
        assert!(matches!(err, ChessError::EngineTimeout(300)));
    }
}
