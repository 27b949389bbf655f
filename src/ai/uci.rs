//! UCI engine driver: a bounded pool of external engine processes.
//!
//! Each process is spawned lazily, taken from the pool for exactly one query
//! and returned afterwards. A process that fails mid-conversation is dropped
//! (and killed) instead of being returned.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::ai::engine::AiEngine;
use crate::engine::types::{ChessError, Difficulty};

/// How to launch and drive the engine.
#[derive(Clone, Debug)]
pub struct UciSettings {
    pub path: PathBuf,
    pub args: Vec<String>,
    /// Search depth sent with every `go`.
    pub depth: u32,
    /// Maximum number of live processes.
    pub pool_size: usize,
}

/// A pooled UCI engine.
pub struct UciEngine {
    settings: UciSettings,
    idle: Mutex<Vec<UciProcess>>,
    permits: Semaphore,
}

impl UciEngine {
    pub fn new(settings: UciSettings) -> Self {
        let pool_size = settings.pool_size.max(1);
        Self {
            idle: Mutex::new(Vec::with_capacity(pool_size)),
            permits: Semaphore::new(pool_size),
            settings,
        }
    }

    /// Start one process and park it in the pool, so a bad path is reported
    /// at startup rather than on the first move.
    pub async fn warm_up(&self) -> Result<(), ChessError> {
        let process = UciProcess::spawn(&self.settings).await?;
        self.idle.lock().await.push(process);
        Ok(())
    }

    /// Number of processes waiting in the pool.
    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }

    async fn query(&self, difficulty: Difficulty, fen: &str) -> Result<String, ChessError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ChessError::EngineFailure("engine pool closed".to_string()))?;

        let pooled = self.idle.lock().await.pop();
        let mut process = match pooled {
            Some(p) => p,
            None => UciProcess::spawn(&self.settings).await?,
        };

        match process
            .best_move(difficulty.skill_level(), self.settings.depth, fen)
            .await
        {
            Ok(reply) => {
                self.idle.lock().await.push(process);
                Ok(reply)
            }
            Err(e) => {
                warn!(pid = ?process.pid, error = %e, "discarding failed engine process");
                Err(e)
            }
        }
    }
}

impl AiEngine for UciEngine {
    fn best_move(
        &self,
        difficulty: Difficulty,
        fen: &str,
    ) -> impl Future<Output = Result<String, ChessError>> + Send {
        self.query(difficulty, fen)
    }

    fn name(&self) -> &str {
        "UciEngine"
    }
}

// =========================================================================
// A single engine process
// =========================================================================

struct UciProcess {
    // Held so the process is killed when this value is dropped.
    _child: Child,
    pid: Option<u32>,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl UciProcess {
    async fn spawn(settings: &UciSettings) -> Result<Self, ChessError> {
        let mut child = Command::new(&settings.path)
            .args(&settings.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ChessError::EngineFailure(format!(
                    "failed to start {}: {e}",
                    settings.path.display()
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ChessError::EngineFailure("engine stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ChessError::EngineFailure("engine stdout unavailable".to_string()))?;

        let mut process = UciProcess {
            pid: child.id(),
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        process.send("uci").await?;
        process.read_until(|line| line == "uciok").await?;
        process.send("isready").await?;
        process.read_until(|line| line == "readyok").await?;

        info!(pid = ?process.pid, "started engine process");
        Ok(process)
    }

    async fn best_move(&mut self, skill: u8, depth: u32, fen: &str) -> Result<String, ChessError> {
        self.send("ucinewgame").await?;
        self.send(&format!("setoption name Skill Level value {skill}"))
            .await?;
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let line = self.read_until(|line| line.starts_with("bestmove")).await?;
        let reply = line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| ChessError::Protocol(format!("bestmove line without a move: '{line}'")))?;
        debug!(pid = ?self.pid, %reply, "engine answered");
        Ok(reply.to_string())
    }

    async fn send(&mut self, command: &str) -> Result<(), ChessError> {
        let io_err = |e: std::io::Error| ChessError::EngineFailure(format!("write to engine: {e}"));
        self.stdin
            .write_all(format!("{command}\n").as_bytes())
            .await
            .map_err(io_err)?;
        self.stdin.flush().await.map_err(io_err)
    }

    /// Skip output lines until one matches.
    async fn read_until(&mut self, matches: impl Fn(&str) -> bool) -> Result<String, ChessError> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .map_err(|e| ChessError::EngineFailure(format!("read from engine: {e}")))?
                .ok_or_else(|| ChessError::EngineFailure("engine closed its output".to_string()))?;
            let line = line.trim_end();
            if matches(line) {
                return Ok(line.to_string());
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
