// Debug logging module for asynchronous game state logging
//
// Fire-and-forget async logging that stays off the request/response path.
// Each decided turn is appended to a JSONL file that the replay tool can read back.

use log::error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::types::Board;

/// One line of the debug log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebugLogEntry {
    pub turn: i32,
    pub you_id: String,
    pub chosen_move: String,
    pub strategy: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub iterations: u64,
    pub board: Board,
    pub timestamp: String,
}

impl DebugLogEntry {
    pub fn new(turn: i32, you_id: &str, chosen_move: &str, strategy: &str, board: Board) -> Self {
        DebugLogEntry {
            turn,
            you_id: you_id.to_string(),
            chosen_move: chosen_move.to_string(),
            strategy: strategy.to_string(),
            score: None,
            depth: 0,
            iterations: 0,
            board,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Shared debug logger state
/// Uses Arc<Mutex<File>> so concurrent requests append whole lines
#[derive(Clone)]
pub struct DebugLogger {
    file: Arc<Mutex<Option<File>>>,
    enabled: bool,
}

impl DebugLogger {
    /// Creates a new debug logger
    /// If enabled is true, initializes the log file (truncating if it exists)
    pub async fn new(enabled: bool, log_file_path: &str) -> Self {
        if !enabled {
            return Self::disabled();
        }

        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)
            .await
        {
            Ok(file) => {
                log::info!("Debug logging enabled: {}", log_file_path);
                DebugLogger {
                    file: Arc::new(Mutex::new(Some(file))),
                    enabled: true,
                }
            }
            Err(e) => {
                error!("Failed to create debug log file '{}': {}", log_file_path, e);
                Self::disabled()
            }
        }
    }

    /// Creates a disabled debug logger (no-op)
    pub fn disabled() -> Self {
        DebugLogger {
            file: Arc::new(Mutex::new(None)),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Logs a decision without waiting for the write.
    /// Must be called from within a tokio runtime.
    pub fn log_move(&self, entry: DebugLogEntry) {
        if !self.enabled {
            return;
        }

        let logger = self.clone();
        tokio::spawn(async move {
            logger.write_entry(&entry).await;
        });
    }

    /// Appends one JSON line and flushes it
    pub async fn write_entry(&self, entry: &DebugLogEntry) {
        let mut file_guard = self.file.lock().await;
        let Some(file) = file_guard.as_mut() else {
            return;
        };

        match serde_json::to_string(entry) {
            Ok(json_line) => {
                let line_with_newline = format!("{}\n", json_line);
                if let Err(e) = file.write_all(line_with_newline.as_bytes()).await {
                    error!("Failed to write debug log entry: {}", e);
                } else if let Err(e) = file.flush().await {
                    error!("Failed to flush debug log: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to serialize debug log entry: {}", e);
            }
        }
    }
}
