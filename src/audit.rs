//! Append-only audit trail
//!
//! Every ingestion and every generated answer is recorded as one JSON object
//! per line (`audit_log.jsonl` by default):
//!
//! ```text
//! {"timestamp":"2026-01-05T10:00:00Z","action":"ingest","details":{"url":"...","jurisdiction":"UK","chunks":12}}
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::types::{AppError, Result};
use crate::utils::toml_config::AuditConfig;

/// One line of the audit log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub details: Value,
}

/// Audited actions
pub mod actions {
    pub const INGEST: &str = "ingest";
    pub const ANSWER: &str = "answer";
}

pub struct AuditLog {
    path: PathBuf,
    enabled: bool,
    // Serializes appends so concurrent requests never interleave lines
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.path.clone(), config.enabled)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append an entry stamped with the current time.
    pub async fn record(&self, action: &str, details: Value) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let entry = AuditEntry {
            timestamp: Utc::now(),
            action: action.to_string(),
            details,
        };

        let mut line = serde_json::to_string(&entry)
            .map_err(|e| AppError::Internal(format!("Failed to serialize audit entry: {}", e)))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create audit directory: {}", e)))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to open audit log: {}", e)))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write audit log: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to flush audit log: {}", e)))?;

        tracing::debug!(action = %entry.action, "audit entry recorded");
        Ok(())
    }

    /// Read every entry back, oldest first. A missing file is an empty log.
    ///
    /// Lines that fail to parse are skipped with a warning.
    pub async fn entries(&self) -> Result<Vec<AuditEntry>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::Internal(format!("Failed to read audit log: {}", e)));
            }
        };

        let entries = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(i, line)| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(line = i + 1, error = %e, "Skipping malformed audit entry");
                    None
                }
            })
            .collect();

        Ok(entries)
    }

    /// The last `n` entries, oldest first.
    pub async fn tail(&self, n: usize) -> Result<Vec<AuditEntry>> {
        let mut entries = self.entries().await?;
        let skip = entries.len().saturating_sub(n);
        Ok(entries.split_off(skip))
    }
}
