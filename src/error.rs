//! Error taxonomy for the league ledger
//!
//! Errors are grouped by how the caller should react: retry after
//! re-authenticating, treat as a first run, skip one record, or recover a
//! document from backup.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, LeagueError>;

#[derive(Debug, Error)]
pub enum LeagueError {
    /// Network or server failure talking to the league data source
    #[error("League data source unavailable: {0}")]
    SourceUnavailable(String),

    /// Token rejected or authorization flow failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An expected document or remote resource does not exist
    #[error("Missing data: {0}")]
    MissingData(String),

    /// A single matchup, standings row, or bonus entry has an unexpected shape
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// A persisted document could not be parsed and no backup recovered it
    #[error("Corrupt store document {name}: {reason}")]
    CorruptStore { name: String, reason: String },

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LeagueError {
    /// Classify a non-success HTTP response from a remote API
    pub fn from_response(status: u16, body: &str) -> Self {
        let body = body.trim();
        let detail = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, truncate(body, 200))
        };

        match status {
            401 | 403 => LeagueError::Authentication(detail),
            404 => LeagueError::MissingData(detail),
            _ => LeagueError::SourceUnavailable(detail),
        }
    }

    /// Errors that halt the whole run rather than one unit of work
    pub fn is_fatal(&self) -> bool {
        matches!(self, LeagueError::Authentication(_) | LeagueError::Config(_))
    }

    /// Errors that only affect the record being processed
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            LeagueError::MalformedRecord(_) | LeagueError::MissingData(_)
        )
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
