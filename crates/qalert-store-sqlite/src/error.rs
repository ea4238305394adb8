//! Error type for `qalert-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("unknown {kind} value in column: {value:?}")]
  UnknownEnum { kind: &'static str, value: String },

  /// Attempted to insert an alert whose id is already taken.
  #[error("quality alert already exists: {0}")]
  DuplicateAlert(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
