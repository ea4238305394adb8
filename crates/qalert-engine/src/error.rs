//! Error type for `qalert-engine`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("alert rule not found: {0}")]
  RuleNotFound(String),

  #[error("quality alert not found: {0}")]
  AlertNotFound(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error(transparent)]
  Core(#[from] qalert_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  /// Stable machine-readable code surfaced to API callers.
  pub fn code(&self) -> &'static str {
    match self {
      Self::RuleNotFound(_) => "RULE_NOT_FOUND",
      Self::AlertNotFound(_) => "ALERT_NOT_FOUND",
      Self::InvalidInput(_) => "INVALID_INPUT",
      Self::Core(_) => "VALIDATION_ERROR",
      Self::Store(_) => "STORE_ERROR",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
