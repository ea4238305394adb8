//! Error types for `qalert-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("missing required field: {0}")]
  MissingField(&'static str),

  #[error("rule must declare at least one matching criterion")]
  EmptyCriteria,

  #[error("{field} must lie within [0, 1], got {value}")]
  InvalidThreshold { field: &'static str, value: f64 },

  #[error(
    "level mapping must be descending (critical {critical} >= warning \
     {warning} >= info {info})"
  )]
  InvalidLevelMapping { critical: f64, warning: f64, info: f64 },

  #[error("unknown statistics time range: {0:?}")]
  UnknownTimeRange(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
