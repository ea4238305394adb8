//! Success envelope shared by every handler.

use axum::{
  Json,
  response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Pagination {
  pub total: u64,
  pub page:  u32,
  pub limit: u32,
}

/// `{"success": true, "data", "message"?, "pagination"?, "meta"?}`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
  pub success:    bool,
  pub data:       T,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message:    Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pagination: Option<Pagination>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub meta:       Option<Value>,
}

impl<T> Envelope<T> {
  pub fn new(data: T) -> Self {
    Self { success: true, data, message: None, pagination: None, meta: None }
  }

  pub fn message(mut self, message: impl Into<String>) -> Self {
    self.message = Some(message.into());
    self
  }

  pub fn pagination(mut self, pagination: Pagination) -> Self {
    self.pagination = Some(pagination);
    self
  }

  pub fn meta(mut self, meta: Value) -> Self {
    self.meta = Some(meta);
    self
  }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
  fn into_response(self) -> Response { Json(self).into_response() }
}
