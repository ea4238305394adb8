//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Errors render as
//! `{"success": false, "error": {"code", "message"}, "timestamp", "path"}`.
//! `path` is filled in by [`attach_error_path`], which sees the request URI.

use axum::{
  Json,
  extract::{OriginalUri, Request, rejection::{JsonRejection, QueryRejection}},
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {message}")]
  NotFound { code: &'static str, message: String },

  #[error("bad request: {message}")]
  BadRequest { code: &'static str, message: String },

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
    Self::BadRequest { code, message: message.into() }
  }

  fn parts(&self) -> (StatusCode, &'static str, String) {
    match self {
      Self::NotFound { code, message } => (StatusCode::NOT_FOUND, *code, message.clone()),
      Self::BadRequest { code, message } => (StatusCode::BAD_REQUEST, *code, message.clone()),
      Self::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string()),
    }
  }
}

impl From<qalert_engine::Error> for ApiError {
  fn from(e: qalert_engine::Error) -> Self {
    use qalert_engine::Error as E;
    let code = e.code();
    match e {
      E::RuleNotFound(_) | E::AlertNotFound(_) => {
        Self::NotFound { code, message: e.to_string() }
      }
      E::InvalidInput(_) | E::Core(_) => {
        Self::BadRequest { code: "VALIDATION_ERROR", message: e.to_string() }
      }
      E::Store(inner) => Self::Internal(inner),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self { Self::bad_request("VALIDATION_ERROR", e.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(e: QueryRejection) -> Self { Self::bad_request("VALIDATION_ERROR", e.body_text()) }
}

/// Code and message carried from [`ApiError`] to [`attach_error_path`].
#[derive(Debug, Clone)]
struct ErrorInfo {
  code:    &'static str,
  message: String,
}

fn error_body(info: &ErrorInfo, path: Option<&str>) -> serde_json::Value {
  let mut body = json!({
    "success": false,
    "error": { "code": info.code, "message": info.message },
    "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
  });
  if let Some(path) = path {
    body["path"] = json!(path);
  }
  body
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code, message) = self.parts();
    if status.is_server_error() {
      tracing::error!(code, %message, "request failed");
    }
    let info = ErrorInfo { code, message };
    let mut response = (status, Json(error_body(&info, None))).into_response();
    response.extensions_mut().insert(info);
    response
  }
}

/// Middleware that re-renders [`ApiError`] bodies with the request path.
pub async fn attach_error_path(request: Request, next: Next) -> Response {
  let path = request
    .extensions()
    .get::<OriginalUri>()
    .map(|uri| uri.path().to_owned())
    .unwrap_or_else(|| request.uri().path().to_owned());

  let mut response = next.run(request).await;
  match response.extensions_mut().remove::<ErrorInfo>() {
    Some(info) => (response.status(), Json(error_body(&info, Some(&path)))).into_response(),
    None => response,
  }
}
