//! Handlers for `/rules` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/rules` | Body: a new rule; 201 |
//! | `GET`   | `/rules` | `(priority asc, createdAt desc)` |
//! | `PATCH` | `/rules/{rule_id}` | Partial update; 404 if not found |

use axum::{
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use qalert_core::rule::{AlertRule, NewAlertRule, RulePatch};

use crate::{AppState, Backend, Envelope, error::ApiError};

/// `POST /rules`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  body: Result<Json<NewAlertRule>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(input) = body?;
  let rule = state.rules.create_rule(input).await?;
  Ok((StatusCode::CREATED, Envelope::new(rule).message("预警规则创建成功")))
}

/// `GET /rules`
pub async fn list<S: Backend>(
  State(state): State<AppState<S>>,
) -> Result<Envelope<Vec<AlertRule>>, ApiError> {
  Ok(Envelope::new(state.rules.list_rules().await?))
}

/// `PATCH /rules/{rule_id}`
pub async fn update<S: Backend>(
  State(state): State<AppState<S>>,
  Path(rule_id): Path<String>,
  body: Result<Json<RulePatch>, JsonRejection>,
) -> Result<Envelope<AlertRule>, ApiError> {
  let Json(patch) = body?;
  let rule = state.rules.update_rule(&rule_id, patch).await?;
  Ok(Envelope::new(rule).message("预警规则更新成功"))
}
