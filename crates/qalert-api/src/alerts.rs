//! Handlers for alert listing, detail and lifecycle endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/` | Filters: `level`, `status`, `category`, `supplier`, `component`, `keyword`, `startDate`, `endDate`, `page`, `limit` |
//! | `GET`   | `/{alert_id}` | 404 if not found |
//! | `PATCH` | `/{alert_id}/status` | Body: `{"status", "actor"?, "note"?}` |
//! | `POST`  | `/{alert_id}/assignments` | Body: `{"description", "responsible", "deadline"?}`; 201 |

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, QueryRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use qalert_core::{
  alert::{AlertStatus, NewAssignment, QualityAlert},
  store::AlertFilter,
};
use serde::Deserialize;

use crate::{AppState, Backend, Envelope, Pagination, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /`
pub async fn list<S: Backend>(
  State(state): State<AppState<S>>,
  query: Result<Query<AlertFilter>, QueryRejection>,
) -> Result<Envelope<Vec<QualityAlert>>, ApiError> {
  let Query(filter) = query?;
  let page = state.alerts.list_alerts(filter).await?;
  let pagination = Pagination { total: page.total, page: page.page, limit: page.limit };
  Ok(Envelope::new(page.items).pagination(pagination))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /{alert_id}`
pub async fn get_one<S: Backend>(
  State(state): State<AppState<S>>,
  Path(alert_id): Path<String>,
) -> Result<Envelope<QualityAlert>, ApiError> {
  Ok(Envelope::new(state.alerts.get_alert(&alert_id).await?))
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  #[serde(default)]
  pub status: Option<AlertStatus>,
  #[serde(default)]
  pub actor:  Option<String>,
  #[serde(default)]
  pub note:   Option<String>,
}

/// `PATCH /{alert_id}/status`
pub async fn update_status<S: Backend>(
  State(state): State<AppState<S>>,
  Path(alert_id): Path<String>,
  body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Envelope<QualityAlert>, ApiError> {
  let Json(body) = body?;
  let status = body
    .status
    .ok_or_else(|| ApiError::bad_request("MISSING_PARAMETERS", "缺少必要参数: status"))?;
  let actor = body
    .actor
    .filter(|a| !a.trim().is_empty())
    .unwrap_or_else(|| "system".to_owned());

  let alert = state
    .alerts
    .update_status(&alert_id, status, actor, body.note)
    .await?;
  Ok(Envelope::new(alert).message("预警状态更新成功"))
}

// ─── Assignments ─────────────────────────────────────────────────────────────

/// `POST /{alert_id}/assignments`
pub async fn add_assignment<S: Backend>(
  State(state): State<AppState<S>>,
  Path(alert_id): Path<String>,
  body: Result<Json<NewAssignment>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(input) = body?;
  let alert = state.alerts.add_assignment(&alert_id, input).await?;
  Ok((StatusCode::CREATED, Envelope::new(alert).message("处理措施创建成功")))
}
