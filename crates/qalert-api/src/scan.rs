//! On-demand evaluation endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/scan` | Body: `{"contexts": [...]}`, must be non-empty |
//! | `GET`  | `/scan/zeroing` | Optional `?since=<rfc3339>&limit=<n>` |

use axum::{
  Json,
  extract::{
    Query, State,
    rejection::{JsonRejection, QueryRejection},
  },
};
use qalert_core::evaluation::{RuleEvaluationContext, RuleEvaluationResult};
use qalert_engine::BuildOptions;
use serde::Deserialize;
use serde_json::json;

use crate::{AppState, Backend, Envelope, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ScanBody {
  #[serde(default)]
  pub contexts: Option<Vec<RuleEvaluationContext>>,
}

/// `POST /scan`
pub async fn contexts<S: Backend>(
  State(state): State<AppState<S>>,
  body: Result<Json<ScanBody>, JsonRejection>,
) -> Result<Envelope<Vec<RuleEvaluationResult>>, ApiError> {
  let Json(body) = body?;
  let contexts = body
    .contexts
    .filter(|c| !c.is_empty())
    .ok_or_else(|| {
      ApiError::bad_request("MISSING_CONTEXTS", "请提供至少一个待评估的质量问题上下文")
    })?;

  let results = state.engine.evaluate_contexts(&contexts).await?;
  Ok(Envelope::new(results).message("预警扫描完成"))
}

/// `GET /scan/zeroing`
pub async fn zeroing<S: Backend>(
  State(state): State<AppState<S>>,
  query: Result<Query<BuildOptions>, QueryRejection>,
) -> Result<Envelope<Vec<RuleEvaluationResult>>, ApiError> {
  let Query(options) = query?;
  let contexts = state.contexts.build_from_quality_zeroing(options).await?;

  if contexts.is_empty() {
    return Ok(Envelope::new(Vec::new()).message("未发现可用于预警的质量归零记录"));
  }

  let results = state.engine.evaluate_contexts(&contexts).await?;
  Ok(
    Envelope::new(results)
      .meta(json!({ "contexts": contexts.len() }))
      .message("质量归零数据预警扫描完成"),
  )
}
