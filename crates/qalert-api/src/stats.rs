//! `GET /stats/summary?timeRange=30d|90d|1y`

use axum::extract::{Query, State, rejection::QueryRejection};
use qalert_core::alert::{StatisticsBucket, TimeRange};
use serde::Deserialize;

use crate::{AppState, Backend, Envelope, error::ApiError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryParams {
  pub time_range: Option<String>,
}

pub async fn summary<S: Backend>(
  State(state): State<AppState<S>>,
  query: Result<Query<SummaryParams>, QueryRejection>,
) -> Result<Envelope<Vec<StatisticsBucket>>, ApiError> {
  let Query(params) = query?;
  let range = match params.time_range.as_deref() {
    None | Some("") => TimeRange::default(),
    Some(raw) => raw.parse().map_err(qalert_engine::Error::from)?,
  };
  Ok(Envelope::new(state.alerts.statistics(range).await?))
}
