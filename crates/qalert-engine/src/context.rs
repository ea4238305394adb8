//! Builds evaluation contexts from quality-zeroing records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use qalert_core::{
  evaluation::{ContextMetrics, FailureTrend, RelatedObjects, RuleEvaluationContext},
  rule::AlertCategory,
  store::ZeroingSource,
  zeroing::QualityZeroingRecord,
};
use serde::Deserialize;

use crate::{Error, Result};

pub const DEFAULT_BUILD_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildOptions {
  /// Only records updated at or after this instant.
  #[serde(default)]
  pub since: Option<DateTime<Utc>>,
  /// At most this many records; defaults to [`DEFAULT_BUILD_LIMIT`].
  #[serde(default)]
  pub limit: Option<usize>,
}

pub struct ContextBuilder<Z> {
  source: Arc<Z>,
}

impl<Z: ZeroingSource> ContextBuilder<Z> {
  pub fn new(source: Arc<Z>) -> Self { Self { source } }

  /// Contexts for the most recently updated records, newest first. Records
  /// without problem info are dropped.
  pub async fn build_from_quality_zeroing(
    &self,
    options: BuildOptions,
  ) -> Result<Vec<RuleEvaluationContext>> {
    let limit = options.limit.unwrap_or(DEFAULT_BUILD_LIMIT);
    let records = self
      .source
      .recent_zeroing(options.since, limit)
      .await
      .map_err(Error::store)?;

    tracing::info!(records = records.len(), "building contexts from quality zeroing");
    Ok(records.iter().filter_map(context_from_zeroing).collect())
  }
}

/// Category implied by a root-cause type.
fn category_for_cause(cause_type: Option<&str>) -> AlertCategory {
  match cause_type {
    Some("manufacturing" | "material") => AlertCategory::SupplyChain,
    Some("design" | "human") => AlertCategory::Reliability,
    _ => AlertCategory::Process,
  }
}

/// Coarse trend from the number of preliminary conclusions.
fn trend_for_conclusions(count: usize) -> FailureTrend {
  match count {
    0 => FailureTrend::Stable,
    1..=3 => FailureTrend::Decreasing,
    _ => FailureTrend::Increasing,
  }
}

fn push_unique(tags: &mut Vec<String>, tag: &str) {
  if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
    tags.push(tag.to_owned());
  }
}

/// Map one record onto a context; `None` if it has no problem info.
pub fn context_from_zeroing(record: &QualityZeroingRecord) -> Option<RuleEvaluationContext> {
  let info = record.problem_info.as_ref()?;
  let analysis = record.problem_analysis.as_ref();
  let impact = analysis.and_then(|a| a.impact_assessment.as_ref());
  let phenomenon = analysis.and_then(|a| a.phenomenon_analysis.as_ref());
  let causes = record
    .root_cause_analysis
    .as_ref()
    .map(|r| r.root_causes.as_slice())
    .unwrap_or_default();

  let mut process_tags = Vec::new();
  if let Some(phase) = record.zeroing_status.as_ref().and_then(|s| s.current_phase.as_deref()) {
    push_unique(&mut process_tags, phase);
  }
  for cause_type in causes.iter().filter_map(|c| c.cause_type.as_deref()) {
    push_unique(&mut process_tags, cause_type);
  }

  let non_empty = |v: &Option<String>| -> Vec<String> {
    v.iter().filter(|s| !s.is_empty()).cloned().collect()
  };

  Some(RuleEvaluationContext {
    source_issue_id: record.issue_id().to_owned(),
    title:           info.problem_title.clone(),
    issue_summary:   info.problem_description.clone(),
    category:        Some(category_for_cause(
      causes.first().and_then(|c| c.cause_type.as_deref()),
    )),
    manufacturer:    info.manufacturer.clone().filter(|m| !m.is_empty()),
    process_tags,
    material_tags:   Vec::new(),
    structure_tags:  Vec::new(),
    function_tags:   Vec::new(),
    similarity:      None,
    related_objects: RelatedObjects {
      components: non_empty(&info.component_part_number),
      batches:    non_empty(&info.batch_number),
      suppliers:  non_empty(&info.manufacturer),
      projects:   impact.map(|i| i.affected_projects.clone()).unwrap_or_default(),
    },
    metrics:         ContextMetrics {
      affected_batches: Some(impact.map_or(0, |i| i.affected_batches.len()) as f64),
      defect_rate: Some(phenomenon.and_then(|p| p.failure_rate).unwrap_or(0.0)),
      failure_trend: Some(trend_for_conclusions(
        analysis.map_or(0, |a| a.preliminary_conclusions.len()),
      )),
      ..Default::default()
    },
  })
}
