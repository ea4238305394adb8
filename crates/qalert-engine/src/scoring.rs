//! Risk scoring and level assignment.
//!
//! Pure functions of a rule and a context, so the same inputs always give
//! the same match count, similarity, score and level.

use qalert_core::{
  alert::{AlertLevel, ScoreBreakdown},
  evaluation::{ContextMetrics, FailureTrend, RuleEvaluationContext},
  rule::{AlertCategory, AlertRule},
};

use crate::matcher;

/// Clamp a derived sub-score into `[0, 100]`. Non-positive and NaN inputs
/// score zero.
pub fn normalize_score(value: f64) -> f64 {
  if value.is_nan() || value <= 0.0 { 0.0 } else { value.min(100.0) }
}

pub fn impact_score(metrics: &ContextMetrics) -> f64 {
  metrics.impact_score.unwrap_or_else(|| {
    normalize_score(
      metrics.affected_batches.unwrap_or(0.0) * 10.0
        + metrics.affected_units.unwrap_or(0.0) * 0.01,
    )
  })
}

pub fn severity_score(context: &RuleEvaluationContext) -> f64 {
  let metrics = &context.metrics;
  metrics.severity_score.unwrap_or_else(|| {
    let floor = if context.category == Some(AlertCategory::Process) { 30.0 } else { 15.0 };
    normalize_score(metrics.defect_rate.unwrap_or(0.0) * 20.0 + floor)
  })
}

pub fn trend_score(metrics: &ContextMetrics) -> f64 {
  metrics.trend_score.unwrap_or(match metrics.failure_trend {
    Some(FailureTrend::Increasing) => 90.0,
    Some(FailureTrend::Decreasing) => 40.0,
    Some(FailureTrend::Stable) | None => 60.0,
  })
}

/// Weighted risk score in `[0, 100]` and the inputs that produced it.
pub fn risk_score(
  rule: &AlertRule,
  context: &RuleEvaluationContext,
) -> (u8, ScoreBreakdown) {
  let scoring = &rule.risk_scoring;
  let breakdown = ScoreBreakdown {
    base_score: scoring.base_score,
    impact:     impact_score(&context.metrics),
    severity:   severity_score(context),
    trend:      trend_score(&context.metrics),
  };
  let weighted = breakdown.base_score
    + breakdown.impact * scoring.weights.impact
    + breakdown.severity * scoring.weights.severity
    + breakdown.trend * scoring.weights.trend;
  (weighted.round().clamp(0.0, 100.0) as u8, breakdown)
}

/// Everything the engine derives from one `(rule, context)` pair that
/// passed the match gates.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
  pub match_count: usize,
  pub similarity:  f64,
  pub risk_score:  u8,
  pub level:       AlertLevel,
  pub breakdown:   ScoreBreakdown,
}

/// Apply the minimum-match and similarity gates, then score. `None` means
/// the pair does not qualify for an alert.
pub fn assess(rule: &AlertRule, context: &RuleEvaluationContext) -> Option<Assessment> {
  let match_count = matcher::match_count(rule, context);
  if match_count < rule.effective_minimum_matches() {
    return None;
  }

  let similarity = matcher::similarity(context);
  if similarity < rule.similarity_threshold {
    return None;
  }

  let (risk_score, breakdown) = risk_score(rule, context);
  let level = rule.level_mapping.level_for(f64::from(risk_score));
  Some(Assessment { match_count, similarity, risk_score, level, breakdown })
}
