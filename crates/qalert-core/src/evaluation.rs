//! Evaluation contexts and per-pair evaluation outcomes.
//!
//! A [`RuleEvaluationContext`] is a normalised description of one quality
//! issue. It is never persisted: each evaluation pass builds its contexts,
//! tests them against every enabled rule and drops them.

use serde::{Deserialize, Serialize};

use crate::rule::{AlertCategory, MatchAttribute};

/// Objects referenced by an issue; copied verbatim onto raised alerts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelatedObjects {
  pub components: Vec<String>,
  pub batches:    Vec<String>,
  pub suppliers:  Vec<String>,
  pub projects:   Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureTrend {
  Increasing,
  Stable,
  Decreasing,
}

/// Either precomputed sub-scores or the raw signals they are derived from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextMetrics {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub impact_score:     Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub severity_score:   Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub trend_score:      Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub affected_batches: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub affected_units:   Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub defect_rate:      Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure_trend:    Option<FailureTrend>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluationContext {
  /// External correlation key; also the dedup key together with the rule.
  pub source_issue_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title:           Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub issue_summary:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category:        Option<AlertCategory>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub manufacturer:    Option<String>,
  #[serde(default)]
  pub process_tags:    Vec<String>,
  #[serde(default)]
  pub material_tags:   Vec<String>,
  #[serde(default)]
  pub structure_tags:  Vec<String>,
  #[serde(default)]
  pub function_tags:   Vec<String>,
  /// Overrides the presence-based similarity when supplied.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub similarity:      Option<f64>,
  #[serde(default)]
  pub related_objects: RelatedObjects,
  #[serde(default)]
  pub metrics:         ContextMetrics,
}

impl RuleEvaluationContext {
  pub fn new(source_issue_id: impl Into<String>) -> Self {
    Self { source_issue_id: source_issue_id.into(), ..Default::default() }
  }

  /// The values a criterion on `attribute` is tested against. An empty
  /// manufacturer counts as absent.
  pub fn attribute_values(&self, attribute: MatchAttribute) -> &[String] {
    match attribute {
      MatchAttribute::Manufacturer => match &self.manufacturer {
        Some(m) if !m.is_empty() => std::slice::from_ref(m),
        _ => &[],
      },
      MatchAttribute::Process => &self.process_tags,
      MatchAttribute::Material => &self.material_tags,
      MatchAttribute::Structure => &self.structure_tags,
      MatchAttribute::Function => &self.function_tags,
    }
  }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Why a `(rule, context)` pair did not produce an alert. These are data,
/// not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
  MatchConditionFailed,
  DuplicateAlert,
  ExecutionError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluationResult {
  pub rule_id:        String,
  pub context_id:     String,
  pub created:        bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub skipped_reason: Option<SkipReason>,
}

impl RuleEvaluationResult {
  pub fn created(rule_id: &str, context_id: &str) -> Self {
    Self {
      rule_id:        rule_id.to_owned(),
      context_id:     context_id.to_owned(),
      created:        true,
      skipped_reason: None,
    }
  }

  pub fn skipped(rule_id: &str, context_id: &str, reason: SkipReason) -> Self {
    Self {
      rule_id:        rule_id.to_owned(),
      context_id:     context_id.to_owned(),
      created:        false,
      skipped_reason: Some(reason),
    }
  }
}
