//! Alert rules: configurable detection policies.
//!
//! A rule names a combination of issue attributes worth watching, the
//! similarity and match-count gates an issue must pass, and how a passing
//! issue is scored and classified. Rules are never deleted; disabling one is
//! the only way to retract it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result, alert::AlertLevel};

// ─── Classification ──────────────────────────────────────────────────────────

/// The risk domain a rule (and the alerts it raises) belongs to.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertCategory {
  Environmental,
  SupplyChain,
  Process,
  Reliability,
  Compliance,
}

// ─── Matching criteria ───────────────────────────────────────────────────────

/// The context attribute a criterion is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchAttribute {
  Manufacturer,
  Process,
  Material,
  Structure,
  Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOperator {
  /// The scalar value is one of the attribute's values.
  Equals,
  /// Any attribute value appears in the value list.
  Includes,
  /// Enough of the value list appears among the attribute's values.
  Similarity,
}

/// A criterion's comparison value: either a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriterionValue {
  One(String),
  Many(Vec<String>),
}

impl CriterionValue {
  /// The value viewed as a list; a scalar is a one-element list.
  pub fn as_list(&self) -> &[String] {
    match self {
      Self::One(v) => std::slice::from_ref(v),
      Self::Many(vs) => vs,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingCriterion {
  pub attribute: MatchAttribute,
  pub operator:  MatchOperator,
  pub value:     CriterionValue,
  /// Overlap fraction required by [`MatchOperator::Similarity`].
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub weight:    Option<f64>,
}

// ─── Scoring ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskWeights {
  pub impact:   f64,
  pub severity: f64,
  pub trend:    f64,
}

impl Default for RiskWeights {
  fn default() -> Self {
    Self { impact: 0.40, severity: 0.35, trend: 0.25 }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskScoring {
  pub base_score:             f64,
  pub weights:                RiskWeights,
  pub false_positive_penalty: f64,
}

impl Default for RiskScoring {
  fn default() -> Self {
    Self {
      base_score:             50.0,
      weights:                RiskWeights::default(),
      false_positive_penalty: 5.0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelThreshold {
  pub min: f64,
}

/// Score thresholds, evaluated top-down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelMapping {
  pub critical: LevelThreshold,
  pub warning:  LevelThreshold,
  pub info:     LevelThreshold,
}

impl Default for LevelMapping {
  fn default() -> Self {
    Self {
      critical: LevelThreshold { min: 80.0 },
      warning:  LevelThreshold { min: 60.0 },
      info:     LevelThreshold { min: 40.0 },
    }
  }
}

impl LevelMapping {
  /// Classify `score`. Anything below `info.min` still floors at `Info`.
  pub fn level_for(&self, score: f64) -> AlertLevel {
    if score >= self.critical.min {
      AlertLevel::Critical
    } else if score >= self.warning.min {
      AlertLevel::Warning
    } else {
      AlertLevel::Info
    }
  }

  pub fn validate(&self) -> Result<()> {
    let (critical, warning, info) =
      (self.critical.min, self.warning.min, self.info.min);
    if critical >= warning && warning >= info {
      Ok(())
    } else {
      Err(Error::InvalidLevelMapping { critical, warning, info })
    }
  }
}

// ─── Notification & scope ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
  System,
  Email,
  Sms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPolicy {
  pub channels:           Vec<NotificationChannel>,
  pub recipients:         Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub escalation_minutes: Option<u32>,
}

impl Default for NotificationPolicy {
  fn default() -> Self {
    Self {
      channels:           vec![NotificationChannel::System],
      recipients:         Vec::new(),
      escalation_minutes: None,
    }
  }
}

/// Informational bounds on what a rule is meant to watch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleScope {
  pub projects:           Vec<String>,
  pub suppliers:          Vec<String>,
  pub component_families: Vec<String>,
}

// ─── AlertRule ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
  pub rule_id:              String,
  pub name:                 String,
  pub category:             AlertCategory,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description:          Option<String>,
  pub matching_criteria:    Vec<MatchingCriterion>,
  pub minimum_matches:      u32,
  pub similarity_threshold: f64,
  pub time_window_days:     u32,
  #[serde(default)]
  pub scope:                RuleScope,
  #[serde(default)]
  pub risk_scoring:         RiskScoring,
  #[serde(default)]
  pub level_mapping:        LevelMapping,
  #[serde(default)]
  pub notification:         NotificationPolicy,
  pub enabled:              bool,
  /// Lower values are evaluated first.
  pub priority:             i32,
  pub created_by:           String,
  pub updated_by:           String,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

impl AlertRule {
  /// A stored minimum of zero behaves as one.
  pub fn effective_minimum_matches(&self) -> usize {
    self.minimum_matches.max(1) as usize
  }

  /// Check the structural invariants every stored rule must satisfy.
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::MissingField("name"));
    }
    if self.matching_criteria.is_empty() {
      return Err(Error::EmptyCriteria);
    }
    if !(0.0..=1.0).contains(&self.similarity_threshold) {
      return Err(Error::InvalidThreshold {
        field: "similarityThreshold",
        value: self.similarity_threshold,
      });
    }
    self.level_mapping.validate()
  }
}

// ─── NewAlertRule ────────────────────────────────────────────────────────────

fn default_minimum_matches() -> u32 { 2 }
fn default_similarity_threshold() -> f64 { 0.6 }
fn default_time_window_days() -> u32 { 365 }
fn default_enabled() -> bool { true }
fn default_priority() -> i32 { 100 }

/// Input to rule creation. `ruleId` is generated when absent; timestamps
/// are always set by the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlertRule {
  pub rule_id:              Option<String>,
  pub name:                 String,
  pub category:             AlertCategory,
  pub description:          Option<String>,
  pub matching_criteria:    Vec<MatchingCriterion>,
  #[serde(default = "default_minimum_matches")]
  pub minimum_matches:      u32,
  #[serde(default = "default_similarity_threshold")]
  pub similarity_threshold: f64,
  #[serde(default = "default_time_window_days")]
  pub time_window_days:     u32,
  #[serde(default)]
  pub scope:                RuleScope,
  #[serde(default)]
  pub risk_scoring:         RiskScoring,
  #[serde(default)]
  pub level_mapping:        LevelMapping,
  #[serde(default)]
  pub notification:         NotificationPolicy,
  #[serde(default = "default_enabled")]
  pub enabled:              bool,
  #[serde(default = "default_priority")]
  pub priority:             i32,
  pub created_by:           Option<String>,
  pub updated_by:           Option<String>,
}

impl NewAlertRule {
  /// Convenience constructor with every optional field at its default.
  pub fn new(
    name: impl Into<String>,
    category: AlertCategory,
    matching_criteria: Vec<MatchingCriterion>,
  ) -> Self {
    Self {
      rule_id: None,
      name: name.into(),
      category,
      description: None,
      matching_criteria,
      minimum_matches: default_minimum_matches(),
      similarity_threshold: default_similarity_threshold(),
      time_window_days: default_time_window_days(),
      scope: RuleScope::default(),
      risk_scoring: RiskScoring::default(),
      level_mapping: LevelMapping::default(),
      notification: NotificationPolicy::default(),
      enabled: default_enabled(),
      priority: default_priority(),
      created_by: None,
      updated_by: None,
    }
  }

  /// Materialise the stored rule. `updatedBy` falls back to `createdBy`,
  /// which itself falls back to `"system"`.
  pub fn into_rule(self, rule_id: String, now: DateTime<Utc>) -> AlertRule {
    let created_by = self.created_by.unwrap_or_else(|| "system".to_owned());
    let updated_by = self.updated_by.unwrap_or_else(|| created_by.clone());
    AlertRule {
      rule_id,
      name: self.name,
      category: self.category,
      description: self.description,
      matching_criteria: self.matching_criteria,
      minimum_matches: self.minimum_matches,
      similarity_threshold: self.similarity_threshold,
      time_window_days: self.time_window_days,
      scope: self.scope,
      risk_scoring: self.risk_scoring,
      level_mapping: self.level_mapping,
      notification: self.notification,
      enabled: self.enabled,
      priority: self.priority,
      created_by,
      updated_by,
      created_at: now,
      updated_at: now,
    }
  }
}

// ─── RulePatch ───────────────────────────────────────────────────────────────

/// A partial update. Identity and creation metadata cannot be patched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePatch {
  pub name:                 Option<String>,
  pub category:             Option<AlertCategory>,
  pub description:          Option<String>,
  pub matching_criteria:    Option<Vec<MatchingCriterion>>,
  pub minimum_matches:      Option<u32>,
  pub similarity_threshold: Option<f64>,
  pub time_window_days:     Option<u32>,
  pub scope:                Option<RuleScope>,
  pub risk_scoring:         Option<RiskScoring>,
  pub level_mapping:        Option<LevelMapping>,
  pub notification:         Option<NotificationPolicy>,
  pub enabled:              Option<bool>,
  pub priority:             Option<i32>,
  pub updated_by:           Option<String>,
}

impl RulePatch {
  pub fn apply(self, rule: &mut AlertRule, now: DateTime<Utc>) {
    if let Some(v) = self.name { rule.name = v; }
    if let Some(v) = self.category { rule.category = v; }
    if let Some(v) = self.description { rule.description = Some(v); }
    if let Some(v) = self.matching_criteria { rule.matching_criteria = v; }
    if let Some(v) = self.minimum_matches { rule.minimum_matches = v; }
    if let Some(v) = self.similarity_threshold { rule.similarity_threshold = v; }
    if let Some(v) = self.time_window_days { rule.time_window_days = v; }
    if let Some(v) = self.scope { rule.scope = v; }
    if let Some(v) = self.risk_scoring { rule.risk_scoring = v; }
    if let Some(v) = self.level_mapping { rule.level_mapping = v; }
    if let Some(v) = self.notification { rule.notification = v; }
    if let Some(v) = self.enabled { rule.enabled = v; }
    if let Some(v) = self.priority { rule.priority = v; }
    rule.updated_by = self.updated_by.unwrap_or_else(|| "system".to_owned());
    rule.updated_at = now;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn level_mapping_floors_at_info() {
    let mapping = LevelMapping::default();
    assert_eq!(mapping.level_for(95.0), AlertLevel::Critical);
    assert_eq!(mapping.level_for(80.0), AlertLevel::Critical);
    assert_eq!(mapping.level_for(79.9), AlertLevel::Warning);
    assert_eq!(mapping.level_for(40.0), AlertLevel::Info);
    assert_eq!(mapping.level_for(3.0), AlertLevel::Info);
  }

  #[test]
  fn level_mapping_rejects_inverted_thresholds() {
    let mapping = LevelMapping {
      critical: LevelThreshold { min: 50.0 },
      warning:  LevelThreshold { min: 60.0 },
      info:     LevelThreshold { min: 40.0 },
    };
    assert!(matches!(
      mapping.validate(),
      Err(Error::InvalidLevelMapping { .. })
    ));
  }

  #[test]
  fn new_rule_deserialises_with_defaults() {
    let rule: NewAlertRule = serde_json::from_value(serde_json::json!({
      "name": "钽电容高温失效",
      "category": "supply_chain",
      "matchingCriteria": [
        { "attribute": "manufacturer", "operator": "equals", "value": "AVX" },
        { "attribute": "material", "operator": "includes", "value": ["tantalum"] }
      ]
    }))
    .unwrap();

    assert_eq!(rule.minimum_matches, 2);
    assert_eq!(rule.similarity_threshold, 0.6);
    assert_eq!(rule.priority, 100);
    assert!(rule.enabled);
    assert_eq!(rule.risk_scoring.base_score, 50.0);
    assert_eq!(rule.level_mapping.critical.min, 80.0);
    assert_eq!(
      rule.matching_criteria[0].value,
      CriterionValue::One("AVX".into())
    );
    assert_eq!(rule.matching_criteria[1].value.as_list(), ["tantalum"]);
  }

  #[test]
  fn into_rule_defaults_updated_by_to_created_by() {
    let mut input = NewAlertRule::new("r", AlertCategory::Process, vec![]);
    input.created_by = Some("qa-lead".into());
    let rule = input.into_rule("RULE-1".into(), Utc::now());
    assert_eq!(rule.updated_by, "qa-lead");

    let rule = NewAlertRule::new("r", AlertCategory::Process, vec![])
      .into_rule("RULE-2".into(), Utc::now());
    assert_eq!(rule.created_by, "system");
    assert_eq!(rule.updated_by, "system");
  }

  #[test]
  fn validate_requires_criteria() {
    let rule = NewAlertRule::new("r", AlertCategory::Process, vec![])
      .into_rule("RULE-1".into(), Utc::now());
    assert!(matches!(rule.validate(), Err(Error::EmptyCriteria)));
  }
}
