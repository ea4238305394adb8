//! Quality-zeroing records: corrective-action closure reports harvested as
//! an upstream source of evaluation contexts.
//!
//! Only the fields the context builder reads are modelled; every section is
//! optional because upstream records are filled in phase by phase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProblemInfo {
  pub problem_title:         Option<String>,
  pub problem_description:   Option<String>,
  pub component_part_number: Option<String>,
  pub manufacturer:          Option<String>,
  pub batch_number:          Option<String>,
  /// `critical`, `major` or `minor`.
  pub severity:              Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ZeroingStatus {
  /// `problem_analysis`, `root_cause_analysis`, `corrective_action`,
  /// `verification` or `closure`.
  pub current_phase:  Option<String>,
  pub overall_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhenomenonAnalysis {
  pub failure_rate:      Option<f64>,
  pub affected_quantity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImpactAssessment {
  pub affected_batches:  Vec<String>,
  pub affected_projects: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProblemAnalysis {
  pub phenomenon_analysis:     Option<PhenomenonAnalysis>,
  pub impact_assessment:       Option<ImpactAssessment>,
  pub preliminary_conclusions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RootCause {
  pub cause_id:          Option<String>,
  /// `design`, `manufacturing`, `material`, `process`, `human` or
  /// `environmental`.
  pub cause_type:        Option<String>,
  pub cause_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RootCauseAnalysis {
  pub root_causes: Vec<RootCause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityZeroingRecord {
  pub zeroing_id:          String,
  #[serde(default)]
  pub problem_id:          Option<String>,
  #[serde(default)]
  pub problem_info:        Option<ProblemInfo>,
  #[serde(default)]
  pub zeroing_status:      Option<ZeroingStatus>,
  #[serde(default)]
  pub problem_analysis:    Option<ProblemAnalysis>,
  #[serde(default)]
  pub root_cause_analysis: Option<RootCauseAnalysis>,
  pub updated_at:          DateTime<Utc>,
}

impl QualityZeroingRecord {
  /// The correlation key used as a context's `sourceIssueId`.
  pub fn issue_id(&self) -> &str {
    self
      .problem_id
      .as_deref()
      .filter(|id| !id.is_empty())
      .unwrap_or(&self.zeroing_id)
  }
}
