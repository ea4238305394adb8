//! Quality alerts: the materialised output of a rule match and the unit of
//! remediation tracking.
//!
//! An alert is created once, by the matching engine. Afterwards it only
//! changes through status transitions and assignment creation, both of which
//! append to history rather than rewrite it.

use std::str::FromStr;

use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  evaluation::RelatedObjects,
  rule::AlertCategory,
};

// ─── Enumerations ────────────────────────────────────────────────────────────

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
pub enum AlertLevel {
  Critical,
  Warning,
  Info,
}

impl AlertLevel {
  /// Severity rank: `Info` 0, `Warning` 1, `Critical` 2.
  pub fn rank(self) -> u8 {
    match self {
      Self::Info => 0,
      Self::Warning => 1,
      Self::Critical => 2,
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertStatus {
  PendingAnalysis,
  PendingAction,
  InProgress,
  Verifying,
  Closed,
  FalseAlarm,
}

impl AlertStatus {
  /// Terminal alerts no longer suppress new alerts for the same issue.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Closed | Self::FalseAlarm)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPriority {
  High,
  Medium,
  Low,
}

impl From<AlertLevel> for RecommendationPriority {
  fn from(level: AlertLevel) -> Self {
    match level {
      AlertLevel::Critical => Self::High,
      AlertLevel::Warning => Self::Medium,
      AlertLevel::Info => Self::Low,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
  Planned,
  InProgress,
  Completed,
  Overdue,
}

// ─── Sub-documents ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingAttributes {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub manufacturer:   Option<String>,
  #[serde(default)]
  pub process_tags:   Vec<String>,
  #[serde(default)]
  pub material_tags:  Vec<String>,
  #[serde(default)]
  pub structure_tags: Vec<String>,
  #[serde(default)]
  pub function_tags:  Vec<String>,
  pub similarity:     f64,
}

/// The inputs and weights that produced a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
  pub base_score: f64,
  pub impact:     f64,
  pub severity:   f64,
  pub trend:      f64,
}

/// Immutable record of what caused an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSnapshot {
  pub source_issue_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub issue_summary:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub metrics:         Option<ScoreBreakdown>,
  pub triggered_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
  pub action:           String,
  pub priority:         RecommendationPriority,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub estimated_impact: Option<String>,
}

/// One entry of the append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
  pub status:     AlertStatus,
  pub actor:      String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note:       Option<String>,
  pub updated_at: DateTime<Utc>,
}

/// A remediation action attached to an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
  pub action_id:       String,
  pub description:     String,
  pub responsible:     String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub deadline:        Option<DateTime<Utc>>,
  pub status:          AssignmentStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completion_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertStatistics {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub response_time_hours:   Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resolution_time_hours: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub effectiveness_score:   Option<f64>,
}

// ─── QualityAlert ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityAlert {
  pub alert_id:            String,
  pub rule_id:             String,
  pub title:               String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description:         Option<String>,
  pub category:            AlertCategory,
  pub level:               AlertLevel,
  /// Integer risk score in `0..=100`.
  pub risk_score:          u8,
  pub matching_attributes: MatchingAttributes,
  #[serde(default)]
  pub related_objects:     RelatedObjects,
  pub trigger_snapshot:    TriggerSnapshot,
  #[serde(default)]
  pub recommendations:     Vec<Recommendation>,
  pub current_status:      AlertStatus,
  pub status_flow:         Vec<StatusChange>,
  #[serde(default)]
  pub assignments:         Vec<Assignment>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub statistics:          Option<AlertStatistics>,
  pub created_at:          DateTime<Utc>,
  pub updated_at:          DateTime<Utc>,
  /// Set exactly while `current_status` is `Closed`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub closed_at:           Option<DateTime<Utc>>,
}

impl QualityAlert {
  /// Apply a status transition. Any status may follow any other; the entry
  /// is appended to `status_flow` and `closed_at` tracks `Closed`.
  pub fn transition(&mut self, change: StatusChange) {
    let at = change.updated_at;
    self.current_status = change.status;
    self.closed_at = (change.status == AlertStatus::Closed).then_some(at);
    self.updated_at = at;
    self.status_flow.push(change);
  }

  pub fn push_assignment(&mut self, assignment: Assignment, at: DateTime<Utc>) {
    self.assignments.push(assignment);
    self.updated_at = at;
  }
}

// ─── NewAlert ────────────────────────────────────────────────────────────────

/// Input to alert creation. The service assigns `alertId` when absent and
/// seeds `statusFlow` when it is empty.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
  pub alert_id:            Option<String>,
  pub rule_id:             String,
  pub title:               String,
  pub description:         Option<String>,
  pub category:            AlertCategory,
  pub level:               AlertLevel,
  pub risk_score:          u8,
  pub matching_attributes: MatchingAttributes,
  #[serde(default)]
  pub related_objects:     RelatedObjects,
  pub trigger_snapshot:    TriggerSnapshot,
  #[serde(default)]
  pub recommendations:     Vec<Recommendation>,
  /// Initial status; defaults to `PendingAnalysis`.
  pub current_status:      Option<AlertStatus>,
  #[serde(default)]
  pub status_flow:         Vec<StatusChange>,
}

impl NewAlert {
  /// Materialise the stored alert. The first `status_flow` entry becomes the
  /// current status when no explicit status was given.
  pub fn into_alert(self, alert_id: String, now: DateTime<Utc>) -> QualityAlert {
    let mut status_flow = self.status_flow;
    let current_status = self
      .current_status
      .or_else(|| status_flow.last().map(|c| c.status))
      .unwrap_or(AlertStatus::PendingAnalysis);

    if status_flow.is_empty() {
      status_flow.push(StatusChange {
        status:     current_status,
        actor:      self.trigger_snapshot.source_issue_id.clone(),
        note:       Some("预警触发".to_owned()),
        updated_at: now,
      });
    }

    QualityAlert {
      alert_id,
      rule_id: self.rule_id,
      title: self.title,
      description: self.description,
      category: self.category,
      level: self.level,
      risk_score: self.risk_score,
      matching_attributes: self.matching_attributes,
      related_objects: self.related_objects,
      trigger_snapshot: self.trigger_snapshot,
      recommendations: self.recommendations,
      current_status,
      status_flow,
      assignments: Vec::new(),
      statistics: None,
      created_at: now,
      updated_at: now,
      closed_at: (current_status == AlertStatus::Closed).then_some(now),
    }
  }
}

/// Input to assignment creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
  pub description: String,
  pub responsible: String,
  #[serde(default)]
  pub deadline:    Option<DateTime<Utc>>,
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Look-back window for [`StatisticsBucket`] aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeRange {
  #[default]
  Days30,
  Days90,
  Year1,
}

impl FromStr for TimeRange {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "30d" => Ok(Self::Days30),
      "90d" => Ok(Self::Days90),
      "1y" => Ok(Self::Year1),
      other => Err(Error::UnknownTimeRange(other.to_owned())),
    }
  }
}

impl TimeRange {
  /// The start of the window ending at `end`.
  pub fn start_from(self, end: DateTime<Utc>) -> DateTime<Utc> {
    match self {
      Self::Days30 => end - TimeDelta::days(30),
      Self::Days90 => end - TimeDelta::days(90),
      Self::Year1 => end
        .checked_sub_months(Months::new(12))
        .unwrap_or(DateTime::<Utc>::MIN_UTC),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsKey {
  pub level:    AlertLevel,
  pub category: AlertCategory,
}

/// Count of alerts sharing one `(level, category)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsBucket {
  #[serde(rename = "_id")]
  pub key:   StatisticsKey,
  pub count: u64,
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn new_alert() -> NewAlert {
    NewAlert {
      alert_id:            None,
      rule_id:             "RULE-1".into(),
      title:               "t".into(),
      description:         None,
      category:            AlertCategory::Process,
      level:               AlertLevel::Warning,
      risk_score:          65,
      matching_attributes: MatchingAttributes::default(),
      related_objects:     RelatedObjects::default(),
      trigger_snapshot:    TriggerSnapshot {
        source_issue_id: "ISSUE-9".into(),
        issue_summary:   None,
        metrics:         None,
        triggered_at:    Utc::now(),
      },
      recommendations:     vec![],
      current_status:      None,
      status_flow:         vec![],
    }
  }

  #[test]
  fn into_alert_seeds_status_flow() {
    let alert = new_alert().into_alert("QA-1".into(), Utc::now());
    assert_eq!(alert.current_status, AlertStatus::PendingAnalysis);
    assert_eq!(alert.status_flow.len(), 1);
    assert_eq!(alert.status_flow[0].status, AlertStatus::PendingAnalysis);
    assert_eq!(alert.status_flow[0].actor, "ISSUE-9");
    assert_eq!(alert.status_flow[0].note.as_deref(), Some("预警触发"));
    assert!(alert.closed_at.is_none());
  }

  #[test]
  fn transition_tracks_closed_at() {
    let mut alert = new_alert().into_alert("QA-1".into(), Utc::now());
    let at = Utc::now();
    alert.transition(StatusChange {
      status:     AlertStatus::Closed,
      actor:      "ops".into(),
      note:       None,
      updated_at: at,
    });
    assert_eq!(alert.closed_at, Some(at));
    assert_eq!(alert.status_flow.len(), 2);

    alert.transition(StatusChange {
      status:     AlertStatus::InProgress,
      actor:      "ops".into(),
      note:       Some("reopened".into()),
      updated_at: at,
    });
    assert!(alert.closed_at.is_none());
    assert_eq!(alert.status_flow.len(), 3);
    assert_eq!(alert.status_flow[1].status, AlertStatus::Closed);
  }

  #[test]
  fn time_range_windows() {
    let end = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
    assert_eq!(
      TimeRange::Days30.start_from(end),
      Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    );
    assert_eq!(
      TimeRange::Year1.start_from(end),
      Utc.with_ymd_and_hms(2023, 3, 31, 12, 0, 0).unwrap()
    );
    assert!("7d".parse::<TimeRange>().is_err());
    assert_eq!("90d".parse::<TimeRange>().unwrap(), TimeRange::Days90);
  }

  #[test]
  fn statistics_bucket_uses_id_key() {
    let bucket = StatisticsBucket {
      key:   StatisticsKey {
        level:    AlertLevel::Critical,
        category: AlertCategory::SupplyChain,
      },
      count: 3,
    };
    let json = serde_json::to_value(bucket).unwrap();
    assert_eq!(json["_id"]["level"], "critical");
    assert_eq!(json["_id"]["category"], "supply_chain");
    assert_eq!(json["count"], 3);
  }
}
