//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Records are stored as compact JSON documents. Timestamps used in indexed
//! columns are fixed-width RFC 3339 (`...T..:..:..ffffffZ`) so text order is
//! time order. Enum columns hold the snake_case names.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};

use qalert_core::{
  alert::{AlertLevel, QualityAlert, StatisticsBucket, StatisticsKey},
  rule::{AlertCategory, AlertRule},
  zeroing::QualityZeroingRecord,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ─── JSON documents ──────────────────────────────────────────────────────────

pub fn encode_doc<T: Serialize>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_doc<T: DeserializeOwned>(doc: &str) -> Result<T> {
  Ok(serde_json::from_str(doc)?)
}

/// Decoding inside a `Connection::call` closure, where errors must be
/// `tokio_rusqlite::Error`.
pub fn decode_doc_in_call<T: DeserializeOwned>(
  doc: &str,
) -> tokio_rusqlite::Result<T> {
  serde_json::from_str(doc).map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Column values for one `alert_rules` row.
pub struct RuleRow {
  pub rule_id:    String,
  pub enabled:    bool,
  pub priority:   i32,
  pub created_at: String,
  pub doc:        String,
}

impl RuleRow {
  pub fn encode(rule: &AlertRule) -> Result<Self> {
    Ok(Self {
      rule_id:    rule.rule_id.clone(),
      enabled:    rule.enabled,
      priority:   rule.priority,
      created_at: encode_dt(rule.created_at),
      doc:        encode_doc(rule)?,
    })
  }
}

/// Column values for one `quality_alerts` row.
pub struct AlertRow {
  pub alert_id:        String,
  pub rule_id:         String,
  pub source_issue_id: String,
  pub level:           String,
  pub category:        String,
  pub current_status:  String,
  pub title:           String,
  pub description:     Option<String>,
  pub issue_summary:   Option<String>,
  pub created_at:      String,
  pub updated_at:      String,
  pub doc:             String,
}

impl AlertRow {
  pub fn encode(alert: &QualityAlert) -> serde_json::Result<Self> {
    Ok(Self {
      alert_id:        alert.alert_id.clone(),
      rule_id:         alert.rule_id.clone(),
      source_issue_id: alert.trigger_snapshot.source_issue_id.clone(),
      level:           alert.level.to_string(),
      category:        alert.category.to_string(),
      current_status:  alert.current_status.to_string(),
      title:           alert.title.clone(),
      description:     alert.description.clone(),
      issue_summary:   alert.trigger_snapshot.issue_summary.clone(),
      created_at:      encode_dt(alert.created_at),
      updated_at:      encode_dt(alert.updated_at),
      doc:             serde_json::to_string(alert)?,
    })
  }
}

/// Column values for one `quality_zeroing` row.
pub struct ZeroingRow {
  pub zeroing_id: String,
  pub updated_at: String,
  pub doc:        String,
}

impl ZeroingRow {
  pub fn encode(record: &QualityZeroingRecord) -> Result<Self> {
    Ok(Self {
      zeroing_id: record.zeroing_id.clone(),
      updated_at: encode_dt(record.updated_at),
      doc:        encode_doc(record)?,
    })
  }
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Intermediate row for a `GROUP BY level, category` result.
pub struct RawBucket {
  pub level:    String,
  pub category: String,
  pub count:    i64,
}

impl RawBucket {
  pub fn into_bucket(self) -> Result<StatisticsBucket> {
    let level: AlertLevel =
      self.level.parse().map_err(|_| Error::UnknownEnum {
        kind:  "level",
        value: self.level.clone(),
      })?;
    let category: AlertCategory =
      self.category.parse().map_err(|_| Error::UnknownEnum {
        kind:  "category",
        value: self.category.clone(),
      })?;
    Ok(StatisticsBucket {
      key:   StatisticsKey { level, category },
      count: u64::try_from(self.count).unwrap_or(0),
    })
  }
}
