//! Storage traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g. `qalert-store-sqlite`).
//! Services, the engine and the HTTP layer depend on these abstractions, not
//! on any concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
  alert::{
    AlertLevel, AlertStatus, Assignment, QualityAlert, StatisticsBucket,
    StatusChange,
  },
  rule::{AlertCategory, AlertRule},
  zeroing::QualityZeroingRecord,
};

// ─── Query types ─────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Caller-facing alert filter, as accepted by `listAlerts`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertFilter {
  pub level:      Option<AlertLevel>,
  pub status:     Option<AlertStatus>,
  pub category:   Option<AlertCategory>,
  /// Membership in `relatedObjects.suppliers`.
  pub supplier:   Option<String>,
  /// Membership in `relatedObjects.components`.
  pub component:  Option<String>,
  /// Case-insensitive substring over title, description and issue summary.
  pub keyword:    Option<String>,
  pub start_date: Option<DateTime<Utc>>,
  pub end_date:   Option<DateTime<Utc>>,
  pub page:       Option<u32>,
  pub limit:      Option<u32>,
}

impl AlertFilter {
  /// Resolve paging defaults and bounds into a store query.
  pub fn into_query(self) -> AlertQuery {
    let page = self.page.unwrap_or(1).max(1);
    let limit = self
      .limit
      .unwrap_or(DEFAULT_PAGE_LIMIT)
      .clamp(1, MAX_PAGE_LIMIT);
    AlertQuery {
      level: self.level,
      status: self.status,
      category: self.category,
      supplier: self.supplier.filter(|s| !s.is_empty()),
      component: self.component.filter(|s| !s.is_empty()),
      keyword: self.keyword.filter(|s| !s.is_empty()),
      created_after: self.start_date,
      created_before: self.end_date,
      page,
      limit,
    }
  }
}

/// Parameters for [`AlertStore::list_alerts`], with paging already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertQuery {
  pub level:          Option<AlertLevel>,
  pub status:         Option<AlertStatus>,
  pub category:       Option<AlertCategory>,
  pub supplier:       Option<String>,
  pub component:      Option<String>,
  pub keyword:        Option<String>,
  /// Inclusive lower bound on `createdAt`.
  pub created_after:  Option<DateTime<Utc>>,
  /// Inclusive upper bound on `createdAt`.
  pub created_before: Option<DateTime<Utc>>,
  /// 1-based.
  pub page:           u32,
  pub limit:          u32,
}

impl AlertQuery {
  pub fn offset(&self) -> u64 {
    u64::from(self.page - 1) * u64::from(self.limit)
  }
}

/// One page of alerts, newest first.
#[derive(Debug, Clone)]
pub struct AlertPage {
  pub items: Vec<QualityAlert>,
  pub total: u64,
  pub page:  u32,
  pub limit: u32,
}

// ─── RuleStore ───────────────────────────────────────────────────────────────

/// Persistence for [`AlertRule`] documents. There is no delete operation.
pub trait RuleStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new rule. Returns `None` if the `rule_id` is already taken.
  fn insert_rule(
    &self,
    rule: AlertRule,
  ) -> impl Future<Output = Result<Option<AlertRule>, Self::Error>> + Send + '_;

  /// Retrieve a rule by id. Returns `None` if not found.
  fn get_rule<'a>(
    &'a self,
    rule_id: &'a str,
  ) -> impl Future<Output = Result<Option<AlertRule>, Self::Error>> + Send + 'a;

  /// Overwrite an existing rule, keyed by `rule.rule_id`. Returns `None` if
  /// no such rule exists.
  fn replace_rule(
    &self,
    rule: AlertRule,
  ) -> impl Future<Output = Result<Option<AlertRule>, Self::Error>> + Send + '_;

  /// List rules ordered by `(priority asc, created_at desc)`.
  fn list_rules(
    &self,
    enabled_only: bool,
  ) -> impl Future<Output = Result<Vec<AlertRule>, Self::Error>> + Send + '_;
}

// ─── AlertStore ──────────────────────────────────────────────────────────────

/// Persistence for [`QualityAlert`] documents. Alerts are never deleted.
pub trait AlertStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a fully-built alert.
  fn insert_alert(
    &self,
    alert: QualityAlert,
  ) -> impl Future<Output = Result<QualityAlert, Self::Error>> + Send + '_;

  /// Persist `alert` unless a non-terminal alert with the same rule and
  /// source issue was created at or after `since`. The check and the insert
  /// happen atomically. Returns `None` when suppressed.
  fn insert_alert_unless_recent(
    &self,
    alert: QualityAlert,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<QualityAlert>, Self::Error>> + Send + '_;

  /// Retrieve an alert by id. Returns `None` if not found.
  fn get_alert<'a>(
    &'a self,
    alert_id: &'a str,
  ) -> impl Future<Output = Result<Option<QualityAlert>, Self::Error>> + Send + 'a;

  /// One page of alerts matching `query`, newest first, plus the total
  /// number of matches.
  fn list_alerts<'a>(
    &'a self,
    query: &'a AlertQuery,
  ) -> impl Future<Output = Result<(Vec<QualityAlert>, u64), Self::Error>> + Send + 'a;

  /// Atomically apply [`QualityAlert::transition`]. Returns `None` if the
  /// alert does not exist.
  fn record_status(
    &self,
    alert_id: String,
    change: StatusChange,
  ) -> impl Future<Output = Result<Option<QualityAlert>, Self::Error>> + Send + '_;

  /// Atomically append an assignment. Returns `None` if the alert does not
  /// exist.
  fn push_assignment(
    &self,
    alert_id: String,
    assignment: Assignment,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<QualityAlert>, Self::Error>> + Send + '_;

  /// Count alerts created within `[since, until]`, grouped by
  /// `(level, category)`.
  fn count_by_level_and_category(
    &self,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<StatisticsBucket>, Self::Error>> + Send + '_;
}

// ─── ZeroingSource ───────────────────────────────────────────────────────────

/// The upstream incident store the context builder harvests from.
pub trait ZeroingSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Records updated at or after `since` (unbounded when `None`), newest
  /// first, at most `limit`.
  fn recent_zeroing(
    &self,
    since: Option<DateTime<Utc>>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<QualityZeroingRecord>, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn filter_paging_is_bounded() {
    let q = AlertFilter::default().into_query();
    assert_eq!((q.page, q.limit), (1, DEFAULT_PAGE_LIMIT));

    let q = AlertFilter { page: Some(0), limit: Some(500), ..Default::default() }
      .into_query();
    assert_eq!((q.page, q.limit), (1, MAX_PAGE_LIMIT));

    let q = AlertFilter { page: Some(3), limit: Some(0), ..Default::default() }
      .into_query();
    assert_eq!((q.page, q.limit), (3, 1));
    assert_eq!(q.offset(), 2);
  }

  #[test]
  fn empty_strings_do_not_filter() {
    let q = AlertFilter {
      keyword: Some(String::new()),
      supplier: Some(String::new()),
      ..Default::default()
    }
    .into_query();
    assert!(q.keyword.is_none());
    assert!(q.supplier.is_none());
  }
}
