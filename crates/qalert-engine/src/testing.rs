//! In-memory store and settable clock for engine tests.

use std::sync::{
  Mutex,
  atomic::{AtomicBool, AtomicUsize, Ordering},
};

use chrono::{DateTime, TimeDelta, TimeZone as _, Utc};
use qalert_core::{
  alert::{
    Assignment, QualityAlert, StatisticsBucket, StatisticsKey, StatusChange,
  },
  clock::Clock,
  rule::AlertRule,
  store::{AlertQuery, AlertStore, RuleStore, ZeroingSource},
  zeroing::QualityZeroingRecord,
};

#[derive(Debug, thiserror::Error)]
#[error("injected store failure")]
pub struct MemoryError;

#[derive(Default)]
struct Inner {
  rules:   Vec<AlertRule>,
  alerts:  Vec<QualityAlert>,
  zeroing: Vec<QualityZeroingRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
  inner:              Mutex<Inner>,
  pub fail_inserts:   AtomicBool,
  pub fail_rule_list: AtomicBool,
  pub fail_zeroing:   AtomicBool,
  pub zeroing_calls:  AtomicUsize,
}

impl MemoryStore {
  pub fn alerts(&self) -> Vec<QualityAlert> {
    self.inner.lock().unwrap().alerts.clone()
  }

  pub fn add_zeroing(&self, record: QualityZeroingRecord) {
    self.inner.lock().unwrap().zeroing.push(record);
  }
}

impl RuleStore for MemoryStore {
  type Error = MemoryError;

  async fn insert_rule(&self, rule: AlertRule) -> Result<Option<AlertRule>, MemoryError> {
    let mut inner = self.inner.lock().unwrap();
    if inner.rules.iter().any(|r| r.rule_id == rule.rule_id) {
      return Ok(None);
    }
    inner.rules.push(rule.clone());
    Ok(Some(rule))
  }

  async fn get_rule<'a>(&'a self, rule_id: &'a str) -> Result<Option<AlertRule>, MemoryError> {
    let inner = self.inner.lock().unwrap();
    Ok(inner.rules.iter().find(|r| r.rule_id == rule_id).cloned())
  }

  async fn replace_rule(&self, rule: AlertRule) -> Result<Option<AlertRule>, MemoryError> {
    let mut inner = self.inner.lock().unwrap();
    let Some(slot) = inner.rules.iter_mut().find(|r| r.rule_id == rule.rule_id) else {
      return Ok(None);
    };
    *slot = rule.clone();
    Ok(Some(rule))
  }

  async fn list_rules(&self, enabled_only: bool) -> Result<Vec<AlertRule>, MemoryError> {
    if self.fail_rule_list.load(Ordering::SeqCst) {
      return Err(MemoryError);
    }
    let inner = self.inner.lock().unwrap();
    let mut rules: Vec<AlertRule> = inner
      .rules
      .iter()
      .filter(|r| !enabled_only || r.enabled)
      .cloned()
      .collect();
    rules.sort_by(|a, b| {
      a.priority.cmp(&b.priority).then(b.created_at.cmp(&a.created_at))
    });
    Ok(rules)
  }
}

impl AlertStore for MemoryStore {
  type Error = MemoryError;

  async fn insert_alert(&self, alert: QualityAlert) -> Result<QualityAlert, MemoryError> {
    if self.fail_inserts.load(Ordering::SeqCst) {
      return Err(MemoryError);
    }
    self.inner.lock().unwrap().alerts.push(alert.clone());
    Ok(alert)
  }

  async fn insert_alert_unless_recent(
    &self,
    alert: QualityAlert,
    since: DateTime<Utc>,
  ) -> Result<Option<QualityAlert>, MemoryError> {
    if self.fail_inserts.load(Ordering::SeqCst) {
      return Err(MemoryError);
    }
    let mut inner = self.inner.lock().unwrap();
    let duplicate = inner.alerts.iter().any(|a| {
      a.rule_id == alert.rule_id
        && a.trigger_snapshot.source_issue_id == alert.trigger_snapshot.source_issue_id
        && a.created_at >= since
        && !a.current_status.is_terminal()
    });
    if duplicate {
      return Ok(None);
    }
    inner.alerts.push(alert.clone());
    Ok(Some(alert))
  }

  async fn get_alert<'a>(&'a self, alert_id: &'a str) -> Result<Option<QualityAlert>, MemoryError> {
    let inner = self.inner.lock().unwrap();
    Ok(inner.alerts.iter().find(|a| a.alert_id == alert_id).cloned())
  }

  async fn list_alerts<'a>(
    &'a self,
    query: &'a AlertQuery,
  ) -> Result<(Vec<QualityAlert>, u64), MemoryError> {
    let inner = self.inner.lock().unwrap();
    let keyword = query.keyword.as_deref().map(str::to_lowercase);
    let mut hits: Vec<QualityAlert> = inner
      .alerts
      .iter()
      .filter(|a| query.level.is_none_or(|l| a.level == l))
      .filter(|a| query.status.is_none_or(|s| a.current_status == s))
      .filter(|a| query.category.is_none_or(|c| a.category == c))
      .filter(|a| {
        query
          .supplier
          .as_ref()
          .is_none_or(|s| a.related_objects.suppliers.contains(s))
      })
      .filter(|a| {
        query
          .component
          .as_ref()
          .is_none_or(|c| a.related_objects.components.contains(c))
      })
      .filter(|a| {
        keyword.as_deref().is_none_or(|k| {
          [
            Some(a.title.as_str()),
            a.description.as_deref(),
            a.trigger_snapshot.issue_summary.as_deref(),
          ]
          .into_iter()
          .flatten()
          .any(|text| text.to_lowercase().contains(k))
        })
      })
      .filter(|a| query.created_after.is_none_or(|t| a.created_at >= t))
      .filter(|a| query.created_before.is_none_or(|t| a.created_at <= t))
      .cloned()
      .collect();
    hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let total = hits.len() as u64;
    let items = hits
      .into_iter()
      .skip(query.offset() as usize)
      .take(query.limit as usize)
      .collect();
    Ok((items, total))
  }

  async fn record_status(
    &self,
    alert_id: String,
    change: StatusChange,
  ) -> Result<Option<QualityAlert>, MemoryError> {
    let mut inner = self.inner.lock().unwrap();
    Ok(inner.alerts.iter_mut().find(|a| a.alert_id == alert_id).map(|a| {
      a.transition(change);
      a.clone()
    }))
  }

  async fn push_assignment(
    &self,
    alert_id: String,
    assignment: Assignment,
    at: DateTime<Utc>,
  ) -> Result<Option<QualityAlert>, MemoryError> {
    let mut inner = self.inner.lock().unwrap();
    Ok(inner.alerts.iter_mut().find(|a| a.alert_id == alert_id).map(|a| {
      a.push_assignment(assignment, at);
      a.clone()
    }))
  }

  async fn count_by_level_and_category(
    &self,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> Result<Vec<StatisticsBucket>, MemoryError> {
    let inner = self.inner.lock().unwrap();
    let mut buckets: Vec<StatisticsBucket> = Vec::new();
    for a in inner.alerts.iter().filter(|a| a.created_at >= since && a.created_at <= until) {
      let key = StatisticsKey { level: a.level, category: a.category };
      match buckets.iter_mut().find(|b| b.key == key) {
        Some(b) => b.count += 1,
        None => buckets.push(StatisticsBucket { key, count: 1 }),
      }
    }
    buckets.sort_by_key(|b| (b.key.level.to_string(), b.key.category.to_string()));
    Ok(buckets)
  }
}

impl ZeroingSource for MemoryStore {
  type Error = MemoryError;

  async fn recent_zeroing(
    &self,
    since: Option<DateTime<Utc>>,
    limit: usize,
  ) -> Result<Vec<QualityZeroingRecord>, MemoryError> {
    self.zeroing_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_zeroing.load(Ordering::SeqCst) {
      return Err(MemoryError);
    }
    let inner = self.inner.lock().unwrap();
    let mut records: Vec<QualityZeroingRecord> = inner
      .zeroing
      .iter()
      .filter(|z| since.is_none_or(|t| z.updated_at >= t))
      .cloned()
      .collect();
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    records.truncate(limit);
    Ok(records)
  }
}

/// A clock that only moves when told to.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
  pub fn new() -> Self {
    Self(Mutex::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()))
  }

  pub fn advance(&self, by: TimeDelta) {
    *self.0.lock().unwrap() += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> { *self.0.lock().unwrap() }
}
