//! Alert lifecycle: creation, lookup, listing, status transitions,
//! assignments and statistics.

use std::sync::Arc;

use chrono::TimeDelta;
use qalert_core::{
  alert::{
    AlertStatus, Assignment, AssignmentStatus, NewAlert, NewAssignment,
    QualityAlert, StatisticsBucket, StatusChange, TimeRange,
  },
  clock::Clock,
  store::{AlertFilter, AlertPage, AlertStore},
};
use uuid::Uuid;

use crate::{Error, Result};

pub fn new_alert_id() -> String { format!("QA-{}", Uuid::new_v4().simple()) }

pub fn new_assignment_id() -> String { format!("AS-{}", Uuid::new_v4().simple()) }

pub struct AlertService<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S: AlertStore> AlertService<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  pub fn clock(&self) -> &dyn Clock { self.clock.as_ref() }

  fn materialise(&self, mut input: NewAlert) -> QualityAlert {
    let alert_id = input
      .alert_id
      .take()
      .filter(|id| !id.trim().is_empty())
      .unwrap_or_else(new_alert_id);
    input.into_alert(alert_id, self.clock.now())
  }

  /// Persist a new alert unconditionally.
  pub async fn create_alert(&self, input: NewAlert) -> Result<QualityAlert> {
    let alert = self.materialise(input);
    self.store.insert_alert(alert).await.map_err(Error::store)
  }

  /// Persist a new alert unless an open alert for the same rule and source
  /// issue was created within `window`. Returns `None` when suppressed.
  pub async fn create_alert_unless_recent(
    &self,
    input: NewAlert,
    window: TimeDelta,
  ) -> Result<Option<QualityAlert>> {
    let alert = self.materialise(input);
    let since = alert.created_at - window;
    self
      .store
      .insert_alert_unless_recent(alert, since)
      .await
      .map_err(Error::store)
  }

  pub async fn list_alerts(&self, filter: AlertFilter) -> Result<AlertPage> {
    let query = filter.into_query();
    let (items, total) = self.store.list_alerts(&query).await.map_err(Error::store)?;
    Ok(AlertPage { items, total, page: query.page, limit: query.limit })
  }

  pub async fn get_alert(&self, alert_id: &str) -> Result<QualityAlert> {
    self
      .store
      .get_alert(alert_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::AlertNotFound(alert_id.to_owned()))
  }

  /// Move an alert to `status`. Any status may follow any other; the
  /// history entry is always appended.
  pub async fn update_status(
    &self,
    alert_id: &str,
    status: AlertStatus,
    actor: String,
    note: Option<String>,
  ) -> Result<QualityAlert> {
    let change = StatusChange { status, actor, note, updated_at: self.clock.now() };
    let alert = self
      .store
      .record_status(alert_id.to_owned(), change)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::AlertNotFound(alert_id.to_owned()))?;
    tracing::info!(alert_id, status = %status, "alert status updated");
    Ok(alert)
  }

  pub async fn add_assignment(
    &self,
    alert_id: &str,
    input: NewAssignment,
  ) -> Result<QualityAlert> {
    if input.description.trim().is_empty() {
      return Err(Error::InvalidInput("assignment description is required".into()));
    }
    if input.responsible.trim().is_empty() {
      return Err(Error::InvalidInput("assignment responsible is required".into()));
    }

    let assignment = Assignment {
      action_id:       new_assignment_id(),
      description:     input.description,
      responsible:     input.responsible,
      deadline:        input.deadline,
      status:          AssignmentStatus::Planned,
      completion_date: None,
    };
    self
      .store
      .push_assignment(alert_id.to_owned(), assignment, self.clock.now())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::AlertNotFound(alert_id.to_owned()))
  }

  /// Alert counts per `(level, category)` over the window ending now.
  pub async fn statistics(&self, range: TimeRange) -> Result<Vec<StatisticsBucket>> {
    let end = self.clock.now();
    self
      .store
      .count_by_level_and_category(range.start_from(end), end)
      .await
      .map_err(Error::store)
  }
}

#[cfg(test)]
mod tests {
  use qalert_core::{
    alert::{AlertLevel, MatchingAttributes, TriggerSnapshot},
    evaluation::RelatedObjects,
    rule::AlertCategory,
  };

  use super::*;
  use crate::testing::{ManualClock, MemoryStore};

  fn service() -> (AlertService<MemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    (AlertService::new(Arc::new(MemoryStore::default()), clock.clone()), clock)
  }

  fn new_alert(issue: &str, level: AlertLevel) -> NewAlert {
    NewAlert {
      alert_id:            None,
      rule_id:             "RULE-1".into(),
      title:               "FPGA package cracks".into(),
      description:         None,
      category:            AlertCategory::Process,
      level,
      risk_score:          72,
      matching_attributes: MatchingAttributes::default(),
      related_objects:     RelatedObjects::default(),
      trigger_snapshot:    TriggerSnapshot {
        source_issue_id: issue.into(),
        issue_summary:   None,
        metrics:         None,
        triggered_at:    ManualClock::new().now(),
      },
      recommendations:     Vec::new(),
      current_status:      None,
      status_flow:         Vec::new(),
    }
  }

  #[tokio::test]
  async fn create_then_get_round_trips() {
    let (svc, _) = service();
    let created = svc.create_alert(new_alert("I-1", AlertLevel::Warning)).await.unwrap();
    assert!(created.alert_id.starts_with("QA-"));
    assert_eq!(created.current_status, AlertStatus::PendingAnalysis);
    assert_eq!(created.status_flow[0].actor, "I-1");
    assert_eq!(created.status_flow[0].note.as_deref(), Some("预警触发"));

    let fetched = svc.get_alert(&created.alert_id).await.unwrap();
    assert_eq!(fetched, created);
  }

  #[tokio::test]
  async fn get_missing_is_not_found() {
    let (svc, _) = service();
    let err = svc.get_alert("QA-missing").await.unwrap_err();
    assert_eq!(err.code(), "ALERT_NOT_FOUND");
  }

  #[tokio::test]
  async fn status_history_is_append_only() {
    let (svc, clock) = service();
    let alert = svc.create_alert(new_alert("I-1", AlertLevel::Info)).await.unwrap();

    let mut previous = alert.status_flow.clone();
    for status in [
      AlertStatus::PendingAction,
      AlertStatus::InProgress,
      AlertStatus::Verifying,
      AlertStatus::PendingAnalysis,
    ] {
      clock.advance(TimeDelta::minutes(10));
      let updated = svc
        .update_status(&alert.alert_id, status, "ops".into(), None)
        .await
        .unwrap();
      assert_eq!(updated.status_flow.len(), previous.len() + 1);
      assert_eq!(updated.status_flow[..previous.len()], previous[..]);
      assert_eq!(updated.current_status, status);
      previous = updated.status_flow;
    }
  }

  #[tokio::test]
  async fn closing_sets_and_reopening_clears_closed_at() {
    let (svc, clock) = service();
    let alert = svc.create_alert(new_alert("I-1", AlertLevel::Critical)).await.unwrap();
    assert!(alert.closed_at.is_none());

    clock.advance(TimeDelta::hours(1));
    let closed = svc
      .update_status(&alert.alert_id, AlertStatus::Closed, "ops".into(), Some("fixed".into()))
      .await
      .unwrap();
    assert_eq!(closed.current_status, AlertStatus::Closed);
    assert_eq!(closed.closed_at, Some(clock.now()));
    assert_eq!(closed.updated_at, clock.now());

    let reopened = svc
      .update_status(&alert.alert_id, AlertStatus::InProgress, "ops".into(), None)
      .await
      .unwrap();
    assert!(reopened.closed_at.is_none());
    assert_eq!(reopened.status_flow.len(), 3);
  }

  #[tokio::test]
  async fn status_on_missing_alert_is_not_found() {
    let (svc, _) = service();
    let err = svc
      .update_status("QA-x", AlertStatus::Closed, "ops".into(), None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::AlertNotFound(_)));
  }

  #[tokio::test]
  async fn assignments_are_planned_with_generated_ids() {
    let (svc, _) = service();
    let alert = svc.create_alert(new_alert("I-1", AlertLevel::Info)).await.unwrap();
    let updated = svc
      .add_assignment(&alert.alert_id, NewAssignment {
        description: "Re-screen lot".into(),
        responsible: "supplier-qe".into(),
        deadline:    None,
      })
      .await
      .unwrap();
    assert_eq!(updated.assignments.len(), 1);
    assert!(updated.assignments[0].action_id.starts_with("AS-"));
    assert_eq!(updated.assignments[0].status, AssignmentStatus::Planned);

    let err = svc
      .add_assignment(&alert.alert_id, NewAssignment {
        description: String::new(),
        responsible: "x".into(),
        deadline:    None,
      })
      .await
      .unwrap_err();
    assert_eq!(err.code(), "INVALID_INPUT");
  }

  #[tokio::test]
  async fn dedup_window_suppresses_open_alerts_only() {
    let (svc, clock) = service();
    let window = TimeDelta::hours(24);
    assert!(
      svc.create_alert_unless_recent(new_alert("I-1", AlertLevel::Info), window)
        .await
        .unwrap()
        .is_some()
    );

    clock.advance(TimeDelta::hours(1));
    assert!(
      svc.create_alert_unless_recent(new_alert("I-1", AlertLevel::Info), window)
        .await
        .unwrap()
        .is_none()
    );

    clock.advance(TimeDelta::hours(24));
    assert!(
      svc.create_alert_unless_recent(new_alert("I-1", AlertLevel::Info), window)
        .await
        .unwrap()
        .is_some()
    );
  }

  #[tokio::test]
  async fn statistics_respect_window() {
    let (svc, clock) = service();
    svc.create_alert(new_alert("I-1", AlertLevel::Critical)).await.unwrap();
    clock.advance(TimeDelta::days(45));
    svc.create_alert(new_alert("I-2", AlertLevel::Critical)).await.unwrap();
    svc.create_alert(new_alert("I-3", AlertLevel::Info)).await.unwrap();

    let recent = svc.statistics(TimeRange::Days30).await.unwrap();
    let total: u64 = recent.iter().map(|b| b.count).sum();
    assert_eq!(total, 2);
    assert_eq!(recent.len(), 2);

    let wider = svc.statistics(TimeRange::Days90).await.unwrap();
    let critical = wider.iter().find(|b| b.key.level == AlertLevel::Critical).unwrap();
    assert_eq!(critical.count, 2);
  }

  #[tokio::test]
  async fn list_pages_newest_first() {
    let (svc, clock) = service();
    for i in 0..3 {
      svc.create_alert(new_alert(&format!("I-{i}"), AlertLevel::Info)).await.unwrap();
      clock.advance(TimeDelta::minutes(1));
    }
    let page = svc
      .list_alerts(AlertFilter { limit: Some(2), ..Default::default() })
      .await
      .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!((page.page, page.limit), (1, 2));
    assert_eq!(page.items[0].trigger_snapshot.source_issue_id, "I-2");
  }
}
