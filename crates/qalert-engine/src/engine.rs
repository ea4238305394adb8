//! The rule matching engine: every context against every enabled rule.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use qalert_core::{
  alert::{
    MatchingAttributes, NewAlert, Recommendation, RecommendationPriority,
    TriggerSnapshot,
  },
  clock::Clock as _,
  evaluation::{RuleEvaluationContext, RuleEvaluationResult, SkipReason},
  rule::AlertRule,
  store::{AlertStore, RuleStore},
};

use crate::{
  AlertService, Result, RuleService,
  scoring::{self, Assessment},
};

/// A repeated match for the same rule and source issue inside this window
/// is suppressed while the earlier alert is still open.
pub const DEDUP_WINDOW: TimeDelta = TimeDelta::hours(24);

pub struct RuleEngine<S> {
  rules:  Arc<RuleService<S>>,
  alerts: Arc<AlertService<S>>,
}

impl<S> RuleEngine<S>
where
  S: RuleStore + AlertStore,
{
  pub fn new(rules: Arc<RuleService<S>>, alerts: Arc<AlertService<S>>) -> Self {
    Self { rules, alerts }
  }

  /// Evaluate `contexts` against the enabled rules, one result per pair.
  ///
  /// Failing to load the rules is an error; a failure while handling a
  /// single pair is logged and recorded as [`SkipReason::ExecutionError`].
  pub async fn evaluate_contexts(
    &self,
    contexts: &[RuleEvaluationContext],
  ) -> Result<Vec<RuleEvaluationResult>> {
    if contexts.is_empty() {
      return Ok(Vec::new());
    }

    let rules = self.rules.enabled_rules().await?;
    let mut results = Vec::with_capacity(contexts.len() * rules.len());

    for context in contexts {
      for rule in &rules {
        let context_id = context.source_issue_id.as_str();
        let Some(assessment) = scoring::assess(rule, context) else {
          results.push(RuleEvaluationResult::skipped(
            &rule.rule_id,
            context_id,
            SkipReason::MatchConditionFailed,
          ));
          continue;
        };

        let input = build_alert(rule, context, &assessment, self.alerts.clock().now());
        let result = match self.alerts.create_alert_unless_recent(input, DEDUP_WINDOW).await {
          Ok(Some(alert)) => {
            tracing::debug!(
              rule_id = %rule.rule_id,
              context_id,
              alert_id = %alert.alert_id,
              level = %alert.level,
              risk_score = alert.risk_score,
              "alert raised"
            );
            RuleEvaluationResult::created(&rule.rule_id, context_id)
          }
          Ok(None) => RuleEvaluationResult::skipped(
            &rule.rule_id,
            context_id,
            SkipReason::DuplicateAlert,
          ),
          Err(error) => {
            tracing::error!(
              rule_id = %rule.rule_id,
              context_id,
              %error,
              "rule evaluation failed"
            );
            RuleEvaluationResult::skipped(
              &rule.rule_id,
              context_id,
              SkipReason::ExecutionError,
            )
          }
        };
        results.push(result);
      }
    }

    Ok(results)
  }
}

/// The alert a qualifying pair materialises into.
pub fn build_alert(
  rule: &AlertRule,
  context: &RuleEvaluationContext,
  assessment: &Assessment,
  now: DateTime<Utc>,
) -> NewAlert {
  let category = context.category.unwrap_or(rule.category);

  let mut related = context.related_objects.clone();
  if related.suppliers.is_empty() {
    related.suppliers = context
      .manufacturer
      .iter()
      .filter(|m| !m.is_empty())
      .cloned()
      .collect();
  }

  NewAlert {
    alert_id:            None,
    rule_id:             rule.rule_id.clone(),
    title:               context
      .title
      .clone()
      .filter(|t| !t.is_empty())
      .unwrap_or_else(|| format!("{} - 自动预警", rule.name)),
    description:         context
      .issue_summary
      .clone()
      .filter(|s| !s.is_empty())
      .or_else(|| rule.description.clone()),
    category,
    level:               assessment.level,
    risk_score:          assessment.risk_score,
    matching_attributes: MatchingAttributes {
      manufacturer:   context.manufacturer.clone(),
      process_tags:   context.process_tags.clone(),
      material_tags:  context.material_tags.clone(),
      structure_tags: context.structure_tags.clone(),
      function_tags:  context.function_tags.clone(),
      similarity:     assessment.similarity,
    },
    related_objects:     related,
    trigger_snapshot:    TriggerSnapshot {
      source_issue_id: context.source_issue_id.clone(),
      issue_summary:   context.issue_summary.clone(),
      metrics:         Some(assessment.breakdown),
      triggered_at:    now,
    },
    recommendations:     vec![Recommendation {
      action:           format!("请确认 {category} 类风险并制定处理计划"),
      priority:         RecommendationPriority::from(assessment.level),
      estimated_impact: None,
    }],
    current_status:      None,
    status_flow:         Vec::new(),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::Ordering;

  use qalert_core::{
    alert::{AlertLevel, AlertStatus},
    evaluation::{ContextMetrics, FailureTrend, RelatedObjects},
    rule::{
      AlertCategory, CriterionValue, MatchAttribute, MatchOperator,
      MatchingCriterion, NewAlertRule,
    },
  };

  use super::*;
  use crate::testing::{ManualClock, MemoryStore};

  struct Harness {
    store:  Arc<MemoryStore>,
    clock:  Arc<ManualClock>,
    rules:  Arc<RuleService<MemoryStore>>,
    alerts: Arc<AlertService<MemoryStore>>,
    engine: RuleEngine<MemoryStore>,
  }

  fn harness() -> Harness {
    let store = Arc::new(MemoryStore::default());
    let clock = Arc::new(ManualClock::new());
    let rules = Arc::new(RuleService::new(store.clone(), clock.clone()));
    let alerts = Arc::new(AlertService::new(store.clone(), clock.clone()));
    let engine = RuleEngine::new(rules.clone(), alerts.clone());
    Harness { store, clock, rules, alerts, engine }
  }

  fn r1() -> NewAlertRule {
    let mut input = NewAlertRule::new(
      "R1",
      AlertCategory::Environmental,
      vec![
        MatchingCriterion {
          attribute: MatchAttribute::Manufacturer,
          operator:  MatchOperator::Equals,
          value:     CriterionValue::One("AVX".into()),
          weight:    None,
        },
        MatchingCriterion {
          attribute: MatchAttribute::Material,
          operator:  MatchOperator::Includes,
          value:     CriterionValue::Many(vec!["tantalum".into()]),
          weight:    None,
        },
      ],
    );
    input.rule_id = Some("R1".into());
    input.similarity_threshold = 0.4;
    input.description = Some("Tantalum capacitor watch".into());
    input
  }

  fn avx_context() -> RuleEvaluationContext {
    RuleEvaluationContext {
      manufacturer: Some("AVX".into()),
      material_tags: vec!["tantalum".into()],
      metrics: ContextMetrics {
        affected_batches: Some(3.0),
        defect_rate: Some(7.0),
        failure_trend: Some(FailureTrend::Increasing),
        ..Default::default()
      },
      ..RuleEvaluationContext::new("ISSUE-1")
    }
  }

  #[tokio::test]
  async fn example_scenario_raises_one_critical_alert() {
    let h = harness();
    h.rules.create_rule(r1()).await.unwrap();

    let results = h.engine.evaluate_contexts(&[avx_context()]).await.unwrap();
    assert_eq!(results, vec![RuleEvaluationResult::created("R1", "ISSUE-1")]);

    let alerts = h.store.alerts();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.risk_score, 100);
    assert_eq!(alert.level, AlertLevel::Critical);
    assert_eq!(alert.title, "R1 - 自动预警");
    assert_eq!(alert.description.as_deref(), Some("Tantalum capacitor watch"));
    assert_eq!(alert.category, AlertCategory::Environmental);
    assert_eq!(alert.related_objects.suppliers, ["AVX"]);
    assert_eq!(alert.current_status, AlertStatus::PendingAnalysis);
    assert_eq!(alert.recommendations.len(), 1);
    assert_eq!(alert.recommendations[0].priority, RecommendationPriority::High);
    assert_eq!(alert.recommendations[0].action, "请确认 environmental 类风险并制定处理计划");
    let metrics = alert.trigger_snapshot.metrics.expect("breakdown");
    assert_eq!(metrics.base_score, 50.0);
    assert_eq!(metrics.trend, 90.0);
  }

  #[tokio::test]
  async fn resubmission_within_a_day_is_a_duplicate() {
    let h = harness();
    h.rules.create_rule(r1()).await.unwrap();
    h.engine.evaluate_contexts(&[avx_context()]).await.unwrap();

    h.clock.advance(TimeDelta::hours(1));
    let results = h.engine.evaluate_contexts(&[avx_context()]).await.unwrap();
    assert_eq!(results[0].skipped_reason, Some(SkipReason::DuplicateAlert));
    assert_eq!(h.store.alerts().len(), 1);
  }

  #[tokio::test]
  async fn closed_alert_does_not_suppress() {
    let h = harness();
    h.rules.create_rule(r1()).await.unwrap();
    h.engine.evaluate_contexts(&[avx_context()]).await.unwrap();
    let id = h.store.alerts()[0].alert_id.clone();
    h.alerts
      .update_status(&id, AlertStatus::Closed, "ops".into(), None)
      .await
      .unwrap();

    h.clock.advance(TimeDelta::hours(1));
    let results = h.engine.evaluate_contexts(&[avx_context()]).await.unwrap();
    assert!(results[0].created);
    assert_eq!(h.store.alerts().len(), 2);
  }

  #[tokio::test]
  async fn non_matching_pairs_are_skipped_not_errors() {
    let h = harness();
    h.rules.create_rule(r1()).await.unwrap();
    let ctx = RuleEvaluationContext {
      manufacturer: Some("Kemet".into()),
      ..avx_context()
    };
    let results = h.engine.evaluate_contexts(&[ctx]).await.unwrap();
    assert_eq!(results[0].skipped_reason, Some(SkipReason::MatchConditionFailed));
    assert!(h.store.alerts().is_empty());
  }

  #[tokio::test]
  async fn every_rule_sees_every_context_in_priority_order() {
    let h = harness();
    let mut second = r1();
    second.rule_id = Some("R2".into());
    second.priority = 1;
    h.rules.create_rule(r1()).await.unwrap();
    h.rules.create_rule(second).await.unwrap();

    let mut other = avx_context();
    other.source_issue_id = "ISSUE-2".into();
    let results = h.engine.evaluate_contexts(&[avx_context(), other]).await.unwrap();
    let pairs: Vec<(&str, &str)> = results
      .iter()
      .map(|r| (r.rule_id.as_str(), r.context_id.as_str()))
      .collect();
    assert_eq!(pairs, [
      ("R2", "ISSUE-1"),
      ("R1", "ISSUE-1"),
      ("R2", "ISSUE-2"),
      ("R1", "ISSUE-2"),
    ]);
    assert!(results.iter().all(|r| r.created));
  }

  #[tokio::test]
  async fn disabled_rules_are_not_evaluated() {
    let h = harness();
    let mut disabled = r1();
    disabled.enabled = false;
    h.rules.create_rule(disabled).await.unwrap();
    assert!(h.engine.evaluate_contexts(&[avx_context()]).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn store_failure_is_recorded_per_pair() {
    let h = harness();
    h.rules.create_rule(r1()).await.unwrap();
    h.store.fail_inserts.store(true, Ordering::SeqCst);

    let results = h.engine.evaluate_contexts(&[avx_context()]).await.unwrap();
    assert_eq!(results[0].skipped_reason, Some(SkipReason::ExecutionError));
  }

  #[tokio::test]
  async fn rule_fetch_failure_propagates() {
    let h = harness();
    h.store.fail_rule_list.store(true, Ordering::SeqCst);
    assert!(h.engine.evaluate_contexts(&[avx_context()]).await.is_err());
    // No contexts means no rule fetch at all.
    assert!(h.engine.evaluate_contexts(&[]).await.unwrap().is_empty());
  }

  #[test]
  fn context_overrides_title_category_and_suppliers() {
    let rule = r1().into_rule("R1".into(), ManualClock::new().now());
    let ctx = RuleEvaluationContext {
      title: Some("钽电容器高温失效率异常".into()),
      issue_summary: Some("失效率攀升".into()),
      category: Some(AlertCategory::Process),
      related_objects: RelatedObjects {
        suppliers: vec!["AVX Kyocera".into()],
        ..Default::default()
      },
      ..avx_context()
    };
    let assessment = scoring::assess(&rule, &ctx).unwrap();
    let alert = build_alert(&rule, &ctx, &assessment, ManualClock::new().now());
    assert_eq!(alert.title, "钽电容器高温失效率异常");
    assert_eq!(alert.description.as_deref(), Some("失效率攀升"));
    assert_eq!(alert.category, AlertCategory::Process);
    assert_eq!(alert.related_objects.suppliers, ["AVX Kyocera"]);
    assert_eq!(alert.trigger_snapshot.source_issue_id, "ISSUE-1");
  }

  #[test]
  fn empty_manufacturer_is_not_a_supplier() {
    let rule = r1().into_rule("R1".into(), ManualClock::new().now());
    let ctx = RuleEvaluationContext {
      manufacturer: Some(String::new()),
      similarity: Some(1.0),
      ..avx_context()
    };
    let assessment = Assessment {
      match_count: 1,
      similarity:  1.0,
      risk_score:  70,
      level:       AlertLevel::Warning,
      breakdown:   scoring::risk_score(&rule, &ctx).1,
    };
    let alert = build_alert(&rule, &ctx, &assessment, ManualClock::new().now());
    assert!(alert.related_objects.suppliers.is_empty());
  }
}
