//! Administrative operations over alert rules.

use std::sync::Arc;

use qalert_core::{
  clock::Clock,
  rule::{AlertRule, NewAlertRule, RulePatch},
  store::RuleStore,
};
use uuid::Uuid;

use crate::{Error, Result};

pub fn new_rule_id() -> String { format!("RULE-{}", Uuid::new_v4().simple()) }

pub struct RuleService<S> {
  store: Arc<S>,
  clock: Arc<dyn Clock>,
}

impl<S: RuleStore> RuleService<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self { Self { store, clock } }

  /// Validate and persist a new rule, generating its id when absent.
  pub async fn create_rule(&self, input: NewAlertRule) -> Result<AlertRule> {
    let rule_id = input
      .rule_id
      .clone()
      .filter(|id| !id.trim().is_empty())
      .unwrap_or_else(new_rule_id);

    let rule = input.into_rule(rule_id, self.clock.now());
    rule.validate()?;

    let rule_id = rule.rule_id.clone();
    let rule = self
      .store
      .insert_rule(rule)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::InvalidInput(format!("alert rule {rule_id} already exists")))?;
    tracing::info!(rule_id = %rule.rule_id, name = %rule.name, "alert rule created");
    Ok(rule)
  }

  /// All rules, `(priority asc, createdAt desc)`.
  pub async fn list_rules(&self) -> Result<Vec<AlertRule>> {
    self.store.list_rules(false).await.map_err(Error::store)
  }

  /// Rules visible to the matching engine, in evaluation order.
  pub async fn enabled_rules(&self) -> Result<Vec<AlertRule>> {
    self.store.list_rules(true).await.map_err(Error::store)
  }

  /// Apply a partial update. The patched rule must still validate.
  pub async fn update_rule(&self, rule_id: &str, patch: RulePatch) -> Result<AlertRule> {
    let mut rule = self
      .store
      .get_rule(rule_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::RuleNotFound(rule_id.to_owned()))?;

    patch.apply(&mut rule, self.clock.now());
    rule.validate()?;

    let rule = self
      .store
      .replace_rule(rule)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::RuleNotFound(rule_id.to_owned()))?;
    tracing::info!(rule_id, enabled = rule.enabled, "alert rule updated");
    Ok(rule)
  }
}
