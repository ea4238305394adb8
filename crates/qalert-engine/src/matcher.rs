//! Criterion matching and presence-based similarity.

use qalert_core::{
  evaluation::RuleEvaluationContext,
  rule::{AlertRule, CriterionValue, MatchOperator, MatchingCriterion},
};

/// Overlap fraction required by a `similarity` criterion without a weight.
pub const DEFAULT_SIMILARITY_WEIGHT: f64 = 0.5;

/// Whether `criterion` holds for `context`. An empty attribute value list
/// never matches.
pub fn matches_criterion(
  criterion: &MatchingCriterion,
  context: &RuleEvaluationContext,
) -> bool {
  let values = context.attribute_values(criterion.attribute);
  if values.is_empty() {
    return false;
  }

  match criterion.operator {
    MatchOperator::Equals => match &criterion.value {
      CriterionValue::One(expected) => values.iter().any(|v| v == expected),
      CriterionValue::Many(_) => false,
    },
    MatchOperator::Includes => {
      let accepted = criterion.value.as_list();
      values.iter().any(|v| accepted.contains(v))
    }
    MatchOperator::Similarity => {
      let wanted = criterion.value.as_list();
      if wanted.is_empty() {
        return false;
      }
      let overlap = values.iter().filter(|v| wanted.contains(*v)).count();
      let required = criterion
        .weight
        .filter(|w| *w != 0.0 && !w.is_nan())
        .unwrap_or(DEFAULT_SIMILARITY_WEIGHT);
      overlap as f64 / wanted.len() as f64 >= required
    }
  }
}

/// Number of the rule's criteria that hold for `context`.
pub fn match_count(rule: &AlertRule, context: &RuleEvaluationContext) -> usize {
  rule
    .matching_criteria
    .iter()
    .filter(|c| matches_criterion(c, context))
    .count()
}

/// The context's own similarity if supplied, otherwise the fraction of the
/// five attributes (manufacturer and the four tag sets) that are present.
pub fn similarity(context: &RuleEvaluationContext) -> f64 {
  if let Some(s) = context.similarity {
    return s;
  }
  let present = [
    context.manufacturer.as_deref().is_some_and(|m| !m.is_empty()),
    !context.process_tags.is_empty(),
    !context.material_tags.is_empty(),
    !context.structure_tags.is_empty(),
    !context.function_tags.is_empty(),
  ];
  present.iter().filter(|p| **p).count() as f64 / present.len() as f64
}
