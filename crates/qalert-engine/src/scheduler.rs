//! Periodic monitoring: build contexts, merge, dedupe and evaluate.
//!
//! The loop is a spawned tokio task driven by [`tokio::time::interval`] and
//! stopped through a oneshot channel. The first tick fires immediately, so a
//! pass runs as soon as the scheduler starts. A failed pass is logged and
//! the next tick proceeds as usual.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex, PoisonError},
  time::Duration,
};

use qalert_core::{
  evaluation::RuleEvaluationContext,
  store::{AlertStore, RuleStore, ZeroingSource},
};
use serde::Serialize;
use tokio::{sync::oneshot, task::JoinHandle, time::MissedTickBehavior};

use crate::{
  BuildOptions, ContextBuilder, Result, RuleEngine, samples::sample_contexts,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
  pub interval:        Duration,
  /// Cap on quality-zeroing records pulled per pass.
  pub zeroing_limit:   usize,
  /// Merge the built-in sample contexts into every pass.
  pub include_samples: bool,
}

impl Default for SchedulerOptions {
  fn default() -> Self {
    Self {
      interval:        Duration::from_secs(5 * 60),
      zeroing_limit:   50,
      include_samples: true,
    }
  }
}

/// Outcome counts of one monitoring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
  pub contexts: usize,
  pub created:  usize,
  pub skipped:  usize,
}

struct Running {
  stop:   oneshot::Sender<()>,
  handle: JoinHandle<()>,
}

pub struct MonitoringScheduler<S> {
  engine:  Arc<RuleEngine<S>>,
  builder: Arc<ContextBuilder<S>>,
  options: SchedulerOptions,
  running: Mutex<Option<Running>>,
}

impl<S> MonitoringScheduler<S>
where
  S: RuleStore + AlertStore + ZeroingSource + 'static,
{
  pub fn new(
    engine: Arc<RuleEngine<S>>,
    builder: Arc<ContextBuilder<S>>,
    options: SchedulerOptions,
  ) -> Self {
    Self { engine, builder, options, running: Mutex::new(None) }
  }

  /// Spawn the periodic loop. Returns `false` if it was already running.
  pub fn start(&self) -> bool {
    let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
    if running.is_some() {
      return false;
    }

    let (stop, mut stopped) = oneshot::channel();
    let engine = Arc::clone(&self.engine);
    let builder = Arc::clone(&self.builder);
    let options = self.options;

    let handle = tokio::spawn(async move {
      let mut ticker = tokio::time::interval(options.interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        tokio::select! {
          _ = &mut stopped => break,
          _ = ticker.tick() => {
            if let Err(error) = run_pass(&engine, &builder, &options).await {
              tracing::error!(%error, "quality alert monitoring pass failed");
            }
          }
        }
      }
    });

    tracing::info!(
      interval_secs = options.interval.as_secs(),
      zeroing_limit = options.zeroing_limit,
      "quality alert monitoring started"
    );
    *running = Some(Running { stop, handle });
    true
  }

  /// Stop the loop and wait for an in-flight pass to finish. A no-op when
  /// the scheduler is not running.
  pub async fn stop(&self) {
    let running = self
      .running
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    let Some(Running { stop, handle }) = running else {
      return;
    };

    let _ = stop.send(());
    if let Err(error) = handle.await {
      tracing::warn!(%error, "monitoring task ended abnormally");
    }
    tracing::info!("quality alert monitoring stopped");
  }

  pub fn is_running(&self) -> bool {
    self
      .running
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .is_some()
  }

  /// Run a single pass now, outside the timer.
  pub async fn run_once(&self) -> Result<ScanSummary> {
    run_pass(&self.engine, &self.builder, &self.options).await
  }
}

async fn run_pass<S>(
  engine: &RuleEngine<S>,
  builder: &ContextBuilder<S>,
  options: &SchedulerOptions,
) -> Result<ScanSummary>
where
  S: RuleStore + AlertStore + ZeroingSource,
{
  let zeroing = builder
    .build_from_quality_zeroing(BuildOptions {
      since: None,
      limit: Some(options.zeroing_limit),
    })
    .await?;

  let mut merged = if options.include_samples { sample_contexts() } else { Vec::new() };
  merged.extend(zeroing);

  if merged.is_empty() {
    tracing::info!("no contexts available, skipping monitoring pass");
    return Ok(ScanSummary::default());
  }

  let contexts = dedupe_contexts(merged);
  tracing::info!(contexts = contexts.len(), "evaluating monitoring contexts");

  let results = engine.evaluate_contexts(&contexts).await?;
  let created = results.iter().filter(|r| r.created).count();
  let summary = ScanSummary {
    contexts: contexts.len(),
    created,
    skipped: results.len() - created,
  };
  tracing::info!(created = summary.created, skipped = summary.skipped, "monitoring pass complete");
  Ok(summary)
}

/// Keep the first context for each `sourceIssueId`, preserving order.
pub fn dedupe_contexts(contexts: Vec<RuleEvaluationContext>) -> Vec<RuleEvaluationContext> {
  let mut seen = HashSet::new();
  contexts
    .into_iter()
    .filter(|c| seen.insert(c.source_issue_id.clone()))
    .collect()
}
