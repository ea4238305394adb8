//! Server wiring for the quality alert engine.
//!
//! Holds the configuration model, builds the service graph over a store and
//! assembles the top-level HTTP app. The binary in `main.rs` drives it.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use axum::{Json, Router, routing::get};
use chrono::{SecondsFormat, Utc};
use qalert_api::{AppState, Backend};
use qalert_core::clock::Clock;
use qalert_engine::{
  AlertService, ContextBuilder, MonitoringScheduler, RuleEngine, RuleService,
  SchedulerOptions,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

/// Mount point of the alert API.
pub const API_PREFIX: &str = "/api/quality/alerts";

// ─── Configuration ───────────────────────────────────────────────────────────

/// Server configuration, loaded from `config.toml` and `QALERT_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub scheduler:  SchedulerConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_owned(),
      port:       8080,
      store_path: PathBuf::from("qalert.sqlite3"),
      scheduler:  SchedulerConfig::default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
  pub enabled:         bool,
  pub interval_secs:   u64,
  pub zeroing_limit:   usize,
  pub include_samples: bool,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    let defaults = SchedulerOptions::default();
    Self {
      enabled:         true,
      interval_secs:   defaults.interval.as_secs(),
      zeroing_limit:   defaults.zeroing_limit,
      include_samples: defaults.include_samples,
    }
  }
}

impl SchedulerConfig {
  pub fn options(&self) -> SchedulerOptions {
    SchedulerOptions {
      interval:        Duration::from_secs(self.interval_secs.max(1)),
      zeroing_limit:   self.zeroing_limit,
      include_samples: self.include_samples,
    }
  }
}

/// Layer the optional TOML file at `path` under `QALERT_*` environment
/// variables. Nested keys use `__`, e.g. `QALERT_SCHEDULER__ENABLED`.
pub fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("QALERT")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let mut cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  cfg.store_path = expand_tilde(&cfg.store_path);
  Ok(cfg)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

/// Every long-lived service, sharing one store and one clock.
pub struct Services<S> {
  pub state:     AppState<S>,
  pub scheduler: Arc<MonitoringScheduler<S>>,
}

pub fn wire<S: Backend>(
  store: Arc<S>,
  clock: Arc<dyn Clock>,
  options: SchedulerOptions,
) -> Services<S> {
  let rules = Arc::new(RuleService::new(store.clone(), clock.clone()));
  let alerts = Arc::new(AlertService::new(store.clone(), clock));
  let engine = Arc::new(RuleEngine::new(rules.clone(), alerts.clone()));
  let contexts = Arc::new(ContextBuilder::new(store));
  let scheduler = Arc::new(MonitoringScheduler::new(
    engine.clone(),
    contexts.clone(),
    options,
  ));

  Services {
    state: AppState { rules, alerts, engine, contexts },
    scheduler,
  }
}

// ─── HTTP app ────────────────────────────────────────────────────────────────

/// The alert API under [`API_PREFIX`] plus `GET /health`, with request
/// tracing.
pub fn app<S: Backend>(state: AppState<S>) -> Router {
  Router::new()
    .route("/health", get(health))
    .nest(API_PREFIX, qalert_api::api_router(state))
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
  Json(json!({
    "status": "ok",
    "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
  }))
}
