//! JSON REST API for the quality alert engine.
//!
//! Exposes an axum [`Router`] over an [`AppState`] of already-constructed
//! services. Auth, TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api/quality/alerts", qalert_api::api_router(state))
//! ```

pub mod alerts;
pub mod envelope;
pub mod error;
pub mod rules;
pub mod scan;
pub mod stats;

use std::sync::Arc;

use axum::{
  Router, middleware,
  routing::{get, patch, post},
};
use qalert_core::store::{AlertStore, RuleStore, ZeroingSource};
use qalert_engine::{AlertService, ContextBuilder, RuleEngine, RuleService};

pub use envelope::{Envelope, Pagination};
pub use error::ApiError;

/// Storage backends the router can serve.
pub trait Backend: RuleStore + AlertStore + ZeroingSource + 'static {}

impl<T> Backend for T where T: RuleStore + AlertStore + ZeroingSource + 'static {}

/// Services shared by all handlers.
pub struct AppState<S> {
  pub rules:    Arc<RuleService<S>>,
  pub alerts:   Arc<AlertService<S>>,
  pub engine:   Arc<RuleEngine<S>>,
  pub contexts: Arc<ContextBuilder<S>>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      rules:    Arc::clone(&self.rules),
      alerts:   Arc::clone(&self.alerts),
      engine:   Arc::clone(&self.engine),
      contexts: Arc::clone(&self.contexts),
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: Backend>(state: AppState<S>) -> Router<()> {
  Router::new()
    // Rules
    .route("/rules", get(rules::list::<S>).post(rules::create::<S>))
    .route("/rules/{rule_id}", patch(rules::update::<S>))
    // Statistics and scans
    .route("/stats/summary", get(stats::summary::<S>))
    .route("/scan", post(scan::contexts::<S>))
    .route("/scan/zeroing", get(scan::zeroing::<S>))
    // Alerts
    .route("/", get(alerts::list::<S>))
    .route("/{alert_id}", get(alerts::get_one::<S>))
    .route("/{alert_id}/status", patch(alerts::update_status::<S>))
    .route("/{alert_id}/assignments", post(alerts::add_assignment::<S>))
    .layer(middleware::from_fn(error::attach_error_path))
    .with_state(state)
}
