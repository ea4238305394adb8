//! Quality alert engine: rule and alert services, the matching and risk
//! scoring pipeline, the quality-zeroing context builder and the periodic
//! monitoring scheduler.
//!
//! Everything is generic over the storage traits in [`qalert_core::store`]
//! and wired together by explicit construction; there are no globals.

pub mod alerts;
pub mod context;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod rules;
pub mod samples;
pub mod scheduler;
pub mod scoring;

pub use alerts::AlertService;
pub use context::{BuildOptions, ContextBuilder};
pub use engine::RuleEngine;
pub use error::{Error, Result};
pub use rules::RuleService;
pub use scheduler::{MonitoringScheduler, ScanSummary, SchedulerOptions};

#[cfg(test)]
mod testing;
