//! Monitoring engine: probe execution and check scheduling.
//!
//! This module is responsible for:
//! - Executing HTTP/HTTPS, ping and TCP checks
//! - Running the per-monitor check timers
//! - Validating monitor definitions

pub mod checker;
pub mod executor;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use executor::ProbeExecutor;
pub use scheduler::CheckScheduler;
pub use types::{CheckResult, CheckStatus};
