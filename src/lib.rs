//! Probe dispatch engine for topology-on-demand vantage points.
//!
//! A [`Scheduler`] takes `"<vp> <destination>"` targets and hands each one to
//! a [`VpWorker`] dedicated to that vantage point. Every worker keeps a
//! bounded number of requests in flight on its own daemon process, matches
//! completions back to requests and tracks whether the vantage point still
//! responds. Submissions and completions are funneled through one
//! [`ResultDispatcher`] that runs the caller's hooks.
mod config;
pub(crate) mod constants;
pub mod daemon;
mod dispatcher;
mod errors;
pub mod metrics;
mod monitor;
mod scheduler;
pub mod utils;
mod worker;

pub use config::*;
pub use constants::DEFAULT_PROBE_PRIORITY;
pub use constants::DEFAULT_TEAM;
pub use daemon::DaemonFactory;
pub use daemon::ProbeDaemon;
pub use daemon::TodClient;
pub use daemon::TodClientFactory;
pub use dispatcher::*;
pub use errors::*;
pub use monitor::*;
pub use scheduler::*;
pub use worker::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
