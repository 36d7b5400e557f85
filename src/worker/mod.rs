//! Per vantage point workers.
//!
//! A [`VpWorker`] owns one daemon channel, its pending targets, the set of
//! requests in flight and the RTT history used to judge responsiveness.
mod rtt_history;
mod vp_worker;
pub use rtt_history::*;
pub use vp_worker::*;

#[cfg(test)]
mod rtt_history_test;
