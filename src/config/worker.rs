use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Per vantage point worker parameters.
///
/// Values are copied into each worker when it is created, so changing them
/// afterwards only affects workers spawned later.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Maximum requests a single worker may have outstanding
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Staleness and RTT threshold used for responsiveness (seconds)
    #[serde(default = "default_timeout_in_secs")]
    pub timeout_in_secs: u64,

    /// Let an unresponsive worker become responsive again on fresh activity
    #[serde(default = "default_reanimate")]
    pub reanimate: bool,

    /// Capacity of the RTT history
    #[serde(default = "default_rtt_window_max")]
    pub rtt_window_max: usize,

    /// Bounded wait for a pending target before re-checking cancellation
    #[serde(default = "default_queue_poll_interval_in_ms")]
    pub queue_poll_interval_in_ms: u64,

    /// Pause between two drain passes of the dispatch loop
    #[serde(default = "default_dispatch_interval_in_ms")]
    pub dispatch_interval_in_ms: u64,

    /// Bounded wait for one daemon output line
    #[serde(default = "default_receive_timeout_in_ms")]
    pub receive_timeout_in_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_in_secs: default_timeout_in_secs(),
            reanimate: default_reanimate(),
            rtt_window_max: default_rtt_window_max(),
            queue_poll_interval_in_ms: default_queue_poll_interval_in_ms(),
            dispatch_interval_in_ms: default_dispatch_interval_in_ms(),
            receive_timeout_in_ms: default_receive_timeout_in_ms(),
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config(ConfigError::Message(
                "worker.concurrency must be at least 1".into(),
            )));
        }
        if self.timeout_in_secs == 0 {
            return Err(Error::Config(ConfigError::Message(
                "worker.timeout_in_secs must be greater than 0".into(),
            )));
        }
        if self.rtt_window_max == 0 {
            return Err(Error::Config(ConfigError::Message(
                "worker.rtt_window_max must be greater than 0".into(),
            )));
        }
        if self.queue_poll_interval_in_ms == 0
            || self.dispatch_interval_in_ms == 0
            || self.receive_timeout_in_ms == 0
        {
            return Err(Error::Config(ConfigError::Message(
                "worker poll intervals cannot be 0".into(),
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_in_secs)
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_in_ms)
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_in_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_in_ms)
    }
}

fn default_concurrency() -> usize {
    25
}
fn default_timeout_in_secs() -> u64 {
    600
}
fn default_reanimate() -> bool {
    true
}
// one week of per-minute samples
fn default_rtt_window_max() -> usize {
    10_080
}
fn default_queue_poll_interval_in_ms() -> u64 {
    10_000
}
fn default_dispatch_interval_in_ms() -> u64 {
    10_000
}
fn default_receive_timeout_in_ms() -> u64 {
    10_000
}
