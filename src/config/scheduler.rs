use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Base session id; each worker uses `<session_id>:<vp>`
    #[serde(default = "default_session_id")]
    pub session_id: String,

    #[serde(default = "default_intake_poll_interval_in_ms")]
    pub intake_poll_interval_in_ms: u64,

    /// Period of the status report printed while `probe` waits
    #[serde(default = "default_status_interval_in_ms")]
    pub status_interval_in_ms: u64,

    /// Delay after start before `probe` begins judging progress
    #[serde(default = "default_startup_grace_in_ms")]
    pub startup_grace_in_ms: u64,

    /// Keep blacklisted and unresponsive monitors in the usable list
    #[serde(default)]
    pub use_bad_monitors: bool,

    #[serde(default = "default_monitor_blacklist")]
    pub monitor_blacklist: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id(),
            intake_poll_interval_in_ms: default_intake_poll_interval_in_ms(),
            status_interval_in_ms: default_status_interval_in_ms(),
            startup_grace_in_ms: default_startup_grace_in_ms(),
            use_bad_monitors: false,
            monitor_blacklist: default_monitor_blacklist(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.session_id.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "scheduler.session_id cannot be empty".into(),
            )));
        }
        if self.session_id.contains(char::is_whitespace) {
            return Err(Error::Config(ConfigError::Message(format!(
                "scheduler.session_id {:?} must not contain whitespace",
                self.session_id
            ))));
        }
        if self.intake_poll_interval_in_ms == 0 || self.status_interval_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "scheduler poll intervals cannot be 0".into(),
            )));
        }
        Ok(())
    }

    pub fn intake_poll_interval(&self) -> Duration {
        Duration::from_millis(self.intake_poll_interval_in_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_in_ms)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_in_ms)
    }
}

fn default_session_id() -> String {
    "tod-dispatch".to_string()
}
fn default_intake_poll_interval_in_ms() -> u64 {
    10_000
}
fn default_status_interval_in_ms() -> u64 {
    10_000
}
fn default_startup_grace_in_ms() -> u64 {
    1_000
}
fn default_monitor_blacklist() -> Vec<String> {
    [
        "nap-it", "sea-us", "nce-fr", "bed-us", "muc-de", "ord-us", "sin2-sg", "nrt2-jp", "gig-br",
        "dkr-sn", "mry-us",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
