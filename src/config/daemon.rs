use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Locations of the external topology-on-demand binaries.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DaemonConfig {
    /// Long-lived per-VP client speaking the request/completion line protocol
    #[serde(default = "default_client_path")]
    pub client_path: PathBuf,

    /// One-shot helper used to drop in-flight requests of a session
    #[serde(default = "default_debug_path")]
    pub debug_path: PathBuf,

    #[serde(default = "default_clear_timeout_in_secs")]
    pub clear_timeout_in_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            client_path: default_client_path(),
            debug_path: default_debug_path(),
            clear_timeout_in_secs: default_clear_timeout_in_secs(),
        }
    }
}

impl DaemonConfig {
    pub fn validate(&self) -> Result<()> {
        if self.client_path.as_os_str().is_empty() || self.debug_path.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "daemon.client_path and daemon.debug_path cannot be empty".into(),
            )));
        }
        if self.clear_timeout_in_secs == 0 {
            return Err(Error::Config(ConfigError::Message(
                "daemon.clear_timeout_in_secs must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn clear_timeout(&self) -> Duration {
        Duration::from_secs(self.clear_timeout_in_secs)
    }
}

fn default_client_path() -> PathBuf {
    PathBuf::from("./tod-client")
}
fn default_debug_path() -> PathBuf {
    PathBuf::from("./tod-debug")
}
fn default_clear_timeout_in_secs() -> u64 {
    30
}
