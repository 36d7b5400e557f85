use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    /// Serve Prometheus metrics on `/metrics`
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,

    /// Default tracing filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}
impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
            prometheus_port: default_prometheus_port(),
            log_level: default_log_level(),
        }
    }
}
impl MonitoringConfig {
    /// Validates monitoring configuration
    /// # Errors
    /// Returns `Error::Config` when metrics are enabled on port 0 or on a
    /// privileged port.
    pub fn validate(&self) -> Result<()> {
        if self.metrics_enabled {
            if self.prometheus_port == 0 {
                return Err(Error::Config(ConfigError::Message(
                    "prometheus_port cannot be 0 when metrics are enabled".into(),
                )));
            }

            // Check privileged ports (requires root)
            if self.prometheus_port < 1024 {
                return Err(Error::Config(ConfigError::Message(format!(
                    "prometheus_port {} is a privileged port (requires root)",
                    self.prometheus_port
                ))));
            }
        } else {
            #[cfg(debug_assertions)]
            if self.prometheus_port != default_prometheus_port() {
                tracing::warn!(
                    "prometheus_port configured to {} but metrics are disabled",
                    self.prometheus_port
                );
            }
        }

        if self.log_level.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message("log_level cannot be empty".into())));
        }

        Ok(())
    }
}

fn default_metrics_enabled() -> bool {
    false
}
fn default_prometheus_port() -> u16 {
    9100
}
fn default_log_level() -> String {
    "info".to_string()
}
