//! Configuration management for the dispatch engine.
//!
//! Settings are layered with increasing priority:
//! 1. Default values (hardcoded)
//! 2. Config file passed to [`Settings::load`] or named by `TOD_CONFIG_PATH`
//! 3. Environment variables (`TOD__WORKER__CONCURRENCY=50`, highest priority)
//!

mod daemon;
mod monitoring;
mod roster;
mod scheduler;
mod worker;
pub use daemon::*;
pub use monitoring::*;
pub use roster::*;
pub use scheduler::*;
pub use worker::*;

#[cfg(test)]
mod config_test;

//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::ENV_CONFIG_PATH;
use crate::constants::ENV_PREFIX;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Intake loop, session naming and monitor filtering
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Defaults applied to each vantage point worker
    #[serde(default)]
    pub worker: WorkerConfig,
    /// External probing daemon binaries
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// Monitor roster source
    #[serde(default)]
    pub roster: RosterConfig,
    /// Metrics and log settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Settings {
    /// Load configuration from defaults, an optional file and the
    /// environment, then validate the merged result.
    ///
    /// # Arguments
    /// * `config_path` - Optional TOML file; falls back to `TOD_CONFIG_PATH`
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = config_path {
            config = config.add_source(File::with_name(path).required(true));
        } else if let Ok(path) = env::var(ENV_CONFIG_PATH) {
            config = config.add_source(File::with_name(&path).required(true));
        }

        config = config.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("scheduler.monitor_blacklist"),
        );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.worker.validate()?;
        self.daemon.validate()?;
        self.monitoring.validate()?;
        Ok(())
    }
}
