use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RosterFormat {
    /// Record format with `.monitor:`, `ip_address:` and `team:` keys
    #[default]
    Yaml,
    /// One `name:ip` pair per line
    Text,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RosterConfig {
    /// Roster file; an empty roster is used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub format: RosterFormat,
}
