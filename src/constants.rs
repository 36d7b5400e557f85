// -
// Result event classes. Lower values are delivered first.

pub(crate) const SUBMITTED_EVENT_PRIORITY: u8 = 2;
pub(crate) const FINISHED_EVENT_PRIORITY: u8 = 3;

/// Priority given to targets when the caller does not choose one
pub const DEFAULT_PROBE_PRIORITY: u8 = 3;

/// Team key used for roster entries read from the flat `name:ip` format
pub const DEFAULT_TEAM: &str = "1";

/// Daemon verb used for every outbound request line
pub(crate) const TRACE_VERB: &str = "trace";

/// Prefix for environment overrides, e.g. `TOD__WORKER__CONCURRENCY`
pub(crate) const ENV_PREFIX: &str = "TOD";
pub(crate) const ENV_CONFIG_PATH: &str = "TOD_CONFIG_PATH";
