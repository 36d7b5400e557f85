//! Line protocol channel to the external topology-on-demand daemon.
//!
//! Each vantage point worker owns one [`ProbeDaemon`]. Requests go out as
//! `"<request_id> <vp> trace <destination>"`; completions come back as lines
//! whose first token is the request id and whose remainder is an opaque
//! trace payload.
mod tod_client;
pub use tod_client::*;


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::constants::TRACE_VERB;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProbeDaemon: Send + Sync + 'static {
    /// Writes one request line. A broken pipe comes back as
    /// `DaemonError::Write`; callers treat it as non-fatal.
    async fn submit(
        &self,
        line: &str,
    ) -> Result<()>;

    /// Waits up to `timeout` for one output line.
    ///
    /// `Ok(None)` means nothing arrived in time.
    async fn receive_line(
        &self,
        timeout: Duration,
    ) -> Result<Option<String>>;

    /// Asks the daemon process to exit. Calling it twice is harmless.
    async fn terminate(&self) -> Result<()>;

    /// Tells the daemon to drop every in-flight request of this session.
    async fn clear_outstanding(&self) -> Result<()>;
}

/// Creates the daemon channel for a newly discovered vantage point.
#[cfg_attr(test, automock)]
pub trait DaemonFactory: Send + Sync + 'static {
    fn spawn(
        &self,
        vp: &str,
        session_id: &str,
        concurrency: usize,
    ) -> Result<Arc<dyn ProbeDaemon>>;
}

/// Builds an outbound request line (without the trailing newline).
pub fn format_request(
    request_id: u64,
    vp: &str,
    destination: &str,
) -> String {
    format!("{} {} {} {}", request_id, vp, TRACE_VERB, destination)
}

/// A completion line split into its request id and opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion<'a> {
    pub request_id: u64,
    pub payload: &'a str,
}

/// Splits a daemon output line.
///
/// Returns `None` for blank lines and lines whose first token is not an
/// integer request id.
pub fn parse_completion(line: &str) -> Option<Completion<'_>> {
    let trimmed = line.trim();
    let (id, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((id, rest)) => (id, rest.trim_start()),
        None => (trimmed, ""),
    };
    let request_id = id.parse::<u64>().ok()?;
    Some(Completion {
        request_id,
        payload: rest,
    })
}
