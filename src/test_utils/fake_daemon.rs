use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio::time::timeout;

use crate::daemon::parse_completion;
use crate::DaemonError;
use crate::DaemonFactory;
use crate::ProbeDaemon;
use crate::Result;

/// In-memory stand-in for the probing daemon.
///
/// Every submitted line is recorded. With a reply delay configured each
/// request is answered with `"<id> <payload>"` once the delay elapses.
#[derive(Debug)]
pub struct FakeDaemon {
    vp: String,
    reply_after: Option<Duration>,
    submitted: Mutex<Vec<String>>,
    tx: mpsc::UnboundedSender<String>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    fail_writes: AtomicBool,
    stall_writes: AtomicBool,
    stream_closed: AtomicBool,
    terminated: AtomicUsize,
    cleared: AtomicUsize,
}

impl FakeDaemon {
    /// A daemon that never answers on its own.
    pub fn silent(vp: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::build(vp.into(), None))
    }

    /// A daemon that answers every request after `delay`.
    pub fn replying(
        vp: impl Into<String>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self::build(vp.into(), Some(delay)))
    }

    fn build(
        vp: String,
        reply_after: Option<Duration>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            vp,
            reply_after,
            submitted: Mutex::new(Vec::new()),
            tx,
            rx: tokio::sync::Mutex::new(rx),
            fail_writes: AtomicBool::new(false),
            stall_writes: AtomicBool::new(false),
            stream_closed: AtomicBool::new(false),
            terminated: AtomicUsize::new(0),
            cleared: AtomicUsize::new(0),
        }
    }

    pub fn vp(&self) -> &str {
        &self.vp
    }

    /// Queues a raw output line as if the daemon had printed it.
    pub fn inject(
        &self,
        line: impl Into<String>,
    ) {
        let _ = self.tx.send(line.into());
    }

    /// Answers a previously submitted request id.
    pub fn complete(
        &self,
        request_id: u64,
        payload: &str,
    ) {
        self.inject(format!("{} {}", request_id, payload));
    }

    pub fn fail_writes(
        &self,
        fail: bool,
    ) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Records following lines but never finishes writing them, like a
    /// daemon that stopped draining its stdin.
    pub fn stall_writes(
        &self,
        stall: bool,
    ) {
        self.stall_writes.store(stall, Ordering::SeqCst);
    }

    /// Makes every following receive report a closed stream.
    pub fn close_stream(&self) {
        self.stream_closed.store(true, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().clone()
    }

    /// Request ids of every submitted line, in submission order.
    pub fn submitted_ids(&self) -> Vec<u64> {
        self.submitted
            .lock()
            .iter()
            .filter_map(|l| parse_completion(l).map(|c| c.request_id))
            .collect()
    }

    pub fn terminate_calls(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProbeDaemon for FakeDaemon {
    async fn submit(
        &self,
        line: &str,
    ) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) || self.terminated.load(Ordering::SeqCst) > 0 {
            return Err(DaemonError::Write(io::Error::from(io::ErrorKind::BrokenPipe)).into());
        }
        self.submitted.lock().push(line.to_string());
        if self.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        if let (Some(delay), Some(completion)) = (self.reply_after, parse_completion(line)) {
            let tx = self.tx.clone();
            let reply = format!("{} {}", completion.request_id, completion.payload);
            tokio::spawn(async move {
                sleep(delay).await;
                let _ = tx.send(reply);
            });
        }
        Ok(())
    }

    async fn receive_line(
        &self,
        wait: Duration,
    ) -> Result<Option<String>> {
        if self.stream_closed.load(Ordering::SeqCst) {
            return Err(DaemonError::StreamClosed.into());
        }
        let mut rx = self.rx.lock().await;
        match timeout(wait, rx.recv()).await {
            Ok(Some(line)) => Ok(Some(line)),
            Ok(None) => Err(DaemonError::StreamClosed.into()),
            Err(_) => Ok(None),
        }
    }

    async fn terminate(&self) -> Result<()> {
        self.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear_outstanding(&self) -> Result<()> {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one [`FakeDaemon`] per vantage point and keeps them around for
/// inspection.
#[derive(Debug, Default)]
pub struct FakeDaemonFactory {
    reply_after: Option<Duration>,
    daemons: DashMap<String, Arc<FakeDaemon>>,
    spawns: AtomicUsize,
}

impl FakeDaemonFactory {
    pub fn silent() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn replying(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply_after: Some(delay),
            ..Default::default()
        })
    }

    pub fn daemon(
        &self,
        vp: &str,
    ) -> Option<Arc<FakeDaemon>> {
        self.daemons.get(vp).map(|d| d.value().clone())
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

impl DaemonFactory for FakeDaemonFactory {
    fn spawn(
        &self,
        vp: &str,
        _session_id: &str,
        _concurrency: usize,
    ) -> Result<Arc<dyn ProbeDaemon>> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        let daemon = Arc::new(FakeDaemon::build(vp.to_string(), self.reply_after));
        self.daemons.insert(vp.to_string(), daemon.clone());
        Ok(daemon)
    }
}
