use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::RttHistory;
use crate::daemon::format_request;
use crate::daemon::parse_completion;
use crate::daemon::ProbeDaemon;
use crate::metrics::DAEMON_WRITE_FAILURES;
use crate::metrics::PROBES_COMPLETED;
use crate::metrics::PROBES_SUBMITTED;
use crate::metrics::PROBE_RTT_SECONDS;
use crate::metrics::UNMATCHED_COMPLETIONS;
use crate::utils::PriorityQueue;
use crate::utils::SequenceCounter;
use crate::Error;
use crate::ProbeTarget;
use crate::ResultEvent;
use crate::ResultQueue;
use crate::WorkerConfig;

/// A request written (or attempted) to the daemon and not yet completed.
#[derive(Debug, Clone)]
pub struct OutstandingRequest {
    pub request_id: u64,
    pub target: ProbeTarget,
    pub submitted_at: Instant,
    pub completed_at: Option<Instant>,
}

/// Mutable bookkeeping shared by the dispatch and receive tasks.
#[derive(Debug)]
struct Tracking {
    outstanding: HashMap<u64, OutstandingRequest>,
    rtt: RttHistory,
    last_activity: Instant,
    responsive: bool,
}

struct WorkerShared {
    vp: String,
    config: WorkerConfig,
    pending: PriorityQueue<String>,
    tracking: Mutex<Tracking>,
    total: AtomicU64,
    completed: AtomicU64,
    slot_freed: Notify,
    sequence: Arc<SequenceCounter>,
    results: Arc<ResultQueue>,
    daemon: Arc<dyn ProbeDaemon>,
}

/// Drives one vantage point: a dispatch task that keeps up to
/// `concurrency` requests in flight and a receive task that correlates
/// daemon completions.
pub struct VpWorker {
    shared: Arc<WorkerShared>,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for VpWorker {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("VpWorker")
            .field("vp", &self.shared.vp)
            .field("waiting", &self.waiting())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

impl VpWorker {
    pub fn new(
        vp: impl Into<String>,
        config: WorkerConfig,
        daemon: Arc<dyn ProbeDaemon>,
        sequence: Arc<SequenceCounter>,
        results: Arc<ResultQueue>,
    ) -> Self {
        let rtt = RttHistory::new(config.rtt_window_max);
        Self {
            shared: Arc::new(WorkerShared {
                vp: vp.into(),
                config,
                pending: PriorityQueue::new(),
                tracking: Mutex::new(Tracking {
                    outstanding: HashMap::new(),
                    rtt,
                    last_activity: Instant::now(),
                    responsive: true,
                }),
                total: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                slot_freed: Notify::new(),
                sequence,
                results,
                daemon,
            }),
            shutdown: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Spawns the worker tasks. Must be called from within a tokio runtime;
    /// later calls are no-ops.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }
        let shared = self.shared.clone();
        let shutdown = self.shutdown.clone();
        *handle = Some(tokio::spawn(async move {
            let receiver = tokio::spawn(shared.clone().receive_loop(shutdown.clone()));
            shared.dispatch_loop(&shutdown).await;
            shared.shutdown(receiver).await;
        }));
        debug!("[VpWorker:{}] started", self.shared.vp);
    }

    /// Asks both loops to finish; cleanup runs on the worker task.
    pub fn exit(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        debug!("[VpWorker:{}] asked to exit", self.shared.vp);
        self.shutdown.cancel();
    }

    /// Waits for the worker task (and its cleanup) to finish.
    pub async fn join(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("[VpWorker:{}] worker task failed: {:?}", self.shared.vp, e);
            }
        }
    }

    /// `exit` followed by `join`.
    pub async fn stop(&self) {
        self.exit();
        self.join().await;
    }

    pub fn add_target(
        &self,
        destination: impl Into<String>,
        priority: u8,
    ) {
        self.shared.pending.push(priority, destination.into());
        self.shared.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops the daemon's in-flight state for this session and forgets the
    /// local outstanding requests.
    pub async fn clear_outstanding(&self) {
        self.shared.clear_outstanding().await;
    }

    pub fn vp(&self) -> &str {
        &self.shared.vp
    }

    pub fn concurrency(&self) -> usize {
        self.shared.config.concurrency
    }

    pub fn timeout(&self) -> Duration {
        self.shared.config.timeout()
    }

    pub fn waiting(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn outstanding(&self) -> usize {
        self.shared.tracking.lock().outstanding.len()
    }

    pub fn outstanding_requests(&self) -> Vec<OutstandingRequest> {
        let mut requests: Vec<_> = self.shared.tracking.lock().outstanding.values().cloned().collect();
        requests.sort_by_key(|r| r.request_id);
        requests
    }

    /// Targets handed to this worker so far
    pub fn total(&self) -> u64 {
        self.shared.total.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.shared.completed.load(Ordering::Relaxed)
    }

    pub fn incomplete(&self) -> u64 {
        self.total().saturating_sub(self.completed())
    }

    pub fn last_activity(&self) -> Instant {
        self.shared.tracking.lock().last_activity
    }

    pub fn rtt_samples(&self) -> usize {
        self.shared.tracking.lock().rtt.len()
    }

    /// Whether the worker task is still running.
    pub fn is_alive(&self) -> bool {
        self.handle.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Mean RTT over the newest `window` samples. Zero when the window is
    /// larger than the configured history.
    pub fn rtt(
        &self,
        window: usize,
    ) -> Duration {
        if window > self.shared.config.rtt_window_max {
            warn!(
                "[VpWorker:{}] RTT window {} is larger than rtt_window_max {}",
                self.shared.vp, window, self.shared.config.rtt_window_max
            );
            return Duration::ZERO;
        }
        self.shared.tracking.lock().rtt.mean(window)
    }

    /// Some activity within `timeout`.
    pub fn is_active(&self) -> bool {
        self.shared.tracking.lock().last_activity.elapsed() < self.shared.config.timeout()
    }

    /// Responsiveness judgement, updated on every call.
    ///
    /// An idle worker with nothing outstanding keeps its previous verdict.
    pub fn is_responding(&self) -> bool {
        let timeout = self.shared.config.timeout();
        let mut tracking = self.shared.tracking.lock();
        let active = tracking.last_activity.elapsed() < timeout;

        if active && tracking.rtt.mean(1) < timeout {
            if self.shared.config.reanimate && !tracking.responsive {
                info!("[VpWorker:{}] vantage point is responding again", self.shared.vp);
                tracking.responsive = true;
            }
        } else if !tracking.outstanding.is_empty() {
            if tracking.responsive {
                warn!("[VpWorker:{}] vantage point is not responding", self.shared.vp);
            }
            tracking.responsive = false;
        }
        tracking.responsive
    }

    pub fn summary(&self) -> WorkerSummary {
        WorkerSummary {
            vp: self.shared.vp.clone(),
            submitted: self.total(),
            completed: self.completed(),
            incomplete: self.incomplete(),
            waiting: self.waiting(),
            outstanding: self.outstanding(),
        }
    }
}

impl Drop for VpWorker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl WorkerShared {
    async fn dispatch_loop(
        &self,
        shutdown: &CancellationToken,
    ) {
        let cap = self.config.concurrency;
        while !shutdown.is_cancelled() {
            let (active, idle_for) = {
                let tracking = self.tracking.lock();
                (tracking.outstanding.len(), tracking.last_activity.elapsed())
            };
            debug!(
                "[VpWorker:{}] probes active: {} targets remaining: {} since activity: {:?}",
                self.vp,
                active,
                self.pending.len(),
                idle_for
            );

            while self.tracking.lock().outstanding.len() < cap {
                let popped = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return,
                    popped = self.pending.pop_timeout(self.config.queue_poll_interval()) => popped,
                };
                let Some((_priority, destination)) = popped else {
                    break;
                };
                if !self.dispatch(destination, shutdown).await {
                    return;
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.slot_freed.notified() => {}
                _ = sleep(self.config.dispatch_interval()) => {}
            }
        }
    }

    /// Submits one target. Returns `false` when shutdown interrupted the
    /// write; the request is left outstanding either way.
    async fn dispatch(
        &self,
        destination: String,
        shutdown: &CancellationToken,
    ) -> bool {
        let request_id = self.sequence.next();
        let line = format_request(request_id, &self.vp, &destination);
        let target = ProbeTarget::new(self.vp.clone(), destination);

        // registered before the write so an instant completion always matches
        self.tracking.lock().outstanding.insert(
            request_id,
            OutstandingRequest {
                request_id,
                target: target.clone(),
                submitted_at: Instant::now(),
                completed_at: None,
            },
        );
        self.results.push(ResultEvent::Submitted { request_id, target });
        PROBES_SUBMITTED.with_label_values(&[&self.vp]).inc();

        let written = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                warn!("[VpWorker:{}] shutdown while submitting request {}", self.vp, request_id);
                return false;
            }
            written = self.daemon.submit(&line) => written,
        };
        match written {
            Ok(()) => {
                self.tracking.lock().last_activity = Instant::now();
                trace!("[VpWorker:{}] submitted: {}", self.vp, line);
            }
            Err(e) => {
                // the request stays outstanding; there is no resubmission
                error!("[VpWorker:{}] failed to submit request {}: {}", self.vp, request_id, e);
                DAEMON_WRITE_FAILURES.with_label_values(&[&self.vp]).inc();
            }
        }
        true
    }

    async fn receive_loop(
        self: Arc<Self>,
        shutdown: CancellationToken,
    ) {
        while !shutdown.is_cancelled() {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = self.daemon.receive_line(self.config.receive_timeout()) => received,
            };

            match received {
                Ok(Some(line)) => self.handle_line(&line),
                Ok(None) => {}
                Err(Error::Daemon(e)) if e.is_retriable() => {
                    warn!("[VpWorker:{}] receive interrupted, retrying: {}", self.vp, e);
                }
                Err(e) => {
                    error!("[VpWorker:{}] receive loop stopped: {}", self.vp, e);
                    break;
                }
            }
        }
        debug!("[VpWorker:{}] receive loop finished", self.vp);
    }

    fn handle_line(
        &self,
        line: &str,
    ) {
        let Some(completion) = parse_completion(line) else {
            if !line.trim().is_empty() {
                warn!("[VpWorker:{}] ignoring unparseable daemon output: {:?}", self.vp, line);
            }
            return;
        };

        let now = Instant::now();
        let finished = {
            let mut tracking = self.tracking.lock();
            match tracking.outstanding.remove(&completion.request_id) {
                Some(mut request) => {
                    request.completed_at = Some(now);
                    let rtt = now.duration_since(request.submitted_at);
                    tracking.rtt.push(rtt);
                    tracking.last_activity = now;
                    Some((request, rtt))
                }
                None => None,
            }
        };

        let Some((request, rtt)) = finished else {
            warn!(
                "[VpWorker:{}] received unexpected request ID: {}",
                self.vp, completion.request_id
            );
            UNMATCHED_COMPLETIONS.with_label_values(&[&self.vp]).inc();
            return;
        };

        debug!("[VpWorker:{}] probe #{} took {:?}", self.vp, request.request_id, rtt);
        self.completed.fetch_add(1, Ordering::Relaxed);
        PROBES_COMPLETED.with_label_values(&[&self.vp]).inc();
        PROBE_RTT_SECONDS.with_label_values(&[&self.vp]).observe(rtt.as_secs_f64());

        self.results.push(ResultEvent::Finished {
            request_id: request.request_id,
            output: completion.payload.to_string(),
            target: request.target,
        });
        self.slot_freed.notify_one();
    }

    async fn clear_outstanding(&self) {
        if let Err(e) = self.daemon.clear_outstanding().await {
            warn!("[VpWorker:{}] clear outstanding failed: {}", self.vp, e);
        }
        let abandoned = {
            let mut tracking = self.tracking.lock();
            let n = tracking.outstanding.len();
            tracking.outstanding.clear();
            n
        };
        if abandoned > 0 {
            info!("[VpWorker:{}] abandoned {} outstanding requests", self.vp, abandoned);
        }
        self.slot_freed.notify_one();
    }

    async fn shutdown(
        &self,
        receiver: JoinHandle<()>,
    ) {
        debug!("[VpWorker:{}] stopping", self.vp);
        let dropped = self.pending.clear();
        if dropped > 0 {
            info!("[VpWorker:{}] dropped {} waiting targets", self.vp, dropped);
        }

        // the receive loop watches the same token
        if let Err(e) = receiver.await {
            error!("[VpWorker:{}] receive task failed: {:?}", self.vp, e);
        }
        if let Err(e) = self.daemon.terminate().await {
            warn!("[VpWorker:{}] terminate failed: {}", self.vp, e);
        }
        self.clear_outstanding().await;
        debug!("[VpWorker:{}] stopped", self.vp);
    }
}

/// Per vantage point counters for status reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub vp: String,
    pub submitted: u64,
    pub completed: u64,
    pub incomplete: u64,
    pub waiting: usize,
    pub outstanding: usize,
}

impl fmt::Display for WorkerSummary {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        writeln!(f, "Vantage point name: {}", self.vp)?;
        writeln!(f, "Probes submitted: {}", self.submitted)?;
        writeln!(f, "Probes completed: {}", self.completed)?;
        write!(f, "Probes incomplete: {}", self.incomplete)
    }
}
