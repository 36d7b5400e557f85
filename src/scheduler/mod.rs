//! Fleet-level coordination.
//!
//! The [`Scheduler`] accepts `"<vp> <destination>"` targets, lazily creates
//! one [`VpWorker`] per vantage point, keeps the usable-monitor snapshot
//! fresh and owns the [`ResultDispatcher`] that feeds the caller's hooks.
mod stats;
mod summary;
pub use summary::*;


use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::metrics::UNRESPONSIVE_VPS;
use crate::utils::PriorityQueue;
use crate::utils::SequenceCounter;
use crate::DaemonFactory;
use crate::Error;
use crate::Hooks;
use crate::MonitorRoster;
use crate::MonitorSelector;
use crate::ProbeTarget;
use crate::Result;
use crate::ResultDispatcher;
use crate::ResultQueue;
use crate::SchedulerConfig;
use crate::SchedulerError;
use crate::Settings;
use crate::TodClientFactory;
use crate::UsableMonitors;
use crate::VpWorker;
use crate::WorkerConfig;

pub struct Scheduler {
    config: SchedulerConfig,
    /// Template for workers created from now on
    worker_config: Mutex<WorkerConfig>,

    workers: DashMap<String, Arc<VpWorker>>,
    intake: PriorityQueue<ProbeTarget>,
    results: Arc<ResultQueue>,
    sequence: Arc<SequenceCounter>,
    factory: Arc<dyn DaemonFactory>,

    roster: MonitorRoster,
    selector: MonitorSelector,
    hooks: Arc<ArcSwap<Hooks>>,

    vps_used: AtomicUsize,
    started: AtomicBool,
    monitor_flag: AtomicBool,
    shutdown: CancellationToken,
    /// Cancelled when the background task has completely finished
    finished: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("session_id", &self.config.session_id)
            .field("workers", &self.workers.len())
            .field("intake", &self.intake.len())
            .finish()
    }
}

impl Scheduler {
    pub fn new(
        settings: &Settings,
        roster: MonitorRoster,
        factory: Arc<dyn DaemonFactory>,
    ) -> Self {
        let config = settings.scheduler.clone();
        let excluded = if config.use_bad_monitors {
            HashSet::new()
        } else {
            config.monitor_blacklist.iter().cloned().collect()
        };
        let selector = MonitorSelector::new(UsableMonitors::build(&roster, &excluded));
        debug!(
            "[Scheduler] {} monitors known, {} usable",
            roster.len(),
            selector.snapshot().len()
        );

        Self {
            config,
            worker_config: Mutex::new(settings.worker.clone()),
            workers: DashMap::new(),
            intake: PriorityQueue::new(),
            results: Arc::new(ResultQueue::new()),
            sequence: Arc::new(SequenceCounter::new(0)),
            factory,
            roster,
            selector,
            hooks: Arc::new(ArcSwap::from_pointee(Hooks::default())),
            vps_used: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            monitor_flag: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            finished: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Builds a scheduler that talks to the real daemon binaries and reads
    /// the roster named in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let roster = match &settings.roster.path {
            Some(path) => MonitorRoster::load(path, settings.roster.format)?,
            None => MonitorRoster::new(),
        };
        let factory = Arc::new(TodClientFactory::new(settings.daemon.clone()));
        Ok(Self::new(settings, roster, factory))
    }

    /// Spawns the intake loop and the result dispatcher.
    ///
    /// A scheduler runs once; starting it again is an error.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyStarted.into());
        }

        let dispatcher = ResultDispatcher::new(
            self.results.clone(),
            self.hooks.clone(),
            self.config.intake_poll_interval(),
        );
        let this = self.clone();
        let finished = self.finished.clone();
        *self.handle.lock() = Some(tokio::spawn(async move {
            let _finished = finished.drop_guard();
            // cancelled only after every worker has stopped producing events
            let dispatcher_shutdown = CancellationToken::new();
            let dispatcher = dispatcher.spawn(dispatcher_shutdown.clone());

            this.run().await;
            this.stop_workers().await;

            info!("[Scheduler] waiting for callbacks to finish");
            dispatcher_shutdown.cancel();
            if let Err(e) = dispatcher.await {
                error!("[Scheduler] result dispatcher failed: {:?}", e);
            }
            info!("[Scheduler] callbacks finished");
        }));
        info!("[Scheduler] started session {}", self.config.session_id);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.finished.is_cancelled()
    }

    /// Requests shutdown without waiting for it.
    pub fn exit(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!("[Scheduler] asked to exit");
        self.monitor_stop();
        self.shutdown.cancel();
    }

    /// Waits until the intake loop, every worker and the dispatcher are done.
    ///
    /// Concurrent callers all wait for the same completion; only the one
    /// that owns the task handle observes a task failure.
    pub async fn join(&self) -> Result<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotStarted.into());
        }
        let handle = self.handle.lock().take();
        match handle {
            Some(handle) => handle.await.map_err(Error::from),
            None => {
                self.finished.cancelled().await;
                Ok(())
            }
        }
    }

    /// `exit` followed by `join`.
    pub async fn stop(&self) -> Result<()> {
        self.exit();
        self.join().await
    }

    /// A token that is cancelled once shutdown has been requested.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Queues `"<vp> <destination>"` targets at `priority`.
    ///
    /// Every line is validated first; on error nothing is queued.
    pub fn add_probe<S: AsRef<str>>(
        &self,
        targets: &[S],
        priority: u8,
    ) -> Result<usize> {
        let parsed = targets
            .iter()
            .map(|t| t.as_ref().parse::<ProbeTarget>())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let count = parsed.len();
        for target in parsed {
            self.intake.push(priority, target);
        }
        debug!("[Scheduler] queued {} targets at priority {}", count, priority);
        Ok(count)
    }

    pub fn add_target(
        &self,
        target: ProbeTarget,
        priority: u8,
    ) {
        self.intake.push(priority, target);
    }

    /// Replaces the caller hooks; takes effect for the next delivered event.
    pub fn set_hooks(
        &self,
        hooks: Hooks,
    ) {
        self.hooks.store(Arc::new(hooks));
    }

    /// Worker template used for vantage points discovered from now on.
    pub fn worker_config(&self) -> WorkerConfig {
        self.worker_config.lock().clone()
    }

    /// Runs a complete probe session: queue `targets`, start if needed,
    /// report status until the work is done or no vantage point responds,
    /// then shut everything down.
    ///
    /// `traces_in_flight` is a fleet-wide budget split evenly across the
    /// distinct vantage points of `targets` (at least one each).
    pub async fn probe<S: AsRef<str>>(
        self: &Arc<Self>,
        hooks: Hooks,
        targets: &[S],
        traces_in_flight: Option<usize>,
        timeout: Option<Duration>,
    ) -> Result<FleetSummary> {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::Stopped.into());
        }
        if targets.is_empty() {
            return Err(SchedulerError::EmptyTargets.into());
        }
        let parsed = targets
            .iter()
            .map(|t| t.as_ref().parse::<ProbeTarget>())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // keep a previously installed idle hook unless a new one is given
        let Hooks {
            on_submit,
            on_finish,
            on_idle,
        } = hooks;
        let on_idle = on_idle.or_else(|| self.hooks.load().on_idle.clone());
        self.set_hooks(Hooks {
            on_submit,
            on_finish,
            on_idle,
        });

        let concurrency = {
            let mut worker_config = self.worker_config.lock();
            if let Some(budget) = traces_in_flight {
                let vps: HashSet<&str> = parsed.iter().map(|t| t.vp.as_str()).collect();
                worker_config.concurrency = (budget / vps.len()).max(1);
            }
            if let Some(timeout) = timeout {
                worker_config.timeout_in_secs = timeout.as_secs().max(1);
            }
            worker_config.concurrency
        };

        for target in parsed {
            self.add_target(target, crate::constants::DEFAULT_PROBE_PRIORITY);
        }
        info!(
            "[Scheduler] will maintain {} traces in flight per vantage point",
            concurrency
        );

        if !self.started.load(Ordering::SeqCst) {
            self.start()?;
        }

        // give the intake loop a chance to hand out work before judging progress
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = sleep(self.config.startup_grace()) => {}
        }
        self.monitor_until_done().await;
        self.stop().await?;

        let summary = self.summary();
        info!("[Scheduler] {}", summary);
        Ok(summary)
    }

    /// Reports status every `status_interval` while there is work and at
    /// least one vantage point responds.
    pub async fn monitor_until_done(&self) {
        self.monitor_flag.store(true, Ordering::SeqCst);
        while self.monitor_flag.load(Ordering::SeqCst) && self.is_active() && self.is_responding() {
            info!("[Scheduler] {}", self.status());
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(self.config.status_interval()) => {}
            }
        }
        debug!("[Scheduler] monitoring finished");
    }

    pub fn monitor_stop(&self) {
        self.monitor_flag.store(false, Ordering::SeqCst);
    }

    /// Drops daemon state for `vp`, or for every non-responding vantage
    /// point (every vantage point with `clear_responding`) when `vp` is
    /// `None`.
    pub async fn clear_outstanding(
        &self,
        vp: Option<&str>,
        clear_responding: bool,
    ) {
        if let Some(vp) = vp {
            match self.worker(vp) {
                Some(worker) => worker.clear_outstanding().await,
                None => warn!("[Scheduler] no worker for vantage point {}", vp),
            }
            return;
        }
        for worker in self.worker_list() {
            if clear_responding || !worker.is_responding() {
                worker.clear_outstanding().await;
            }
        }
    }

    pub fn worker(
        &self,
        vp: &str,
    ) -> Option<Arc<VpWorker>> {
        self.workers.get(vp).map(|w| w.value().clone())
    }

    /// Snapshot of the current workers in name order.
    pub fn worker_list(&self) -> Vec<Arc<VpWorker>> {
        let mut workers: Vec<_> = self.workers.iter().map(|w| w.value().clone()).collect();
        workers.sort_by(|a, b| a.vp().cmp(b.vp()));
        workers
    }

    pub fn roster(&self) -> &MonitorRoster {
        &self.roster
    }

    /// Current usable monitors
    pub fn usable_monitors(&self) -> Arc<UsableMonitors> {
        self.selector.snapshot()
    }

    pub fn num_monitors(&self) -> usize {
        self.selector.snapshot().len()
    }

    pub fn monitors(&self) -> Vec<String> {
        self.selector.snapshot().names().to_vec()
    }

    pub fn exists_monitor(
        &self,
        name: &str,
    ) -> bool {
        self.selector.snapshot().names().iter().any(|n| n == name)
    }

    pub fn monitor_by_ip(
        &self,
        ip: &str,
    ) -> Option<String> {
        self.selector.snapshot().name_by_ip(ip).map(str::to_string)
    }

    /// Deterministic wrapping round-robin over the usable monitors.
    pub fn next_monitor(&self) -> Option<String> {
        self.selector.next()
    }

    pub fn rand_monitor(&self) -> Option<String> {
        self.selector.random()
    }

    pub fn get(
        &self,
        rand: bool,
    ) -> Option<String> {
        if rand {
            self.rand_monitor()
        } else {
            self.next_monitor()
        }
    }

    async fn run(&self) {
        let poll = self.config.intake_poll_interval();
        while !self.shutdown.is_cancelled() {
            let popped = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                popped = self.intake.pop_timeout(poll) => popped,
            };

            if let Some((priority, target)) = popped {
                match self.get_or_spawn_worker(&target.vp) {
                    Ok(worker) => worker.add_target(target.destination, priority),
                    Err(e) => error!("[Scheduler] dropping target {}: {}", target, e),
                }
            }

            self.refresh_usable_monitors();
            self.hooks.load().idle();
        }
        debug!("[Scheduler] intake loop finished");
    }

    /// The only place a worker is ever added to the fleet.
    fn get_or_spawn_worker(
        &self,
        vp: &str,
    ) -> Result<Arc<VpWorker>> {
        match self.workers.entry(vp.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let config = self.worker_config.lock().clone();
                let session_id = format!("{}:{}", self.config.session_id, vp);
                let daemon = self.factory.spawn(vp, &session_id, config.concurrency)?;

                let worker = Arc::new(VpWorker::new(
                    vp,
                    config,
                    daemon,
                    self.sequence.clone(),
                    self.results.clone(),
                ));
                worker.start();
                self.vps_used.fetch_add(1, Ordering::Relaxed);
                info!("[Scheduler] started worker for vantage point {}", vp);
                Ok(entry.insert(worker).clone())
            }
        }
    }

    /// Rebuilds the usable monitors from the full roster and publishes them.
    fn refresh_usable_monitors(&self) {
        let not_responding = self.vps_not_responding_list();
        UNRESPONSIVE_VPS.set(not_responding.len() as i64);

        let mut excluded: HashSet<String> = HashSet::new();
        if !self.config.use_bad_monitors {
            excluded.extend(self.config.monitor_blacklist.iter().cloned());
            excluded.extend(not_responding);
        }
        self.selector.publish(UsableMonitors::build(&self.roster, &excluded));
    }

    async fn stop_workers(&self) {
        info!("[Scheduler] cleaning up");
        let workers = self.worker_list();
        for worker in &workers {
            worker.exit();
        }
        info!("[Scheduler] waiting for {} workers to exit", workers.len());
        join_all(workers.iter().map(|w| w.join())).await;
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
