//! Result delivery.
//!
//! Workers push [`ResultEvent`]s into one shared [`ResultQueue`]; a single
//! [`ResultDispatcher`] task pops them and runs the caller's hooks, so hook
//! code never runs concurrently with itself.
mod event;
pub use event::*;


use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

/// Called with the target of every request handed to a daemon
pub type SubmitHook = Arc<dyn Fn(&ProbeTarget) + Send + Sync>;
/// Called with the daemon output and the target of every completed request
pub type FinishHook = Arc<dyn Fn(&str, &ProbeTarget) + Send + Sync>;
/// Called once per scheduler loop iteration.
///
/// Runs on the scheduler's intake task, not the result dispatcher, so it may
/// run at the same time as the submit and finish hooks.
pub type IdleHook = Arc<dyn Fn() + Send + Sync>;

/// Caller callbacks. Missing hooks are skipped.
///
/// `on_submit` and `on_finish` are delivered one at a time by the
/// [`ResultDispatcher`]; `on_idle` is not serialized with them.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_submit: Option<SubmitHook>,
    pub on_finish: Option<FinishHook>,
    pub on_idle: Option<IdleHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_submit", &self.on_submit.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .field("on_idle", &self.on_idle.is_some())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_submit<F>(
        mut self,
        hook: F,
    ) -> Self
    where
        F: Fn(&ProbeTarget) + Send + Sync + 'static,
    {
        self.on_submit = Some(Arc::new(hook));
        self
    }

    pub fn with_finish<F>(
        mut self,
        hook: F,
    ) -> Self
    where
        F: Fn(&str, &ProbeTarget) + Send + Sync + 'static,
    {
        self.on_finish = Some(Arc::new(hook));
        self
    }

    pub fn with_idle<F>(
        mut self,
        hook: F,
    ) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_idle = Some(Arc::new(hook));
        self
    }

    pub(crate) fn idle(&self) {
        if let Some(hook) = &self.on_idle {
            hook();
        }
    }
}

/// Single consumer of the shared result queue.
pub struct ResultDispatcher {
    results: Arc<ResultQueue>,
    hooks: Arc<ArcSwap<Hooks>>,
    poll_interval: Duration,
}

impl ResultDispatcher {
    pub fn new(
        results: Arc<ResultQueue>,
        hooks: Arc<ArcSwap<Hooks>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            results,
            hooks,
            poll_interval,
        }
    }

    pub fn spawn(
        self,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Delivers events until `shutdown` fires, then flushes whatever is
    /// still queued so nothing is delivered after this returns.
    pub async fn run(
        &self,
        shutdown: CancellationToken,
    ) {
        debug!("[ResultDispatcher] started");
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = self.results.pop_timeout(self.poll_interval) => event,
            };
            if let Some(event) = event {
                self.deliver(event);
            }
        }

        let remaining = self.results.drain();
        if !remaining.is_empty() {
            debug!("[ResultDispatcher] flushing {} queued events", remaining.len());
        }
        for event in remaining {
            self.deliver(event);
        }
        debug!("[ResultDispatcher] stopped");
    }

    fn deliver(
        &self,
        event: ResultEvent,
    ) {
        trace!("[ResultDispatcher] delivering {:?}", event);
        let hooks = self.hooks.load();
        match event {
            ResultEvent::Submitted { target, .. } => {
                if let Some(hook) = &hooks.on_submit {
                    hook(&target);
                }
            }
            ResultEvent::Finished { output, target, .. } => {
                if let Some(hook) = &hooks.on_finish {
                    hook(&output, &target);
                }
            }
        }
    }
}
