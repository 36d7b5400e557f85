use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::warn;

use super::FleetStatus;
use super::FleetSummary;
use super::Scheduler;

// Fleet statistics, aggregated over every worker created so far.
impl Scheduler {
    pub fn probes_submitted(&self) -> u64 {
        self.workers.iter().map(|w| w.total()).sum()
    }

    pub fn probes_waiting(&self) -> usize {
        self.workers.iter().map(|w| w.waiting()).sum()
    }

    pub fn probes_active(&self) -> usize {
        self.workers.iter().map(|w| w.outstanding()).sum()
    }

    pub fn probes_complete(&self) -> u64 {
        self.workers.iter().map(|w| w.completed()).sum()
    }

    pub fn targets_remaining(&self) -> u64 {
        self.workers.iter().map(|w| w.incomplete()).sum()
    }

    /// Targets accepted but not yet handed to a worker
    pub fn targets_queued(&self) -> usize {
        self.intake.len()
    }

    pub fn vps_used(&self) -> usize {
        self.vps_used.load(Ordering::Relaxed)
    }

    pub fn vps_alive(&self) -> usize {
        self.workers.iter().filter(|w| w.is_alive()).count()
    }

    pub fn vps_active(&self) -> usize {
        self.workers.iter().filter(|w| w.is_active()).count()
    }

    pub fn vps_responding(&self) -> usize {
        self.vps_responding_list().len()
    }

    pub fn vps_responding_list(&self) -> Vec<String> {
        self.worker_list()
            .into_iter()
            .filter(|w| w.is_responding())
            .map(|w| w.vp().to_string())
            .collect()
    }

    pub fn vps_not_responding(&self) -> usize {
        self.vps_not_responding_list().len()
    }

    pub fn vps_not_responding_list(&self) -> Vec<String> {
        self.worker_list()
            .into_iter()
            .filter(|w| !w.is_responding())
            .map(|w| w.vp().to_string())
            .collect()
    }

    pub fn vps_stopped(&self) -> usize {
        self.vps_stopped_list().len()
    }

    pub fn vps_stopped_list(&self) -> Vec<String> {
        self.worker_list()
            .into_iter()
            .filter(|w| !w.is_alive())
            .map(|w| w.vp().to_string())
            .collect()
    }

    /// Mean RTT over the newest `window` samples of every responding
    /// vantage point.
    ///
    /// A window larger than the configured history yields zero for every
    /// vantage point instead.
    pub fn vps_rtt(
        &self,
        window: usize,
    ) -> BTreeMap<String, Duration> {
        let window_max = self.worker_config.lock().rtt_window_max;
        let workers = self.worker_list();
        if window > window_max {
            warn!(
                "[Scheduler] RTT window {} is larger than rtt_window_max {}",
                window, window_max
            );
            return workers.iter().map(|w| (w.vp().to_string(), Duration::ZERO)).collect();
        }
        workers
            .iter()
            .filter(|w| w.is_responding())
            .map(|w| (w.vp().to_string(), w.rtt(window)))
            .collect()
    }

    /// Mean of [`Scheduler::vps_rtt`]; zero when no vantage point qualifies.
    pub fn avg_rtt(
        &self,
        window: usize,
    ) -> Duration {
        let rtts = self.vps_rtt(window);
        if rtts.is_empty() {
            return Duration::ZERO;
        }
        rtts.values().sum::<Duration>() / rtts.len() as u32
    }

    /// Work is left (queued, waiting or in flight) and some vantage point
    /// has been active within its timeout.
    pub fn is_active(&self) -> bool {
        let has_work = !self.intake.is_empty() || self.probes_waiting() > 0 || self.probes_active() > 0;
        has_work && self.vps_active() > 0
    }

    pub fn is_responding(&self) -> bool {
        self.vps_responding() > 0
    }

    pub fn status(&self) -> FleetStatus {
        FleetStatus {
            probes_active: self.probes_active(),
            probes_complete: self.probes_complete(),
            probes_waiting: self.probes_waiting(),
            vps_active: self.vps_active(),
            vps_stopped: self.vps_stopped_list(),
        }
    }

    pub fn summary(&self) -> FleetSummary {
        let window_max = self.worker_config.lock().rtt_window_max;
        FleetSummary {
            probes_submitted: self.probes_submitted(),
            probes_completed: self.probes_complete(),
            avg_rtt: self.avg_rtt(window_max),
            targets_remaining: self.targets_remaining(),
            vps_used: self.vps_used(),
            vps_not_responding: self.vps_not_responding_list(),
            workers: self.worker_list().iter().map(|w| w.summary()).collect(),
        }
    }
}
