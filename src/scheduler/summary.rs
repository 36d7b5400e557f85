use std::fmt;
use std::time::Duration;

use crate::WorkerSummary;

/// Periodic progress snapshot printed while a probe run is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetStatus {
    pub probes_active: usize,
    pub probes_complete: u64,
    pub probes_waiting: usize,
    pub vps_active: usize,
    pub vps_stopped: Vec<String>,
}

impl fmt::Display for FleetStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        writeln!(
            f,
            "Probes active: {} Probes complete: {} Probes waiting: {}",
            self.probes_active, self.probes_complete, self.probes_waiting
        )?;
        writeln!(
            f,
            "Vantage points active: {} Vantage points stopped: {}",
            self.vps_active,
            self.vps_stopped.len()
        )?;
        write!(f, "Vantage points stopped: {:?}", self.vps_stopped)
    }
}

/// Totals reported once a probe run is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetSummary {
    pub probes_submitted: u64,
    pub probes_completed: u64,
    pub avg_rtt: Duration,
    pub targets_remaining: u64,
    pub vps_used: usize,
    pub vps_not_responding: Vec<String>,
    pub workers: Vec<WorkerSummary>,
}

impl fmt::Display for FleetSummary {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        writeln!(f, "Probing Summary:")?;
        writeln!(f, "Total number of probes submitted: {}", self.probes_submitted)?;
        writeln!(f, "Number of probes completed: {}", self.probes_completed)?;
        writeln!(f, "Average probe completion time: {:.3} s", self.avg_rtt.as_secs_f64())?;
        writeln!(f, "Number of probes not completed: {}", self.targets_remaining)?;
        writeln!(f, "Number of vantage points used: {}", self.vps_used)?;
        writeln!(
            f,
            "Number of vantage points not responding: {}",
            self.vps_not_responding.len()
        )?;
        write!(
            f,
            "List of vantage points not responding: {:?}",
            self.vps_not_responding
        )
    }
}
