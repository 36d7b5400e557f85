use std::fmt;
use std::str::FromStr;

use crate::constants::FINISHED_EVENT_PRIORITY;
use crate::constants::SUBMITTED_EVENT_PRIORITY;
use crate::utils::PriorityQueue;
use crate::SchedulerError;

/// A measurement request from one vantage point to one destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeTarget {
    pub vp: String,
    pub destination: String,
}

impl ProbeTarget {
    pub fn new(
        vp: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            vp: vp.into(),
            destination: destination.into(),
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} {}", self.vp, self.destination)
    }
}

/// Parses `"<vp> <destination>"`.
impl FromStr for ProbeTarget {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(vp), Some(destination), None) => Ok(Self::new(vp, destination)),
            _ => Err(SchedulerError::InvalidTarget(s.to_string())),
        }
    }
}

/// Progress notifications funneled to the caller hooks.
///
/// Both variants carry the request id so hook code can pair a completion
/// with its submission even when delivery reorders them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultEvent {
    Submitted {
        request_id: u64,
        target: ProbeTarget,
    },
    Finished {
        request_id: u64,
        /// Daemon output after the request id, passed through untouched
        output: String,
        target: ProbeTarget,
    },
}

impl ResultEvent {
    /// Delivery class; every `Submitted` queued ahead of a `Finished` is
    /// delivered first.
    pub fn priority(&self) -> u8 {
        match self {
            ResultEvent::Submitted { .. } => SUBMITTED_EVENT_PRIORITY,
            ResultEvent::Finished { .. } => FINISHED_EVENT_PRIORITY,
        }
    }

    pub fn request_id(&self) -> u64 {
        match self {
            ResultEvent::Submitted { request_id, .. } | ResultEvent::Finished { request_id, .. } => *request_id,
        }
    }

    pub fn target(&self) -> &ProbeTarget {
        match self {
            ResultEvent::Submitted { target, .. } | ResultEvent::Finished { target, .. } => target,
        }
    }
}

/// Shared queue between every worker and the result dispatcher.
#[derive(Debug, Default)]
pub struct ResultQueue {
    queue: PriorityQueue<ResultEvent>,
}

impl ResultQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &self,
        event: ResultEvent,
    ) {
        self.queue.push(event.priority(), event);
    }

    pub async fn pop_timeout(
        &self,
        wait: std::time::Duration,
    ) -> Option<ResultEvent> {
        self.queue.pop_timeout(wait).await.map(|(_, e)| e)
    }

    pub fn try_pop(&self) -> Option<ResultEvent> {
        self.queue.try_pop().map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Removes every queued event in delivery order.
    pub fn drain(&self) -> Vec<ResultEvent> {
        self.queue.drain().into_iter().map(|(_, e)| e).collect()
    }
}
