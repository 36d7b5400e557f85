use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rand::Rng;

use super::MonitorRoster;

/// Immutable view of the monitors currently worth probing from.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UsableMonitors {
    names: Vec<String>,
    by_ip: HashMap<String, String>,
}

impl UsableMonitors {
    /// Roster minus `excluded`, in name order.
    pub fn build(
        roster: &MonitorRoster,
        excluded: &HashSet<String>,
    ) -> Self {
        let mut names = Vec::with_capacity(roster.len());
        let mut by_ip = HashMap::with_capacity(roster.len());
        for (name, ip) in roster.monitors() {
            if excluded.contains(name) {
                continue;
            }
            names.push(name.clone());
            by_ip.insert(ip.clone(), name.clone());
        }
        Self { names, by_ip }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name_by_ip(
        &self,
        ip: &str,
    ) -> Option<&str> {
        self.by_ip.get(ip).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Publishes [`UsableMonitors`] snapshots and picks monitors from the
/// latest one.
///
/// Refreshes swap in a whole new snapshot; readers holding the previous one
/// keep a consistent list.
#[derive(Debug, Default)]
pub struct MonitorSelector {
    current: ArcSwap<UsableMonitors>,
    cursor: AtomicUsize,
}

impl MonitorSelector {
    pub fn new(initial: UsableMonitors) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn publish(
        &self,
        snapshot: UsableMonitors,
    ) {
        self.current.store(Arc::new(snapshot));
    }

    pub fn snapshot(&self) -> Arc<UsableMonitors> {
        self.current.load_full()
    }

    /// Round-robin over the current snapshot, continuing from the previous
    /// call.
    pub fn next(&self) -> Option<String> {
        let snapshot = self.current.load();
        if snapshot.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % snapshot.len();
        Some(snapshot.names[idx].clone())
    }

    pub fn random(&self) -> Option<String> {
        let snapshot = self.current.load();
        if snapshot.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..snapshot.len());
        Some(snapshot.names[idx].clone())
    }
}
