use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::timeout_at;
use tokio::time::Instant;

/// Unbounded async priority queue.
///
/// Entries are ordered by `(priority, sequence)`: lower priority values come
/// out first and equal priorities keep insertion order. The payload never
/// takes part in the comparison.
#[derive(Debug)]
pub struct PriorityQueue<T> {
    inner: Mutex<QueueInner<T>>,
    notify: Notify,
}

#[derive(Debug)]
struct QueueInner<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

#[derive(Debug)]
struct Entry<T> {
    priority: u8,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // BinaryHeap is a max-heap; invert so the smallest key is on top
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        (other.priority, other.seq).cmp(&(self.priority, self.seq))
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            notify: Notify::new(),
        }
    }

    pub fn push(
        &self,
        priority: u8,
        item: T,
    ) {
        {
            let mut inner = self.inner.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.heap.push(Entry { priority, seq, item });
        }
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<(u8, T)> {
        self.inner.lock().heap.pop().map(|e| (e.priority, e.item))
    }

    /// Waits at most `wait` for an entry. `None` means the wait elapsed,
    /// which is a normal polling outcome.
    ///
    /// Cancel safe: an entry is only removed when it is returned.
    pub async fn pop_timeout(
        &self,
        wait: Duration,
    ) -> Option<(u8, T)> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(entry) = self.try_pop() {
                return Some(entry);
            }
            if timeout_at(deadline, self.notify.notified()).await.is_err() {
                return self.try_pop();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }

    /// Drops every queued entry and returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.heap.len();
        inner.heap.clear();
        dropped
    }

    /// Removes every entry in pop order.
    pub fn drain(&self) -> Vec<(u8, T)> {
        let mut inner = self.inner.lock();
        let mut out = Vec::with_capacity(inner.heap.len());
        while let Some(e) = inner.heap.pop() {
            out.push((e.priority, e.item));
        }
        out
    }
}
