use parking_lot::Mutex;

/// Process-wide request id generator.
///
/// Every read-modify-write happens under one lock, so concurrent callers
/// never observe the same post-increment value.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    value: Mutex<u64>,
}

impl SequenceCounter {
    pub fn new(initial: u64) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }

    /// Adds `delta` and returns the new value.
    pub fn increment(
        &self,
        delta: u64,
    ) -> u64 {
        let mut value = self.value.lock();
        *value += delta;
        *value
    }

    /// Shorthand for `increment(1)`
    pub fn next(&self) -> u64 {
        self.increment(1)
    }

    pub fn decrement(
        &self,
        delta: u64,
    ) -> u64 {
        let mut value = self.value.lock();
        *value = value.saturating_sub(delta);
        *value
    }

    pub fn value(&self) -> u64 {
        *self.value.lock()
    }
}
