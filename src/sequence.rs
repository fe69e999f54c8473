//! Named counters backing the `sequence(name[, start])` template function

use std::collections::HashMap;

use parking_lot::Mutex;

/// Thread-safe map from sequence name to the next value to hand out
#[derive(Debug, Default)]
pub struct SequenceStore {
    counters: Mutex<HashMap<String, i64>>,
}

impl SequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next value of `name`, creating it at `start` on first use
    pub fn next(&self, name: &str, start: i64) -> i64 {
        let mut counters = self.counters.lock();
        let next = counters.entry(name.to_string()).or_insert(start);
        let value = *next;
        *next = value.saturating_add(1);
        value
    }

    /// The value the next call to [`SequenceStore::next`] would return
    #[cfg(test)]
    pub(crate) fn peek(&self, name: &str) -> Option<i64> {
        self.counters.lock().get(name).copied()
    }

    /// Forget a sequence so its next use starts over
    pub fn reset(&self, name: &str) {
        self.counters.lock().remove(name);
    }

    pub fn reset_all(&self) {
        self.counters.lock().clear();
    }
}
