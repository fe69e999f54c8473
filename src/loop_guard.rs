//! Response loop prevention
//!
//! A topic is "active" while a generated response is being published on it.
//! Inbound messages on an active topic are not fed back into rule dispatch,
//! and a second response targeting the same topic at the same time is
//! dropped.

use std::collections::HashSet;

use parking_lot::{Mutex, MutexGuard};

/// Set of topics currently carrying a generated response
#[derive(Debug, Default)]
pub struct LoopGuard {
    active: Mutex<HashSet<String>>,
}

impl LoopGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn topics(&self) -> MutexGuard<'_, HashSet<String>> {
        self.active.lock()
    }

    /// Mark `topic` active; `false` means it already was (loop detected)
    pub fn mark_active(&self, topic: &str) -> bool {
        self.topics().insert(topic.to_string())
    }

    pub fn unmark(&self, topic: &str) {
        self.topics().remove(topic);
    }

    pub fn is_active(&self, topic: &str) -> bool {
        self.topics().contains(topic)
    }

    /// Mark `topic` active for the lifetime of the returned handle
    pub fn enter(&self, topic: &str) -> Option<ActiveTopic<'_>> {
        self.mark_active(topic).then(|| ActiveTopic {
            guard: self,
            topic: topic.to_string(),
        })
    }
}

/// Unmarks its topic when dropped
#[derive(Debug)]
pub struct ActiveTopic<'a> {
    guard: &'a LoopGuard,
    topic: String,
}

impl Drop for ActiveTopic<'_> {
    fn drop(&mut self) {
        self.guard.unmark(&self.topic);
    }
}
