//! Per-message FIFO queue of `file` events waiting to be announced, so that
//! inline attachment uploads always precede the response text referencing
//! them (spec 4.4/4.5, invariant 4 in spec 8).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::sse::ServerEvent;

#[derive(Default)]
pub struct PendingFileQueue {
    by_message: Mutex<HashMap<String, VecDeque<ServerEvent>>>,
}

impl PendingFileQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, message_id: &str, event: ServerEvent) {
        let mut guard = self.by_message.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.entry(message_id.to_string()).or_default().push_back(event);
    }

    /// Pop every queued event for `message_id`, in FIFO order, leaving the
    /// queue empty for that id.
    pub fn drain(&self, message_id: &str) -> Vec<ServerEvent> {
        let mut guard = self.by_message.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .get_mut(message_id)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Discard any remaining entries for `message_id` once the request ends.
    pub fn clear(&self, message_id: &str) {
        let mut guard = self.by_message.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.remove(message_id);
    }
}
