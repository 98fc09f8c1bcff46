//! Busy/idle status broadcaster.

use super::channel::{Broadcaster, Subscription};
use parking_lot::Mutex;

/// Receives busy-state transitions: the current value first, then changes.
pub type StatusReceiver = Subscription<bool>;

/// Busy flag of a worker, broadcast distinct-until-changed.
///
/// Starts idle (`false`). Publishing is serialized by an internal lock, so
/// several sources may report transitions concurrently without reordering
/// the value against its broadcast.
pub struct BusyState {
    current: Mutex<bool>,
    broadcaster: Broadcaster<bool>,
}

impl Default for BusyState {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyState {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(false),
            broadcaster: Broadcaster::new(),
        }
    }

    /// Record a new state. Returns false if it equals the current one and
    /// nothing was broadcast.
    pub fn publish(&self, busy: bool) -> bool {
        let mut current = self.current.lock();
        if *current == busy {
            return false;
        }
        *current = busy;
        self.broadcaster.broadcast(busy);
        true
    }

    /// Subscribe; the current value is delivered immediately.
    pub fn subscribe(&self) -> StatusReceiver {
        // Hold the lock so no transition slips between replay and registration
        let current = self.current.lock();
        self.broadcaster.subscribe(Some(*current))
    }

    pub fn is_busy(&self) -> bool {
        *self.current.lock()
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    /// Release all observers.
    pub fn close(&self) {
        let _current = self.current.lock();
        self.broadcaster.close();
    }
}
