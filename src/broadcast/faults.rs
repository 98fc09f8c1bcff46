//! Broadcast channel of faults captured on the worker.

use super::channel::{Broadcaster, Subscription};
use crate::types::FaultRecord;

/// Receives faults published after subscription.
pub type FaultReceiver = Subscription<FaultRecord>;

/// Fans captured faults out to every observer. No replay.
pub struct FaultChannel {
    broadcaster: Broadcaster<FaultRecord>,
}

impl Default for FaultChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultChannel {
    pub fn new() -> Self {
        Self {
            broadcaster: Broadcaster::new(),
        }
    }

    pub fn publish(&self, fault: FaultRecord) {
        tracing::warn!(
            item = fault.id.0,
            operation = %fault.operation,
            error = %fault.error,
            "work item faulted"
        );
        self.broadcaster.broadcast(fault);
    }

    pub fn subscribe(&self) -> FaultReceiver {
        self.broadcaster.subscribe(None)
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    pub fn close(&self) {
        self.broadcaster.close();
    }
}
