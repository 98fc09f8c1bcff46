//! Fan-out channel shared by the status and fault broadcasters.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiving end of one observer's subscription.
#[derive(Debug)]
pub struct Subscription<E> {
    pub id: SubscriptionId,
    receiver: Receiver<E>,
}

impl<E> Subscription<E> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<E, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<E, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<E, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain every event already buffered.
    pub fn drain(&self) -> Vec<E> {
        self.receiver.try_iter().collect()
    }

    /// Blocking iterator that ends when the broadcaster is closed.
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, E> {
        self.receiver.iter()
    }
}

/// Fans events out to every live subscriber.
///
/// Each subscriber has an unbounded backlog, so a subscriber that reads
/// slowly still sees every event. Subscribers whose receiver was dropped are
/// removed on the next broadcast.
pub struct Broadcaster<E> {
    subscribers: RwLock<HashMap<SubscriptionId, Sender<E>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl<E: Clone> Default for Broadcaster<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone> Broadcaster<E> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Add a subscriber. `initial`, if given, is delivered before any
    /// broadcast event.
    ///
    /// After [`Broadcaster::close`] the returned subscription only yields
    /// `initial` and then reports disconnection.
    pub fn subscribe(&self, initial: Option<E>) -> Subscription<E> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = unbounded();

        if let Some(event) = initial {
            // Receiver is alive, so this cannot fail
            let _ = sender.send(event);
        }

        let mut subs = self.subscribers.write();
        if !self.closed.load(Ordering::SeqCst) {
            subs.insert(id, sender);
        }

        Subscription { id, receiver }
    }

    /// Remove a subscriber. Its receiver reports disconnection once drained.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().remove(&id);
    }

    /// Send `event` to every subscriber. Never blocks.
    pub fn broadcast(&self, event: E) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscribers.read();
            for (id, sender) in subs.iter() {
                if sender.send(event.clone()).is_err() {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            tracing::debug!(count = to_remove.len(), "pruning disconnected subscribers");
            let mut subs = self.subscribers.write();
            for id in to_remove {
                subs.remove(&id);
            }
        }
    }

    /// Release every subscriber and refuse new ones.
    pub fn close(&self) {
        let mut subs = self.subscribers.write();
        self.closed.store(true, Ordering::SeqCst);
        subs.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
