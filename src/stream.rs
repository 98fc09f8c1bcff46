//! Per-call result delivery.

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

/// Results of one submitted call.
///
/// Yields zero or more items and then completes (the channel disconnects).
/// A call that faulted completes without items; the fault itself goes to the
/// session's fault channel. Each stream has a single consumer and is not
/// replayed.
#[derive(Debug)]
pub struct ResultStream<T> {
    receiver: Receiver<T>,
}

impl<T> ResultStream<T> {
    pub(crate) fn new(receiver: Receiver<T>) -> Self {
        Self { receiver }
    }

    /// Next item, blocking. `None` once the call has completed.
    pub fn recv(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Block until the call completes and return every item.
    pub fn collect_all(self) -> Vec<T> {
        self.receiver.iter().collect()
    }

    /// Like [`ResultStream::collect_all`], giving up after `timeout`.
    pub fn collect_timeout(self, timeout: Duration) -> Result<Vec<T>, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        let mut items = Vec::new();
        loop {
            match self.receiver.recv_deadline(deadline) {
                Ok(item) => items.push(item),
                Err(RecvTimeoutError::Disconnected) => return Ok(items),
                Err(RecvTimeoutError::Timeout) => return Err(RecvTimeoutError::Timeout),
            }
        }
    }
}

impl<T> IntoIterator for ResultStream<T> {
    type Item = T;
    type IntoIter = crossbeam_channel::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.receiver.into_iter()
    }
}

/// One-shot outcome of a save: a single `bool`, then completion.
#[derive(Debug)]
pub struct Completion {
    receiver: Receiver<bool>,
}

impl Completion {
    pub(crate) fn new(receiver: Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Block until the save has run. `None` if it never will.
    pub fn wait(&self) -> Option<bool> {
        self.receiver.recv().ok()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Check for an outcome without blocking.
    pub fn try_wait(&self) -> Result<bool, TryRecvError> {
        self.receiver.try_recv()
    }
}
