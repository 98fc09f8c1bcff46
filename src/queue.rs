//! Single-consumer work queue and the worker that drains it.
//!
//! Any number of producers submit work items; one dedicated thread owns the
//! shared context and runs the items strictly in submission order. Every
//! item is bracketed by busy/idle transitions, and any error or panic it
//! raises is captured as a [`FaultRecord`] instead of reaching the worker.

use crate::broadcast::{BusyState, FaultChannel};
use crate::error::{Result, SessionError};
use crate::types::{FaultRecord, WorkItemId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job<C> = Box<dyn FnOnce(&mut C) -> Result<()> + Send>;

/// A unit of work waiting for the worker.
pub struct WorkItem<C> {
    pub id: WorkItemId,
    pub operation: String,
    job: Job<C>,
    /// Released only after the item's fault, if any, has been published.
    held: Option<Box<dyn Send>>,
}

struct QueueState<C> {
    /// The only sender; taking it closes the queue.
    sender: Option<Sender<WorkItem<C>>>,
    next_id: u64,
}

/// Producer side of the work queue. Unbounded; submitting never blocks.
pub struct WorkQueue<C> {
    state: Mutex<QueueState<C>>,
}

impl<C> WorkQueue<C> {
    /// Create a queue and the receiver its worker drains.
    pub fn open() -> (Self, Receiver<WorkItem<C>>) {
        let (sender, receiver) = unbounded();
        let queue = Self {
            state: Mutex::new(QueueState {
                sender: Some(sender),
                next_id: 1,
            }),
        };
        (queue, receiver)
    }

    /// Enqueue `job` behind every item already submitted.
    pub fn submit<F>(&self, operation: impl Into<String>, job: F) -> Result<WorkItemId>
    where
        F: FnOnce(&mut C) -> Result<()> + Send + 'static,
    {
        self.enqueue(operation.into(), Box::new(job), None)
    }

    /// Like [`WorkQueue::submit`], but `held` outlives the job: it is dropped
    /// after a failure has reached the fault channel.
    ///
    /// Pass a clone of a result sender here so the receiving side cannot see
    /// completion before the matching fault.
    pub fn submit_holding<F, H>(
        &self,
        operation: impl Into<String>,
        held: H,
        job: F,
    ) -> Result<WorkItemId>
    where
        F: FnOnce(&mut C) -> Result<()> + Send + 'static,
        H: Send + 'static,
    {
        self.enqueue(operation.into(), Box::new(job), Some(Box::new(held)))
    }

    fn enqueue(
        &self,
        operation: String,
        job: Job<C>,
        held: Option<Box<dyn Send>>,
    ) -> Result<WorkItemId> {
        // Ids are assigned under the lock so they follow queue order
        let mut state = self.state.lock();
        let id = WorkItemId(state.next_id);
        let sender = state.sender.as_ref().ok_or(SessionError::Closed)?;

        let item = WorkItem {
            id,
            operation,
            job,
            held,
        };
        sender.send(item).map_err(|_| SessionError::Closed)?;
        state.next_id += 1;

        Ok(id)
    }

    /// Stop accepting work. Items already queued still run.
    ///
    /// Returns true only for the call that actually closed the queue.
    pub fn close(&self) -> bool {
        self.state.lock().sender.take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().sender.is_none()
    }

    /// Items submitted but not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.state.lock().sender.as_ref().map_or(0, Sender::len)
    }
}

/// Publishes idle when dropped, so the busy flag is released on every path.
struct BusyGuard<'a>(&'a BusyState);

impl<'a> BusyGuard<'a> {
    fn enter(status: &'a BusyState) -> Self {
        status.publish(true);
        BusyGuard(status)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.publish(false);
    }
}

/// Start the worker thread. It owns `context` and hands it back once the
/// queue is closed and drained.
pub fn spawn_worker<C: Send + 'static>(
    name: &str,
    context: C,
    receiver: Receiver<WorkItem<C>>,
    status: Arc<BusyState>,
    faults: Arc<FaultChannel>,
) -> Result<JoinHandle<C>> {
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run_worker(context, receiver, &status, &faults))?;
    Ok(handle)
}

fn run_worker<C>(
    mut context: C,
    receiver: Receiver<WorkItem<C>>,
    status: &BusyState,
    faults: &FaultChannel,
) -> C {
    tracing::info!("worker started");

    let mut executed = 0u64;
    while let Ok(item) = receiver.recv() {
        execute(&mut context, item, status, faults);
        executed += 1;
    }

    tracing::info!(executed, "worker stopped");
    context
}

/// Run one item between busy and idle, reporting any failure as a fault.
fn execute<C>(context: &mut C, item: WorkItem<C>, status: &BusyState, faults: &FaultChannel) {
    let WorkItem {
        id,
        operation,
        job,
        held,
    } = item;
    let _busy = BusyGuard::enter(status);

    tracing::debug!(item = id.0, operation = %operation, "running work item");

    // The context may be left mid-change by a panicking item; it stays in use
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(context)))
        .unwrap_or_else(|payload| Err(SessionError::from_panic(payload)));

    if let Err(error) = outcome {
        faults.publish(FaultRecord::new(id, operation, error));
    }

    // Fault first, then completion, then idle
    drop(held);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Harness {
        queue: WorkQueue<Vec<u64>>,
        status: Arc<BusyState>,
        faults: Arc<FaultChannel>,
        worker: JoinHandle<Vec<u64>>,
    }

    fn harness() -> Harness {
        let (queue, receiver) = WorkQueue::open();
        let status = Arc::new(BusyState::new());
        let faults = Arc::new(FaultChannel::new());
        let worker = spawn_worker(
            "test-worker",
            Vec::new(),
            receiver,
            Arc::clone(&status),
            Arc::clone(&faults),
        )
        .unwrap();
        Harness {
            queue,
            status,
            faults,
            worker,
        }
    }

    impl Harness {
        fn finish(self) -> Vec<u64> {
            self.queue.close();
            self.worker.join().unwrap()
        }
    }

    #[test]
    fn test_items_run_in_submission_order() {
        let h = harness();
        for i in 0..100 {
            h.queue
                .submit("push", move |log: &mut Vec<u64>| {
                    log.push(i);
                    Ok(())
                })
                .unwrap();
        }

        assert_eq!(h.finish(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_ids_follow_submission_order() {
        let h = harness();
        let a = h.queue.submit("a", |_: &mut Vec<u64>| Ok(())).unwrap();
        let b = h.queue.submit("b", |_: &mut Vec<u64>| Ok(())).unwrap();
        assert!(a < b);
        h.finish();
    }

    #[test]
    fn test_failing_item_is_isolated() {
        let h = harness();
        let faults = h.faults.subscribe();

        h.queue
            .submit("fails", |_: &mut Vec<u64>| {
                Err(SessionError::Execution("bad item".into()))
            })
            .unwrap();
        h.queue
            .submit("panics", |_: &mut Vec<u64>| panic!("exploded"))
            .unwrap();
        h.queue
            .submit("after", |log: &mut Vec<u64>| {
                log.push(1);
                Ok(())
            })
            .unwrap();

        assert_eq!(h.finish(), vec![1]);

        let seen = faults.drain();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].operation, "fails");
        assert!(matches!(*seen[1].error, SessionError::Panicked(ref m) if m == "exploded"));
    }

    #[test]
    fn test_held_value_released_after_fault() {
        let h = harness();
        let faults = h.faults.subscribe();
        let (sender, receiver) = crossbeam_channel::unbounded::<u64>();

        for attempt in 0..200 {
            let job_sender = sender.clone();
            h.queue
                .submit_holding("fails", sender.clone(), move |_: &mut Vec<u64>| {
                    drop(job_sender);
                    Err(SessionError::Execution(format!("attempt {attempt}")))
                })
                .unwrap();
        }
        drop(sender);

        // Completion is only observable once the last fault is out
        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(5)),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected)
        );
        assert_eq!(faults.drain().len(), 200);
        h.finish();
    }

    #[test]
    fn test_busy_bracket_around_each_item() {
        let h = harness();
        let observer = h.status.subscribe();
        let (release, gate) = crossbeam_channel::bounded::<()>(0);

        h.queue
            .submit("blocked", move |_: &mut Vec<u64>| {
                gate.recv().ok();
                Ok(())
            })
            .unwrap();

        assert_eq!(observer.recv_timeout(Duration::from_secs(5)), Ok(false));
        assert_eq!(observer.recv_timeout(Duration::from_secs(5)), Ok(true));
        assert!(h.status.is_busy());

        release.send(()).unwrap();
        assert_eq!(observer.recv_timeout(Duration::from_secs(5)), Ok(false));
        h.finish();
    }

    #[test]
    fn test_close_drains_pending_and_rejects_new() {
        let h = harness();
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let ran = Arc::clone(&ran);
            h.queue
                .submit("count", move |_: &mut Vec<u64>| {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }

        assert!(h.queue.close());
        assert!(!h.queue.close());
        assert!(h.queue.is_closed());
        assert!(matches!(
            h.queue.submit("late", |_: &mut Vec<u64>| Ok(())),
            Err(SessionError::Closed)
        ));

        h.worker.join().unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 10);
    }
}
