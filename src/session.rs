//! Session tying the queue, broadcasters and context together.

use crate::broadcast::{BusyState, FaultChannel, FaultReceiver, StatusReceiver};
use crate::context::{Entity, SchemaIntrospector, SharedContext};
use crate::error::{Result, SessionError};
use crate::query::{DeferredQuery, Query, Queryable};
use crate::queue::{spawn_worker, WorkQueue};
use crate::store::{Take, Workspace};
use crate::stream::{Completion, ResultStream};
use crate::types::{DiagnosticSink, EntityType};
use crossbeam_channel::{bounded, unbounded};
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Session configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Name of the worker thread.
    pub worker_name: String,

    /// Where context diagnostics go (None = `tracing` at debug level).
    pub diagnostics: Option<DiagnosticSink>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            worker_name: "session-worker".to_string(),
            diagnostics: None,
        }
    }
}

/// Serialized, observable access to one shared context.
///
/// Every fetch, mutation and save is queued and run one at a time on the
/// session's worker thread, in submission order. Callers never block on
/// submission; they get a [`ResultStream`] or [`Completion`] to wait on.
/// Failures inside queued work are published on [`Session::thrown_errors`]
/// and never stop the queue.
///
/// A long-running item holds up every item behind it. There is no timeout
/// and no cancellation of queued work.
pub struct Session<C> {
    queue: Arc<WorkQueue<C>>,
    status: Arc<BusyState>,
    faults: Arc<FaultChannel>,
    worker: Option<JoinHandle<C>>,
    /// Captured once at construction; metadata only.
    schema: Vec<EntityType>,
}

impl<C: SharedContext + SchemaIntrospector> Session<C> {
    pub fn new(context: C) -> Result<Self> {
        Self::with_config(context, SessionConfig::default())
    }

    pub fn with_config(mut context: C, config: SessionConfig) -> Result<Self> {
        context.set_diagnostics(config.diagnostics.clone().unwrap_or_default());
        let schema = context.available_types();

        let status = Arc::new(BusyState::new());
        let faults = Arc::new(FaultChannel::new());
        let (queue, receiver) = WorkQueue::open();

        let worker = spawn_worker(
            &config.worker_name,
            context,
            receiver,
            Arc::clone(&status),
            Arc::clone(&faults),
        )?;

        tracing::info!(
            worker = %config.worker_name,
            entity_types = schema.len(),
            "session opened"
        );

        Ok(Self {
            queue: Arc::new(queue),
            status,
            faults,
            worker: Some(worker),
            schema,
        })
    }
}

impl<C: SharedContext> Session<C> {
    // --- Access ---

    /// Handle for queueing mutations of the `T` collection.
    pub fn take<T: Entity>(&self) -> Take<C, T> {
        Take::new(Arc::clone(&self.queue))
    }

    /// Entity types the context exposes.
    pub fn available_types(&self) -> &[EntityType] {
        &self.schema
    }

    // --- Fetching ---

    /// Queue a closure against the context and stream back what it returns.
    ///
    /// The returned items are delivered only after the closure finished. If
    /// it fails or panics, the stream completes empty and the error is
    /// published as a fault.
    pub fn submit<R, F>(&self, operation: impl Into<String>, f: F) -> Result<ResultStream<R>>
    where
        R: Send + 'static,
        F: FnOnce(&mut Workspace<'_, C>) -> Result<Vec<R>> + Send + 'static,
    {
        let (sender, receiver) = unbounded();

        // The queue keeps one sender until any fault is published
        let held = sender.clone();
        self.queue.submit_holding(operation, held, move |context: &mut C| {
            let results = f(&mut Workspace::new(context))?;
            for item in results {
                if sender.send(item).is_err() {
                    // Caller dropped the stream
                    break;
                }
            }
            Ok(())
        })?;

        Ok(ResultStream::new(receiver))
    }

    /// Every stored `T`.
    pub fn fetch_results<T: Entity>(&self) -> Result<ResultStream<T>> {
        self.fetch_query(Query::<T>::identity())
    }

    /// Results of `query` applied to the stored items of `S`.
    ///
    /// A query without a transformation is rejected here and never queued.
    pub fn fetch_query<S, R>(&self, query: DeferredQuery<S, R>) -> Result<ResultStream<R>>
    where
        S: Entity,
        R: Send + 'static,
    {
        if !query.is_configured() {
            return Err(SessionError::missing_transformation());
        }

        self.submit(
            format!("fetch_results<{}>", S::entity_name()),
            move |workspace| query.against(workspace.query::<S>()?),
        )
    }

    /// Merge two collections with `merge`, then apply `query`, as one
    /// queued item.
    pub fn fetch_merged_results<S1, S2, R, T, M>(
        &self,
        merge: M,
        query: DeferredQuery<R, T>,
    ) -> Result<ResultStream<T>>
    where
        S1: Entity,
        S2: Entity,
        R: 'static,
        T: Send + 'static,
        M: for<'a> FnOnce(Queryable<'a, S1>, Queryable<'a, S2>) -> Queryable<'a, R> + Send + 'static,
    {
        if !query.is_configured() {
            return Err(SessionError::missing_transformation());
        }

        let operation = format!(
            "fetch_merged_results<{}, {}>",
            S1::entity_name(),
            S2::entity_name()
        );
        self.submit(operation, move |workspace| {
            let first = workspace.query::<S1>()?;
            let second = workspace.query::<S2>()?;
            query.against(merge(first, second))
        })
    }

    /// [`Session::fetch_merged_results`] with the identity query.
    pub fn fetch_merged<S1, S2, R, M>(&self, merge: M) -> Result<ResultStream<R>>
    where
        S1: Entity,
        S2: Entity,
        R: Send + 'static,
        M: for<'a> FnOnce(Queryable<'a, S1>, Queryable<'a, S2>) -> Queryable<'a, R> + Send + 'static,
    {
        self.fetch_merged_results(merge, Query::<R>::identity())
    }

    // --- Saving ---

    /// Start a batch of changes. Closing (or dropping) the handle queues a
    /// save of everything staged by then.
    pub fn scoped_changes(&self) -> ScopedChanges<C> {
        ScopedChanges {
            queue: Arc::clone(&self.queue),
            armed: true,
        }
    }

    // --- Observation ---

    /// Busy/idle transitions, starting with the current state.
    pub fn is_working(&self) -> StatusReceiver {
        self.status.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.status.is_busy()
    }

    /// Faults raised by queued work from now on.
    pub fn thrown_errors(&self) -> FaultReceiver {
        self.faults.subscribe()
    }

    /// Items submitted but not yet started.
    pub fn pending_items(&self) -> usize {
        self.queue.pending()
    }

    // --- Lifecycle ---

    /// Stop accepting work, let queued items finish, then release observers
    /// and the context.
    ///
    /// Safe to call repeatedly. Blocks until the worker has drained the queue.
    pub fn close(&mut self) -> Result<()> {
        self.shutdown().map(drop)
    }

    /// Close the session and take back the context.
    pub fn into_context(mut self) -> Result<C> {
        self.shutdown()?.ok_or(SessionError::Closed)
    }
}

impl<C> Session<C> {
    fn shutdown(&mut self) -> Result<Option<C>> {
        let closed_now = self.queue.close();

        // Later steps run even if the worker died
        let context = match self.worker.take() {
            Some(handle) => handle
                .join()
                .map(Some)
                .map_err(|_| SessionError::WorkerPanicked),
            None => Ok(None),
        };

        self.status.close();
        self.faults.close();

        if closed_now {
            tracing::info!("session closed");
        }
        context
    }
}

impl<C> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("schema", &self.schema)
            .field("busy", &self.status.is_busy())
            .field("closed", &self.queue.is_closed())
            .finish()
    }
}

impl<C> Drop for Session<C> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "session shutdown failed");
        }
    }
}

/// A batch of changes persisted when the handle is closed.
///
/// Closing queues one save behind everything already submitted, so
/// mutations queued earlier through [`Take`] or [`Session::submit`] are
/// included.
pub struct ScopedChanges<C: SharedContext> {
    queue: Arc<WorkQueue<C>>,
    armed: bool,
}

impl<C: SharedContext> ScopedChanges<C> {
    /// Queue the save. The completion yields `true` on success or `false` on
    /// failure (the error also goes to the fault channel), then completes.
    pub fn close(mut self) -> Result<Completion> {
        self.armed = false;
        queue_save(&self.queue)
    }
}

impl<C: SharedContext> Drop for ScopedChanges<C> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = queue_save(&self.queue) {
                tracing::debug!(error = %e, "scoped changes dropped after session closed");
            }
        }
    }
}

fn queue_save<C: SharedContext>(queue: &WorkQueue<C>) -> Result<Completion> {
    let (sender, receiver) = bounded(1);

    let held = sender.clone();
    queue.submit_holding("save_changes", held, move |context: &mut C| {
        match context.save_changes() {
            Ok(written) => {
                tracing::debug!(written, "scoped changes saved");
                let _ = sender.send(true);
                Ok(())
            }
            Err(e) => {
                let _ = sender.send(false);
                Err(e)
            }
        }
    })?;

    Ok(Completion::new(receiver))
}
