//! Per-type access to the shared context.
//!
//! [`Store`] and [`Workspace`] only exist while a work item is running on the
//! worker, so they can touch the context directly. [`Take`] is the handle
//! callers hold outside the worker: each mutation is queued as its own work
//! item instead of being applied in place.

use crate::context::{Entity, EntitySet, SharedContext};
use crate::error::Result;
use crate::query::Queryable;
use crate::queue::WorkQueue;
use crate::types::WorkItemId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Mutation and query surface over one collection.
pub struct Store<'a, T: Entity> {
    set: &'a mut dyn EntitySet<T>,
}

impl<'a, T: Entity> Store<'a, T> {
    pub fn add(&mut self, item: T) {
        self.set.add(item);
    }

    pub fn remove(&mut self, item: T) {
        self.set.remove(item);
    }

    /// Same as [`Store::attach`]: saving writes `item` over the stored one.
    pub fn update(&mut self, item: T) {
        self.set.attach(item);
    }

    pub fn attach(&mut self, item: T) {
        self.set.attach(item);
    }

    pub fn query(&self) -> Queryable<'_, T> {
        self.set.query()
    }

    pub fn pending_changes(&self) -> usize {
        self.set.pending_changes()
    }
}

/// The context as seen by a running work item.
pub struct Workspace<'a, C> {
    context: &'a mut C,
}

impl<'a, C: SharedContext> Workspace<'a, C> {
    pub(crate) fn new(context: &'a mut C) -> Self {
        Self { context }
    }

    pub fn store<T: Entity>(&mut self) -> Result<Store<'_, T>> {
        Ok(Store {
            set: self.context.set_mut::<T>()?,
        })
    }

    /// Read-only view of the stored items of `T`.
    pub fn query<T: Entity>(&self) -> Result<Queryable<'_, T>> {
        Ok(self.context.set::<T>()?.query())
    }

    pub fn save_changes(&mut self) -> Result<usize> {
        self.context.save_changes()
    }

    pub fn context(&mut self) -> &mut C {
        &mut *self.context
    }
}

/// Queues mutations of one collection from outside the worker.
///
/// Every call submits a work item and returns its id; the change is staged
/// when the worker reaches it and persisted by the next save, typically a
/// closed [`ScopedChanges`](crate::ScopedChanges).
pub struct Take<C, T> {
    queue: Arc<WorkQueue<C>>,
    _entity: PhantomData<fn(T)>,
}

impl<C: SharedContext, T: Entity> Take<C, T> {
    pub(crate) fn new(queue: Arc<WorkQueue<C>>) -> Self {
        Self {
            queue,
            _entity: PhantomData,
        }
    }

    pub fn add(&self, item: T) -> Result<WorkItemId> {
        self.stage("add", item, |store, item| store.add(item))
    }

    pub fn remove(&self, item: T) -> Result<WorkItemId> {
        self.stage("remove", item, |store, item| store.remove(item))
    }

    pub fn update(&self, item: T) -> Result<WorkItemId> {
        self.stage("update", item, |store, item| store.update(item))
    }

    pub fn attach(&self, item: T) -> Result<WorkItemId> {
        self.stage("attach", item, |store, item| store.attach(item))
    }

    fn stage(&self, verb: &str, item: T, apply: fn(&mut Store<'_, T>, T)) -> Result<WorkItemId> {
        self.queue
            .submit(format!("{}<{}>", verb, T::entity_name()), move |context: &mut C| {
                let mut workspace = Workspace::new(context);
                apply(&mut workspace.store::<T>()?, item);
                Ok(())
            })
    }
}

impl<C, T> Clone for Take<C, T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            _entity: PhantomData,
        }
    }
}

impl<C, T> fmt::Debug for Take<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Take")
            .field("entity", &std::any::type_name::<T>())
            .finish()
    }
}
