//! The shared context collaborator.
//!
//! A context owns one collection per entity type and can persist the changes
//! staged against those collections. It is not thread-safe and does not need
//! to be: a [`Session`](crate::Session) moves it onto its worker thread and
//! every access happens there, one work item at a time.

mod memory;

pub use memory::{MemoryContext, MemorySet};

use crate::error::Result;
use crate::query::Queryable;
use crate::types::{DiagnosticSink, EntityType};
use std::fmt;

/// A type that can be stored in a context collection.
pub trait Entity: Clone + Send + 'static {
    /// Identity used to match removed or reattached items to stored ones.
    type Key: Ord + Clone + fmt::Debug + Send + 'static;

    fn key(&self) -> Self::Key;

    /// Human-readable name used in errors and schema listings.
    fn entity_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// One collection inside a context.
///
/// Mutations are staged; they become visible to [`EntitySet::query`] once the
/// owning context saves its changes.
pub trait EntitySet<T: Entity> {
    /// Stage `item` for insertion.
    fn add(&mut self, item: T);

    /// Stage removal of the stored item with the same key.
    fn remove(&mut self, item: T);

    /// Reattach `item` without inserting it. Saving writes it over the stored
    /// item with the same key.
    fn attach(&mut self, item: T);

    /// Stored items, in storage order.
    fn query(&self) -> Queryable<'_, T>;

    /// Number of staged, unsaved changes.
    fn pending_changes(&self) -> usize;
}

/// The stateful data source a session serializes access to.
pub trait SharedContext: Send + 'static {
    fn set<T: Entity>(&self) -> Result<&dyn EntitySet<T>>;

    fn set_mut<T: Entity>(&mut self) -> Result<&mut dyn EntitySet<T>>;

    /// Persist every staged change. Returns the number of changes written.
    fn save_changes(&mut self) -> Result<usize>;

    /// Install the sink diagnostic messages are written to.
    fn set_diagnostics(&mut self, _sink: DiagnosticSink) {}
}

/// Lists the entity types a context exposes as collections.
pub trait SchemaIntrospector {
    fn available_types(&self) -> Vec<EntityType>;
}
