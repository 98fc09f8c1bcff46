//! In-process context with staged changes and atomic saves.

use super::{Entity, EntitySet, SchemaIntrospector, SharedContext};
use crate::error::{Result, SessionError};
use crate::query::Queryable;
use crate::types::{DiagnosticSink, EntityType};
use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// A staged change to one collection.
#[derive(Clone, Debug)]
enum Change<T> {
    Added(T),
    Removed(T),
    Modified(T),
}

/// Collection of one entity type inside a [`MemoryContext`].
pub struct MemorySet<T: Entity> {
    /// Committed items, in insertion order.
    rows: Vec<T>,
    staged: Vec<Change<T>>,
}

impl<T: Entity> MemorySet<T> {
    fn new(rows: Vec<T>) -> Self {
        Self {
            rows,
            staged: Vec::new(),
        }
    }

    fn position(&self, key: &T::Key) -> Option<usize> {
        self.rows.iter().position(|row| &row.key() == key)
    }
}

impl<T: Entity> EntitySet<T> for MemorySet<T> {
    fn add(&mut self, item: T) {
        self.staged.push(Change::Added(item));
    }

    fn remove(&mut self, item: T) {
        self.staged.push(Change::Removed(item));
    }

    fn attach(&mut self, item: T) {
        self.staged.push(Change::Modified(item));
    }

    fn query(&self) -> Queryable<'_, T> {
        Queryable::new(self.rows.iter().cloned())
    }

    fn pending_changes(&self) -> usize {
        self.staged.len()
    }
}

/// Type-erased view used by the context to save every set together.
trait ErasedSet: Send {
    fn entity_type(&self) -> EntityType;

    /// Replay staged changes against the committed keys without applying them.
    fn validate(&self) -> Result<()>;

    /// Apply staged changes. Only called after `validate` succeeded.
    fn commit(&mut self) -> usize;

    fn discard(&mut self) -> usize;

    fn pending(&self) -> usize;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Entity> ErasedSet for MemorySet<T> {
    fn entity_type(&self) -> EntityType {
        EntityType::of::<T>()
    }

    fn validate(&self) -> Result<()> {
        let mut keys: BTreeSet<T::Key> = self.rows.iter().map(Entity::key).collect();

        for change in &self.staged {
            match change {
                Change::Added(item) => {
                    let key = item.key();
                    if !keys.insert(key.clone()) {
                        return Err(SessionError::Persistence(format!(
                            "{} with key {:?} already exists",
                            T::entity_name(),
                            key
                        )));
                    }
                }
                Change::Removed(item) => {
                    let key = item.key();
                    if !keys.remove(&key) {
                        return Err(SessionError::Persistence(format!(
                            "cannot remove {} with key {:?}: not found",
                            T::entity_name(),
                            key
                        )));
                    }
                }
                Change::Modified(item) => {
                    let key = item.key();
                    if !keys.contains(&key) {
                        return Err(SessionError::Persistence(format!(
                            "cannot update {} with key {:?}: not found",
                            T::entity_name(),
                            key
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    fn commit(&mut self) -> usize {
        let staged = std::mem::take(&mut self.staged);
        let count = staged.len();

        for change in staged {
            match change {
                Change::Added(item) => self.rows.push(item),
                Change::Removed(item) => {
                    if let Some(pos) = self.position(&item.key()) {
                        self.rows.remove(pos);
                    }
                }
                Change::Modified(item) => {
                    if let Some(pos) = self.position(&item.key()) {
                        self.rows[pos] = item;
                    }
                }
            }
        }

        count
    }

    fn discard(&mut self) -> usize {
        let count = self.staged.len();
        self.staged.clear();
        count
    }

    fn pending(&self) -> usize {
        self.staged.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A context that keeps every collection in memory.
///
/// Saves are all-or-nothing: every staged change across every set is checked
/// first (duplicate adds, removes or updates of missing keys) and nothing is
/// written if any check fails. A rejected save discards the staged changes.
pub struct MemoryContext {
    sets: HashMap<TypeId, Box<dyn ErasedSet>>,
    /// Registration order, for schema listings.
    order: Vec<TypeId>,
    diagnostics: Option<DiagnosticSink>,
}

impl MemoryContext {
    pub fn new() -> Self {
        Self {
            sets: HashMap::new(),
            order: Vec::new(),
            diagnostics: None,
        }
    }

    /// Register an empty collection for `T`.
    pub fn with_set<T: Entity>(self) -> Self {
        self.with_rows::<T>(Vec::new())
    }

    /// Register a collection for `T` holding `rows` as already-saved data.
    ///
    /// Registering the same type twice replaces the earlier collection.
    pub fn with_rows<T: Entity>(mut self, rows: Vec<T>) -> Self {
        let id = TypeId::of::<T>();
        if self.sets.insert(id, Box::new(MemorySet::new(rows))).is_none() {
            self.order.push(id);
        }
        self
    }

    /// Staged changes across all sets.
    pub fn pending_changes(&self) -> usize {
        self.sets.values().map(|set| set.pending()).sum()
    }

    fn emit(&self, message: &str) {
        match &self.diagnostics {
            Some(sink) => sink.emit(message),
            None => tracing::trace!(target: "serial_session::context", "{}", message),
        }
    }

    fn discard_all(&mut self) -> usize {
        self.sets.values_mut().map(|set| set.discard()).sum()
    }
}

impl Default for MemoryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedContext for MemoryContext {
    fn set<T: Entity>(&self) -> Result<&dyn EntitySet<T>> {
        self.sets
            .get(&TypeId::of::<T>())
            .and_then(|set| set.as_any().downcast_ref::<MemorySet<T>>())
            .map(|set| set as &dyn EntitySet<T>)
            .ok_or(SessionError::UnknownEntity(T::entity_name()))
    }

    fn set_mut<T: Entity>(&mut self) -> Result<&mut dyn EntitySet<T>> {
        self.sets
            .get_mut(&TypeId::of::<T>())
            .and_then(|set| set.as_any_mut().downcast_mut::<MemorySet<T>>())
            .map(|set| set as &mut dyn EntitySet<T>)
            .ok_or(SessionError::UnknownEntity(T::entity_name()))
    }

    fn save_changes(&mut self) -> Result<usize> {
        let rejected = self
            .order
            .iter()
            .filter_map(|id| self.sets.get(id))
            .find_map(|set| set.validate().err());

        if let Some(e) = rejected {
            let discarded = self.discard_all();
            self.emit(&format!("save rejected, {} changes discarded: {}", discarded, e));
            return Err(e);
        }

        let mut written = 0;
        for id in &self.order {
            if let Some(set) = self.sets.get_mut(id) {
                written += set.commit();
            }
        }

        self.emit(&format!("saved {} changes", written));
        Ok(written)
    }

    fn set_diagnostics(&mut self, sink: DiagnosticSink) {
        self.diagnostics = Some(sink);
    }
}

impl SchemaIntrospector for MemoryContext {
    fn available_types(&self) -> Vec<EntityType> {
        self.order
            .iter()
            .filter_map(|id| self.sets.get(id))
            .map(|set| set.entity_type())
            .collect()
    }
}

impl fmt::Debug for MemoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryContext")
            .field("types", &self.available_types())
            .field("pending_changes", &self.pending_changes())
            .finish()
    }
}
