//! Core types shared across the session, queue and broadcast channels.

use crate::context::Entity;
use crate::error::SessionError;
use serde::{Serialize, Serializer};
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier assigned to every work item at submission, in submission order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WorkItemId(pub u64);

impl fmt::Debug for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkItemId({})", self.0)
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time. Clocks set before the epoch read as zero.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// An entity type a context can expose as a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct EntityType {
    pub name: &'static str,
    #[serde(skip)]
    pub type_id: TypeId,
}

impl EntityType {
    /// Describe the entity type `T`.
    pub fn of<T: Entity>() -> Self {
        Self {
            name: T::entity_name(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Check whether this describes `T`.
    pub fn is<T: Entity>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A failure captured while a work item ran on the worker.
#[derive(Clone, Debug, Serialize)]
pub struct FaultRecord {
    /// The work item that failed.
    pub id: WorkItemId,
    /// Operation label given at submission (e.g. `fetch_results<Person>`).
    pub operation: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: Arc<SessionError>,
    pub timestamp: Timestamp,
}

impl FaultRecord {
    pub fn new(id: WorkItemId, operation: impl Into<String>, error: SessionError) -> Self {
        Self {
            id,
            operation: operation.into(),
            error: Arc::new(error),
            timestamp: Timestamp::now(),
        }
    }
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (item {}): {}", self.operation, self.id, self.error)
    }
}

fn serialize_error<S: Serializer>(error: &Arc<SessionError>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// Callback receiving diagnostic messages emitted by a context.
#[derive(Clone)]
pub struct DiagnosticSink(Arc<dyn Fn(&str) + Send + Sync>);

impl DiagnosticSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        DiagnosticSink(Arc::new(f))
    }

    /// Sink that forwards every message to `tracing` at debug level.
    pub fn tracing() -> Self {
        DiagnosticSink::new(|message| {
            tracing::debug!(target: "serial_session::context", "{}", message);
        })
    }

    pub fn emit(&self, message: &str) {
        (self.0)(message)
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DiagnosticSink(..)")
    }
}
