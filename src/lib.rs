//! # Serial Session
//!
//! Serialized, observable access to one shared, non-thread-safe data context
//! from any number of concurrent callers.
//!
//! ## Core Concepts
//!
//! - **Deferred queries**: composable transformations that run only when
//!   dispatched against a collection
//! - **Work queue**: every operation is a work item run one at a time, in
//!   submission order, on a dedicated worker thread that owns the context
//! - **Status and faults**: busy/idle transitions and captured failures are
//!   broadcast to any number of observers
//! - **Scoped changes**: staged mutations are persisted by one queued save
//!
//! ## Example
//!
//! ```ignore
//! use serial_session::{MemoryContext, Query, Session};
//!
//! let session = Session::new(MemoryContext::new().with_set::<Person>())?;
//!
//! // Queue mutations, then persist them
//! let people = session.take::<Person>();
//! people.add(Person::new(1, "Ada"))?;
//! let saved = session.scoped_changes().close()?;
//! assert_eq!(saved.wait(), Some(true));
//!
//! // Query without blocking the caller until results are needed
//! let query = Query::<Person>::new(|q| q.filter(|p| p.name.starts_with('A')));
//! let results = session.fetch_query(query)?.collect_all();
//! ```

pub mod broadcast;
pub mod context;
pub mod error;
pub mod query;
pub mod queue;
pub mod session;
pub mod store;
pub mod stream;
pub mod types;

// Re-exports
pub use broadcast::{BusyState, FaultChannel, FaultReceiver, StatusReceiver, SubscriptionId};
pub use context::{Entity, EntitySet, MemoryContext, SchemaIntrospector, SharedContext};
pub use error::{Result, SessionError};
pub use query::{DeferredQuery, Query, Queryable};
pub use queue::{WorkItem, WorkQueue};
pub use session::{ScopedChanges, Session, SessionConfig};
pub use store::{Store, Take, Workspace};
pub use stream::{Completion, ResultStream};
pub use types::*;
