//! Deferred, composable query descriptions.

use super::Queryable;
use crate::error::{Result, SessionError};
use std::fmt;
use std::sync::Arc;

type QueryFn<S, R> = Arc<dyn for<'a> Fn(Queryable<'a, S>) -> Queryable<'a, R> + Send + Sync>;

/// An immutable description of a transformation from a queryable of `S` to
/// a queryable of `R`.
///
/// A query built without a transformation is accepted at construction and
/// rejected with a configuration error when it is dispatched. Composition
/// never mutates the receiver, so a query may be reused across any number
/// of submissions.
pub struct DeferredQuery<S, R> {
    apply: Option<QueryFn<S, R>>,
}

/// A query whose source and result types are the same.
pub type Query<T> = DeferredQuery<T, T>;

impl<S: 'static, R: 'static> DeferredQuery<S, R> {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(Queryable<'a, S>) -> Queryable<'a, R> + Send + Sync + 'static,
    {
        Self {
            apply: Some(Arc::new(f)),
        }
    }

    /// A query with no transformation. Dispatching it fails.
    pub fn unconfigured() -> Self {
        Self { apply: None }
    }

    pub fn is_configured(&self) -> bool {
        self.apply.is_some()
    }

    /// Apply the transformation to `source` and materialize every result.
    ///
    /// Upstream operations stay lazy; this is where the source is enumerated,
    /// exactly once.
    pub fn against<'a, I>(&self, source: I) -> Result<Vec<R>>
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: 'a,
    {
        let apply = self
            .apply
            .as_ref()
            .ok_or_else(SessionError::missing_transformation)?;
        Ok(apply(Queryable::new(source)).collect())
    }

    /// Build a new query that runs this one and then `f`.
    pub fn with<Out: 'static, F>(&self, f: F) -> DeferredQuery<S, Out>
    where
        F: for<'a> Fn(Queryable<'a, R>) -> Queryable<'a, Out> + Send + Sync + 'static,
    {
        match &self.apply {
            Some(apply) => {
                let apply = Arc::clone(apply);
                DeferredQuery::new(move |source| f(apply(source)))
            }
            None => DeferredQuery::unconfigured(),
        }
    }
}

impl<T: 'static> DeferredQuery<T, T> {
    /// The no-op query: yields exactly the source items, in source order.
    pub fn identity() -> Self {
        Self::new(|source| source)
    }
}

impl<S, R> Clone for DeferredQuery<S, R> {
    fn clone(&self) -> Self {
        Self {
            apply: self.apply.clone(),
        }
    }
}

impl<S: 'static, R: 'static> Default for DeferredQuery<S, R> {
    fn default() -> Self {
        Self::unconfigured()
    }
}

impl<S, R> fmt::Debug for DeferredQuery<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQuery")
            .field("source", &std::any::type_name::<S>())
            .field("result", &std::any::type_name::<R>())
            .field("configured", &self.apply.is_some())
            .finish()
    }
}
