//! Composable deferred queries.
//!
//! A [`DeferredQuery`] describes a transformation from a [`Queryable`] of one
//! type to a [`Queryable`] of another without running it. Queries are composed
//! with [`DeferredQuery::with`] and only evaluated when dispatched against a
//! concrete source with [`DeferredQuery::against`].
//!
//! # Example
//!
//! ```ignore
//! let query = Query::<i32>::new(|q| q.filter(|x| *x < 3));
//! assert_eq!(query.against(vec![1, 2, 3, 4])?, vec![1, 2]);
//!
//! let reversed = query.with(|q| q.sort_by(|a, b| b.cmp(a)));
//! assert_eq!(reversed.against(vec![1, 2, 3, 4])?, vec![2, 1]);
//! ```

mod deferred;
mod queryable;

pub use deferred::{DeferredQuery, Query};
pub use queryable::Queryable;
