//! Lazily evaluated sources handed to query transformations.

use std::cmp::Ordering;
use std::fmt;

/// A single-pass, lazily evaluated sequence of owned items.
///
/// May borrow from the shared context for `'a`. Nothing is pulled from the
/// underlying source until the queryable itself is iterated, including for
/// the buffering operations (`sort_by`, `reverse`, ...).
pub struct Queryable<'a, T> {
    inner: Box<dyn Iterator<Item = T> + 'a>,
}

impl<'a, T: 'a> Queryable<'a, T> {
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'a,
    {
        Self {
            inner: Box::new(items.into_iter()),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: FnMut(&T) -> bool + 'a,
    {
        Queryable::new(self.inner.filter(predicate))
    }

    pub fn map<U: 'a, F>(self, f: F) -> Queryable<'a, U>
    where
        F: FnMut(T) -> U + 'a,
    {
        Queryable::new(self.inner.map(f))
    }

    /// Append the items of `other` after this queryable's items.
    pub fn chain(self, other: Queryable<'a, T>) -> Self {
        Queryable::new(self.inner.chain(other.inner))
    }

    pub fn take(self, n: usize) -> Self {
        Queryable::new(self.inner.take(n))
    }

    pub fn skip(self, n: usize) -> Self {
        Queryable::new(self.inner.skip(n))
    }

    /// Stable sort using `compare`.
    pub fn sort_by<F>(self, mut compare: F) -> Self
    where
        F: FnMut(&T, &T) -> Ordering + 'a,
    {
        self.buffered(move |items| items.sort_by(&mut compare))
    }

    /// Stable sort by the key extracted with `f`.
    pub fn sort_by_key<K: Ord, F>(self, f: F) -> Self
    where
        F: FnMut(&T) -> K + 'a,
    {
        self.buffered(move |items| items.sort_by_key(f))
    }

    pub fn reverse(self) -> Self {
        self.buffered(|items| items.reverse())
    }

    /// Defer a whole-sequence rearrangement until the first item is pulled.
    fn buffered<F>(self, rearrange: F) -> Self
    where
        F: FnOnce(&mut Vec<T>) + 'a,
    {
        let mut pending = Some((self.inner, rearrange));
        let mut ready: Option<std::vec::IntoIter<T>> = None;

        Queryable::new(std::iter::from_fn(move || {
            if let Some((source, rearrange)) = pending.take() {
                let mut items: Vec<T> = source.collect();
                rearrange(&mut items);
                ready = Some(items.into_iter());
            }
            ready.as_mut().and_then(Iterator::next)
        }))
    }
}

impl<'a, T> Iterator for Queryable<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, T: 'a> From<Vec<T>> for Queryable<'a, T> {
    fn from(items: Vec<T>) -> Self {
        Queryable::new(items)
    }
}

impl<'a, T> fmt::Debug for Queryable<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queryable").finish_non_exhaustive()
    }
}
