//! Algebraic properties of deferred queries.

use proptest::prelude::*;
use serial_session::{DeferredQuery, Query, Queryable, SessionError};

fn less_than_three() -> Query<i32> {
    Query::new(|q| q.filter(|x| *x < 3))
}

fn descending_prefix(q: Queryable<'_, i32>, keep: usize) -> Queryable<'_, i32> {
    q.sort_by(|a, b| b.cmp(a)).take(keep)
}

// --- Concrete scenarios ---

#[test]
fn test_filter_then_reverse_sort() {
    let source = vec![1, 2, 3, 4];

    assert_eq!(less_than_three().against(source.clone()).unwrap(), vec![1, 2]);

    let descending = less_than_three().with(|q| q.sort_by(|a, b| b.cmp(a)));
    assert_eq!(descending.against(source).unwrap(), vec![2, 1]);
}

#[test]
fn test_against_accepts_queryable_source() {
    let source = Queryable::new(vec![5, 1, 4]).filter(|x| *x > 1);
    let query = Query::<i32>::new(|q| q.sort_by_key(|x| *x));
    assert_eq!(query.against(source).unwrap(), vec![4, 5]);
}

#[test]
fn test_against_enumerates_source_once() {
    let mut pulls = 0;
    let source = (0..4).inspect(|_| pulls += 1);

    let query = Query::<i32>::new(|q| q.reverse()).with(|q| q.take(2));
    assert_eq!(query.against(source).unwrap(), vec![3, 2]);
    assert_eq!(pulls, 4);
}

#[test]
fn test_composition_across_types() {
    let lengths = DeferredQuery::<&'static str, usize>::new(|q| q.map(str::len));
    let total = lengths.with(|q| Queryable::new(std::iter::once(q.sum::<usize>())));

    assert_eq!(total.against(vec!["ab", "cde", ""]).unwrap(), vec![5]);
}

#[test]
fn test_missing_transformation_is_configuration_error() {
    let query: DeferredQuery<i32, String> = DeferredQuery::default();
    let composed = query.with(|q| q.take(1));

    for result in [query.against(vec![1]), composed.against(vec![1])] {
        match result {
            Err(SessionError::Configuration(message)) => {
                assert_eq!(message, "query must have a transformation")
            }
            other => panic!("Expected configuration error, got {:?}", other),
        }
    }
}

// --- Properties ---

proptest! {
    #[test]
    fn prop_identity_preserves_source(source in proptest::collection::vec(any::<i64>(), 0..64)) {
        let query = Query::<i64>::identity();
        prop_assert_eq!(query.against(source.clone()).unwrap(), source);
    }

    #[test]
    fn prop_with_equals_sequential_application(
        source in proptest::collection::vec(-100i32..100, 0..64),
        threshold in -100i32..100,
        keep in 0usize..70,
    ) {
        let first = Query::<i32>::new(move |q| q.filter(move |x| *x >= threshold));
        let composed = first
            .with(move |q| descending_prefix(q, keep))
            .against(source.clone())
            .unwrap();
        let sequential: Vec<i32> =
            descending_prefix(Queryable::new(first.against(source).unwrap()), keep).collect();

        prop_assert_eq!(composed, sequential);
    }

    #[test]
    fn prop_composition_leaves_base_untouched(source in proptest::collection::vec(any::<u8>(), 0..32)) {
        let base = Query::<u8>::new(|q| q.filter(|x| x % 2 == 0));
        let before = base.against(source.clone()).unwrap();

        let _extended = base.with(|q| q.reverse());

        prop_assert_eq!(base.against(source).unwrap(), before);
    }
}
