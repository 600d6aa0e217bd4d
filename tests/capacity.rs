use std::panic::{catch_unwind, AssertUnwindSafe};

use mpx::{MultipleSpawner, SingleSpawner};

// The capacity is read from the environment once, so every check that
// depends on it lives in this one test.
#[test]
fn process_counts_are_validated_against_capacity() {
    std::env::set_var("MPX_UNIVERSE_SIZE", "10");

    // Within capacity: fine, individually and in sum.
    let mut multi = MultipleSpawner::new([("foo", 2), ("bar", 3)]);
    assert_eq!(multi.size(), 2);
    assert_eq!(multi.total_maxprocs(), 5);

    // A single count beyond capacity fails its sanity check.
    let panicked = catch_unwind(AssertUnwindSafe(|| {
        let _ = multi.set_maxprocs_at(0, 100);
    }));
    assert!(panicked.is_err());
    assert_eq!(multi.maxprocs()[0], 2);

    let panicked = catch_unwind(|| SingleSpawner::new("foo", 100));
    assert!(panicked.is_err());

    // Each count within bounds, but the sum exceeds capacity.
    let panicked = catch_unwind(|| MultipleSpawner::new([("a", 6), ("b", 5)]));
    assert!(panicked.is_err());

    // The bound is inclusive.
    let _ = SingleSpawner::new("foo", 10);
    let _ = MultipleSpawner::new([("a", 5), ("b", 5)]);
}
