//! # Invariant Testing for RebuildSet
//!
//! Randomized workloads that watch the rebuild machinery itself: content must survive every
//! rebuild, the tree must come out of a rebuild shallow, and the nominal height must grow
//! with the population. With `--features full_validation` the whole graph is also checked for
//! ordering and parent links along the way.

use rand::prelude::*;
use rand::rngs::StdRng;
use rebuildset::{RebuildSet, DEFAULT_MAX_HEIGHT};

const SEED: u64 = 42;

fn ceil_log2_plus_one(n: usize) -> u32 {
    (n + 1).next_power_of_two().trailing_zeros()
}

#[cfg(feature = "full_validation")]
fn validate(set: &mut RebuildSet<u64>) {
    set.fully_validate();
}

#[cfg(not(feature = "full_validation"))]
fn validate(_set: &mut RebuildSet<u64>) {}

// ===========================================================================
// Rebuild Boundaries
// ===========================================================================

/// Every rebuild leaves the traversal unchanged apart from the value that triggered it.
#[test]
fn rebuild_preserves_content() {
    let mut set: RebuildSet<u64> = RebuildSet::new();
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut observed_rebuilds = 0;

    for _ in 0..3000 {
        let v = rng.gen_range(0..10_000);
        let before = set.to_vec();
        let rebuilds = set.rebuilds();
        let added = set.insert(v);
        if set.rebuilds() != rebuilds {
            observed_rebuilds += 1;
            let mut expected = before;
            if let Err(pos) = expected.binary_search(&v) {
                expected.insert(pos, v);
            }
            assert_eq!(set.to_vec(), expected, "content changed across rebuild");
            assert!(added);
        }
    }
    validate(&mut set);
    assert!(observed_rebuilds > 0, "workload never rebuilt");
}

/// After any rebuild the deepest insertion seen is the rebuilt tree's height.
#[test]
fn rebuilt_height_is_logarithmic() {
    let mut set: RebuildSet<u64> = RebuildSet::new();
    let mut rebuilds = 0;
    for v in 0..20_000 {
        set.insert(v);
        if set.rebuilds() != rebuilds {
            rebuilds = set.rebuilds();
            let bound = ceil_log2_plus_one(set.len());
            assert!(
                set.height() <= bound,
                "height {} over bound {} with {} values",
                set.height(),
                bound,
                set.len()
            );
        }
    }
    validate(&mut set);
}

/// Ascending inserts force rebuilds over and over; the nominal height has to keep up with the
/// population so the threshold stays above the balanced height.
#[test]
fn max_height_tracks_population() {
    let mut set: RebuildSet<u64> = RebuildSet::new();
    assert_eq!(set.max_height(), DEFAULT_MAX_HEIGHT);
    let mut last = set.max_height();
    for v in 0..10_000 {
        set.insert(v);
        assert!(set.max_height() >= last);
        assert!(set.max_height() <= last + 1, "grew by more than one in a single insert");
        last = set.max_height();
    }
    assert!(set.max_height() > DEFAULT_MAX_HEIGHT);
    assert!(set.height() as f64 <= set.max_height() as f64 * 1.75);
    validate(&mut set);
}

/// Rebuilds grow rarer as the nominal height grows: on an ascending workload each rebuild is
/// followed by a longer quiet stretch than the rebuild with the same max height before it.
#[test]
fn rebuilds_become_rarer() {
    let mut set: RebuildSet<u64> = RebuildSet::new();
    for v in 0..2000 {
        set.insert(v);
    }
    let early = set.rebuilds();
    for v in 2000..4000 {
        set.insert(v);
    }
    let late = set.rebuilds() - early;
    assert!(late <= early, "{late} rebuilds in the second half vs {early} in the first");
}

// ===========================================================================
// Randomized Workloads
// ===========================================================================

#[test]
fn random_inserts_and_clears() {
    let mut set: RebuildSet<u64> = RebuildSet::new();
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut shadow = Vec::new();

    for round in 0..20 {
        let count = rng.gen_range(0..2000);
        for _ in 0..count {
            let v = rng.gen_range(0..5000);
            let added = set.insert(v);
            match shadow.binary_search(&v) {
                Ok(_) => assert!(!added),
                Err(pos) => {
                    assert!(added);
                    shadow.insert(pos, v);
                }
            }
        }
        validate(&mut set);
        assert_eq!(set.len(), shadow.len(), "round {round}");
        assert_eq!(set.to_vec(), shadow, "round {round}");
        for probe in (0..5000).step_by(37) {
            assert_eq!(set.contains(&probe), shadow.binary_search(&probe).is_ok());
        }
        if rng.gen_bool(0.3) {
            set.clear();
            shadow.clear();
            assert_eq!(set.height(), 0);
        }
    }
}

#[test]
fn shuffled_inserts_stay_consistent() {
    let mut values: Vec<u64> = (0..25_000).collect();
    values.shuffle(&mut StdRng::seed_from_u64(SEED));
    let mut set: RebuildSet<u64> = RebuildSet::new();
    for v in &values {
        assert!(set.insert(*v));
    }
    validate(&mut set);
    assert_eq!(set.len(), values.len());
    assert!(set.iter().copied().eq(0..25_000));
    assert_eq!(set.first(), Some(&0));
    assert_eq!(set.last(), Some(&24_999));
}
