// ==============================================
// LOADING CACHE READ CONTRACT (integration)
// ==============================================
//
// Every read test runs against each starting population and under both a
// no-op and a panicking removal listener.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use loadkit::prelude::*;

const FIRST: i64 = 0;
const LAST: i64 = 9;

#[derive(Debug, Clone, Copy)]
enum Population {
    Empty,
    Singleton,
    Partial,
    Full,
}

impl Population {
    const ALL: [Population; 4] = [
        Population::Empty,
        Population::Singleton,
        Population::Partial,
        Population::Full,
    ];

    fn keys(self) -> Vec<i64> {
        match self {
            Population::Empty => Vec::new(),
            Population::Singleton => vec![FIRST],
            Population::Partial => (FIRST..=LAST).step_by(2).collect(),
            Population::Full => (FIRST..=LAST).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Listener {
    Noop,
    Rejecting,
}

const LISTENERS: [Listener; 2] = [Listener::Noop, Listener::Rejecting];

struct Fixture {
    cache: LoadingCache<i64, i64>,
    loads: Arc<AtomicUsize>,
    present: Vec<i64>,
}

/// Builds a `load(k) = -k` cache pre-populated with `population`, with its
/// stats reset to zero.
fn fixture(population: Population, listener: Listener) -> Fixture {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = loads.clone();
    let builder = CacheBuilder::new(1_000);
    let builder = match listener {
        Listener::Noop => builder.removal_listener(NoopListener),
        Listener::Rejecting => builder.removal_listener(RejectingListener),
    };
    let cache = builder
        .stats_counter(Arc::new(ConcurrentStatsCounter::new()))
        .build(loader_fn(move |k: &i64| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(-k)
        }));

    let present = population.keys();
    for key in &present {
        cache.put(*key, -key).unwrap();
    }
    assert_eq!(cache.stats(), CacheStats::default());
    Fixture {
        cache,
        loads,
        present,
    }
}

fn each_case(mut test: impl FnMut(Population, Listener, Fixture)) {
    for population in Population::ALL {
        for listener in LISTENERS {
            test(population, listener, fixture(population, listener));
        }
    }
}

// ----------------------------------------------
// get
// ----------------------------------------------

#[test]
fn get_null_is_rejected_without_stats() {
    each_case(|_, _, f| {
        assert!(matches!(
            f.cache.get_checked(None),
            Err(CacheError::InvalidArgument(_))
        ));
        assert_eq!(f.cache.stats(), CacheStats::default());
        assert_eq!(f.loads.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn get_absent_loads_once() {
    each_case(|population, listener, f| {
        let key = LAST + 1;
        assert_eq!(f.cache.get(&key).unwrap().as_deref(), Some(&-key));
        assert_eq!(f.cache.get(&key).unwrap().as_deref(), Some(&-key));

        let stats = f.cache.stats();
        assert_eq!(stats.miss_count, 1, "{population:?}/{listener:?}");
        assert_eq!(stats.hit_count, 1, "{population:?}/{listener:?}");
        assert_eq!(stats.load_success_count, 1);
        assert_eq!(f.loads.load(Ordering::SeqCst), 1);
    });
}

#[test]
fn get_present_is_a_hit() {
    each_case(|_, _, f| {
        for key in &f.present {
            assert_eq!(f.cache.get(key).unwrap().as_deref(), Some(&-key));
        }
        let stats = f.cache.stats();
        assert_eq!(stats.hit_count, f.present.len() as u64);
        assert_eq!(stats.miss_count, 0);
        assert_eq!(f.loads.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn negating_loader_example() {
    for listener in LISTENERS {
        let f = fixture(Population::Empty, listener);
        assert_eq!(f.cache.get(&5).unwrap().as_deref(), Some(&-5));
        let first = f.cache.stats();
        assert_eq!((first.hit_count, first.miss_count), (0, 1));

        assert_eq!(f.cache.get(&5).unwrap().as_deref(), Some(&-5));
        let second = f.cache.stats();
        assert_eq!((second.hit_count, second.miss_count), (1, 1));
    }
}

// ----------------------------------------------
// get_all
// ----------------------------------------------

#[test]
fn get_all_null_sequence_is_rejected() {
    each_case(|_, _, f| {
        let keys: Option<Vec<Option<i64>>> = None;
        assert!(matches!(
            f.cache.get_all_checked(keys),
            Err(CacheError::InvalidArgument(_))
        ));
        assert_eq!(f.cache.stats(), CacheStats::default());
    });
}

#[test]
fn get_all_null_element_is_rejected() {
    each_case(|_, _, f| {
        let keys = vec![Some(FIRST), None, Some(LAST + 1)];
        assert!(matches!(
            f.cache.get_all_checked(Some(keys)),
            Err(CacheError::InvalidArgument(_))
        ));
        assert_eq!(f.cache.stats(), CacheStats::default());
        assert_eq!(f.loads.load(Ordering::SeqCst), 0);
        assert_eq!(f.cache.estimated_size(), f.present.len());
    });
}

#[test]
fn get_all_empty_returns_empty_result() {
    each_case(|_, _, f| {
        let mut result = f.cache.get_all(Vec::new()).unwrap();
        assert!(result.is_empty());
        assert!(matches!(
            result.try_insert(1, 1),
            Err(CacheError::ImmutableResult)
        ));
        assert_eq!(f.cache.stats(), CacheStats::default());
        assert_eq!(f.loads.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn get_all_present_matches_store() {
    each_case(|_, _, f| {
        let result = f.cache.get_all(f.present.clone()).unwrap();
        let expected: HashMap<i64, i64> = f.present.iter().map(|k| (*k, -k)).collect();
        assert!(result.matches(&expected));

        let stats = f.cache.stats();
        assert_eq!(stats.hit_count, f.present.len() as u64);
        assert_eq!(stats.miss_count, 0);
        assert_eq!(f.loads.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn get_all_absent_counts_misses() {
    each_case(|_, _, f| {
        let keys: Vec<i64> = (FIRST..=LAST + 5).collect();
        let absent = keys.len() - f.present.len();

        let result = f.cache.get_all(keys.clone()).unwrap();
        assert_eq!(result.len(), keys.len());
        for key in &keys {
            assert_eq!(**result.get(key).unwrap(), -key);
        }

        let stats = f.cache.stats();
        assert_eq!(stats.hit_count, f.present.len() as u64);
        assert_eq!(stats.miss_count, absent as u64);
        assert_eq!(f.loads.load(Ordering::SeqCst), absent);
        assert_eq!(f.cache.estimated_size(), keys.len());
    });
}

#[test]
fn get_all_result_is_immutable() {
    each_case(|_, _, f| {
        let mut result = f.cache.get_all([FIRST, LAST + 1]).unwrap();
        let before = f.cache.as_map();

        assert!(matches!(
            result.try_insert(LAST + 2, 0),
            Err(CacheError::ImmutableResult)
        ));
        assert!(matches!(
            result.try_remove(&FIRST),
            Err(CacheError::ImmutableResult)
        ));
        assert!(matches!(result.try_clear(), Err(CacheError::ImmutableResult)));

        assert_eq!(result.len(), 2);
        assert_eq!(f.cache.as_map(), before);
    });
}

#[test]
fn get_all_miss_is_counted_even_when_load_fails() {
    for listener in LISTENERS {
        let builder = CacheBuilder::new(100);
        let builder = match listener {
            Listener::Noop => builder.removal_listener(NoopListener),
            Listener::Rejecting => builder.removal_listener(RejectingListener),
        };
        let cache = builder.build(loader_fn(|k: &i64| {
            if *k == 3 {
                Err(LoadError::new("no value for 3"))
            } else {
                Ok(-k)
            }
        }));
        cache.put(1, -1).unwrap();

        let err = cache.get_all([1, 2, 3]).unwrap_err();
        assert_eq!(err.load_error().map(|e| e.message()), Some("no value for 3"));

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 2);
        assert_eq!(stats.load_success_count, 1);
        assert_eq!(stats.load_failure_count, 1);
        // the failed key stays absent, the successful one is kept
        assert!(cache.get_if_present(&2).is_some());
        assert!(cache.get_if_present(&3).is_none());
    }
}

// ----------------------------------------------
// bulk loaders
// ----------------------------------------------

fn bulk_cache(policy: MissingKeyPolicy) -> (LoadingCache<i64, i64>, Arc<AtomicUsize>) {
    let singles = Arc::new(AtomicUsize::new(0));
    let counter = singles.clone();
    let cache = CacheBuilder::new(100)
        .missing_key_policy(policy)
        .removal_listener(RejectingListener)
        .build(bulk_loader_fn(
            move |k: &i64| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some(-k))
            },
            // returns only the even keys
            |keys: &[i64]| Ok(keys.iter().filter(|k| *k % 2 == 0).map(|k| (*k, -k)).collect()),
        ));
    (cache, singles)
}

#[test]
fn partial_bulk_result_is_not_found_by_default() {
    let (cache, singles) = bulk_cache(MissingKeyPolicy::default());
    let result = cache.get_all([1, 2, 3, 4]).unwrap();

    let mut keys: Vec<i64> = result.keys().copied().collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![2, 4]);
    assert_eq!(singles.load(Ordering::SeqCst), 0);

    let stats = cache.stats();
    assert_eq!(stats.miss_count, 4);
    assert_eq!(stats.load_success_count, 1);
}

#[test]
fn partial_bulk_result_can_fall_back() {
    let (cache, singles) = bulk_cache(MissingKeyPolicy::LoadIndividually);
    let result = cache.get_all([1, 2, 3, 4]).unwrap();
    assert_eq!(result.len(), 4);
    assert_eq!(singles.load(Ordering::SeqCst), 2);
}

#[test]
fn partial_bulk_result_can_fail() {
    let (cache, _) = bulk_cache(MissingKeyPolicy::Fail);
    assert!(matches!(
        cache.get_all([1, 2]),
        Err(CacheError::Load(_))
    ));
    assert_eq!(cache.estimated_size(), 0);
    assert_eq!(cache.stats().load_failure_count, 1);
}

#[test]
fn bulk_load_skips_present_keys() {
    let requested = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen = requested.clone();
    let cache = CacheBuilder::new(100).build(bulk_loader_fn(
        |k: &i64| Ok(Some(-k)),
        move |keys: &[i64]| {
            seen.lock().extend_from_slice(keys);
            Ok(keys.iter().map(|k| (*k, -k)).collect::<HashMap<_, _>>())
        },
    ));
    cache.get(&2).unwrap();

    cache.get_all([1, 2, 3]).unwrap();
    let mut requested = requested.lock().clone();
    requested.sort_unstable();
    assert_eq!(requested, vec![1, 3]);
}
