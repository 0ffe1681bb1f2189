//! End-to-end behaviour of the store, the dependency layer and the cacher
//! working together.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tagcache::{Arbiter, CacheError, Cacher, MemoryStore, StoreConfig, Value};

const HOUR: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Article {
    id: u64,
    title: String,
    tags: Vec<String>,
}

fn article() -> Article {
    Article {
        id: 7,
        title: "Sharded caches".to_string(),
        tags: vec!["rust".to_string(), "cache".to_string()],
    }
}

fn byte_store() -> MemoryStore<Bytes> {
    MemoryStore::new(StoreConfig::default()).expect("store should start")
}

#[test]
fn concurrent_fetches_build_once() {
    const CALLERS: usize = 8;

    let cacher = Arc::new(Cacher::with_arbiter(byte_store(), Arc::new(Arbiter::new())));
    let builds = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let cacher = Arc::clone(&cacher);
            let builds = Arc::clone(&builds);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let deps = HashMap::from([("article", "7")]);
                barrier.wait();
                cacher
                    .fetch_data(
                        "article",
                        &deps,
                        || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok::<_, CacheError>(article())
                        },
                        HOUR,
                    )
                    .expect("fetch should succeed")
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().expect("caller panicked"), article());
    }
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn dependency_order_does_not_change_the_entry() {
    let cacher = Cacher::with_arbiter(byte_store(), Arc::new(Arbiter::new()));
    let builds = AtomicUsize::new(0);
    let build = || {
        builds.fetch_add(1, Ordering::SeqCst);
        Ok::<_, CacheError>(article())
    };

    let mut forward = HashMap::new();
    forward.insert("user", "42");
    forward.insert("lang", "en");
    forward.insert("page", "3");
    let mut backward = HashMap::new();
    backward.insert("page", "3");
    backward.insert("lang", "en");
    backward.insert("user", "42");

    cacher.fetch_data("feed", &forward, build, HOUR).expect("fetch");
    cacher.fetch_data("feed", &backward, build, HOUR).expect("fetch");

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(
        tagcache::cacher::cache_key("feed", &forward),
        tagcache::cacher::cache_key("feed", &backward)
    );
}

#[test]
fn invalidating_a_tag_removes_every_dependent() {
    let cacher = Cacher::with_arbiter(byte_store(), Arc::new(Arbiter::new()));
    let by_user = HashMap::from([("user", "42")]);
    let by_user_and_post = HashMap::from([("user", "42"), ("post", "9")]);
    let unrelated = HashMap::from([("user", "43")]);

    for (class, deps) in [
        ("profile", &by_user),
        ("comment", &by_user_and_post),
        ("profile", &unrelated),
    ] {
        cacher
            .fetch_data(class, deps, || Ok::<_, CacheError>(article()), HOUR)
            .expect("fetch");
    }

    assert_eq!(cacher.invalidate("user", "42").expect("invalidate"), 2);

    let gone = [
        tagcache::cacher::cache_key("profile", &by_user),
        tagcache::cacher::cache_key("comment", &by_user_and_post),
    ];
    for key in &gone {
        let err = cacher.store().get(key).unwrap_err();
        assert!(err.is_not_found(), "{key} should be gone");
    }
    let kept = tagcache::cacher::cache_key("profile", &unrelated);
    assert!(cacher.store().exists(&kept));
}

#[test]
fn stale_tag_invalidation_does_not_touch_rebuilt_entries() {
    let cacher = Cacher::with_arbiter(byte_store(), Arc::new(Arbiter::new()));
    let deps = HashMap::from([("user", "42"), ("post", "9")]);

    cacher
        .fetch_data("comment", &deps, || Ok::<_, CacheError>(1_u32), HOUR)
        .expect("fetch");
    cacher.invalidate("user", "42").expect("invalidate");
    cacher
        .fetch_data("comment", &deps, || Ok::<_, CacheError>(2_u32), HOUR)
        .expect("fetch");

    // The rebuilt entry is asserted again, so either tag reaches it.
    assert_eq!(cacher.invalidate("post", "9").expect("invalidate"), 1);
    assert_eq!(cacher.invalidate("user", "42").expect("invalidate"), 0);
}

#[test]
fn pruning_evicts_least_recently_promoted() {
    let config = StoreConfig::default()
        .max_size(5)
        .items_to_prune(2)
        .gets_per_promote(1);
    let store: MemoryStore<Value> = MemoryStore::new(config).expect("store should start");

    for n in 0..5 {
        store.set(&format!("k{n}"), Value::Int(n), HOUR);
    }
    store.sync_updates();
    // k0 becomes the most recently promoted entry.
    store.get("k0").expect("k0 is live");
    store.sync_updates();

    store.set("k5", Value::Int(5), HOUR);
    store.sync_updates();

    assert!(store.exists("k0"));
    assert!(!store.exists("k1"));
    assert!(!store.exists("k2"));
    for key in ["k3", "k4", "k5"] {
        assert!(store.exists(key), "{key} should survive");
    }
    assert_eq!(store.dropped(), 2);
    assert_eq!(store.dropped(), 0);
    assert_eq!(store.size(), 4);
}

#[test]
fn byte_values_count_their_length() {
    let store = MemoryStore::new(StoreConfig::default().max_size(10).items_to_prune(1))
        .expect("store should start");

    store.set("small", Bytes::from_static(b"1234"), HOUR);
    store.set("large", Bytes::from_static(b"12345678"), HOUR);
    store.sync_updates();

    assert!(!store.exists("small"));
    assert!(store.exists("large"));
    assert_eq!(store.size(), 8);
}

#[test]
fn counters_work_through_the_tagged_value() {
    let store: MemoryStore<Value> =
        MemoryStore::new(StoreConfig::default()).expect("store should start");
    store.set("visitors", Value::Int(0), HOUR);
    store.set("title", Value::from("hello"), HOUR);

    store.increase("visitors").expect("increase");
    store.increase("visitors").expect("increase");
    store.decrease("visitors").expect("decrease");

    assert_eq!(store.get("visitors").expect("get"), Value::Int(1));
    let err = store.increase("title").unwrap_err();
    assert!(matches!(err, CacheError::TypeMismatch { .. }));
}

#[test]
fn expiry_is_lazy() {
    let store: MemoryStore<Value> =
        MemoryStore::new(StoreConfig::default()).expect("store should start");
    store.set("session", Value::from("token"), Duration::from_millis(10));
    thread::sleep(Duration::from_millis(30));

    assert!(store.get("session").unwrap_err().is_not_found());
    assert!(!store.exists("session"));
    assert_eq!(store.item_count(), 1);
}

#[test]
fn stopped_store_keeps_serving_buckets() {
    let store: MemoryStore<Value> =
        MemoryStore::new(StoreConfig::default()).expect("store should start");
    store.set("a", Value::Int(1), HOUR);
    store.stop();
    store.stop();

    store.set("b", Value::Int(2), HOUR);
    assert_eq!(store.get("a").expect("get"), Value::Int(1));
    assert_eq!(store.get("b").expect("get"), Value::Int(2));
    assert!(store.delete("a"));
    assert_eq!(store.size(), 0);
    store.clear();
    assert_eq!(store.item_count(), 0);
}

#[test]
fn shared_store_across_cachers() {
    let store = Arc::new(byte_store());
    let arbiter = Arc::new(Arbiter::new());
    let first = Cacher::with_arbiter(Arc::clone(&store), Arc::clone(&arbiter));
    let second = Cacher::with_arbiter(Arc::clone(&store), arbiter);
    let deps = HashMap::from([("site", "main")]);

    let built: String = first
        .fetch_data("banner", &deps, || Ok::<_, CacheError>("hi".to_string()), HOUR)
        .expect("fetch");
    let reused: String = second
        .fetch_data(
            "banner",
            &deps,
            || Ok::<_, CacheError>("rebuilt".to_string()),
            HOUR,
        )
        .expect("fetch");

    assert_eq!(built, reused);
    assert!(MemoryStore::exists(&store, &tagcache::cacher::cache_key("banner", &deps)));
}

#[test]
fn global_arbiter_serialises_a_key() {
    let inside = Arc::new(AtomicUsize::new(0));
    let overlap = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let inside = Arc::clone(&inside);
            let overlap = Arc::clone(&overlap);
            thread::spawn(move || {
                let arbiter = Arbiter::global();
                for _ in 0..20 {
                    let _guard = arbiter.guard("consistency:global");
                    if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlap.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked");
    }
    assert_eq!(overlap.load(Ordering::SeqCst), 0);
}
