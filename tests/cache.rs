use books_cache::prelude::*;
use books_cache::testing::FlakyBackend;
use serde_json::json;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<FlakyBackend>, Arc<LocalCache>, Cache) {
    let remote = Arc::new(FlakyBackend::new());
    let local = Arc::new(LocalCache::new());
    let cache = Cache::builder()
        .primary(remote.clone())
        .fallback(local.clone())
        .build()
        .expect("cache");
    (remote, local, cache)
}

const MINUTE: Duration = Duration::from_secs(60);

#[tokio::test]
async fn fallback_serves_while_primary_is_down() {
    let (remote, local, cache) = setup();
    remote.set_connected(false);

    let outcome = cache.set("k", &json!({"a": 1}), MINUTE).await;
    assert!(*outcome.value());
    assert_eq!(outcome.tier(), Tier::Fallback);
    assert!(!outcome.is_degraded());

    let outcome = cache.get::<Value>("k").await;
    assert_eq!(outcome.value(), &Some(json!({"a": 1})));
    assert_eq!(outcome.tier(), Tier::Fallback);

    assert_eq!(remote.commands(), 0, "nothing must reach a disconnected primary");
    assert_eq!(local.get::<Value>("k").await, Some(json!({"a": 1})));
    assert!(cache.is_connected());
    assert!(!cache.primary_connected());
}

#[tokio::test]
async fn primary_failing_mid_call_falls_through() {
    let (remote, local, cache) = setup();
    remote.set_failing(true);

    let outcome = cache.set("k", &"v", MINUTE).await;
    assert!(*outcome.value());
    assert_eq!(outcome.tier(), Tier::Fallback);
    assert!(matches!(outcome.diagnostic(), Some(CacheError::Timeout { .. })));
    assert_eq!(local.get::<String>("k").await.as_deref(), Some("v"));

    let outcome = cache.get::<String>("k").await;
    assert_eq!(outcome.value().as_deref(), Some("v"));
    assert!(outcome.is_degraded());
}

#[tokio::test]
async fn healthy_primary_serves_alone() {
    let (remote, local, cache) = setup();

    let outcome = cache.set("k", &5u32, MINUTE).await;
    assert_eq!(outcome.tier(), Tier::Primary);
    assert_eq!(remote.peek::<u32>("k").await, Some(5));
    assert_eq!(local.get::<u32>("k").await, None, "writes touch one tier only");

    let outcome = cache.get::<u32>("k").await;
    assert_eq!(outcome.value(), &Some(5));
    assert_eq!(outcome.tier(), Tier::Primary);
}

#[tokio::test]
async fn entries_expire() {
    let (remote, _local, cache) = setup();

    cache.set("primary", &1, Duration::from_millis(200)).await;
    remote.set_connected(false);
    cache.set("fallback", &1, Duration::from_millis(200)).await;
    cache.set("lasting", &1, MINUTE).await;
    assert_eq!(cache.size().await, 2);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(cache.size().await, 1, "expired fallback entries are not counted");

    assert_eq!(cache.get::<i32>("fallback").await.into_value(), None);
    remote.set_connected(true);
    assert_eq!(cache.get::<i32>("primary").await.into_value(), None);
}

#[tokio::test]
async fn pattern_deletion_on_both_tiers() {
    let (remote, local, cache) = setup();

    cache.set("books:u1", &[1], MINUTE).await;
    cache.set("book:1", &1, MINUTE).await;
    remote.set_connected(false);
    cache.set("books:u2", &[2], MINUTE).await;
    cache.set("books:public", &[1, 2], MINUTE).await;
    cache.set("book:2", &2, MINUTE).await;
    remote.set_connected(true);

    let outcome = cache.delete_pattern("books:*").await;
    assert!(*outcome.value());
    assert_eq!(outcome.tier(), Tier::Primary);

    assert_eq!(remote.peek::<Value>("books:u1").await, None);
    assert_eq!(local.get::<Value>("books:u2").await, None);
    assert_eq!(local.get::<Value>("books:public").await, None);
    assert_eq!(remote.peek::<i32>("book:1").await, Some(1));
    assert_eq!(local.get::<i32>("book:2").await, Some(2));
}

#[tokio::test]
async fn reset_replaces_the_deadline() {
    let (remote, _local, cache) = setup();

    for connected in [true, false] {
        remote.set_connected(connected);
        cache.set("k", &"old", Duration::from_millis(300)).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        cache.set("k", &"new", Duration::from_secs(5)).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(
            cache.get::<String>("k").await.into_value().as_deref(),
            Some("new"),
            "connected: {connected}"
        );
    }
}

#[tokio::test]
async fn deleting_twice_is_fine() {
    let (remote, _local, cache) = setup();

    for connected in [true, false] {
        remote.set_connected(connected);
        cache.set("k", &1, MINUTE).await;
        assert!(*cache.delete("k").await.value());
        assert!(*cache.delete("k").await.value());
        assert!(*cache.delete("never-there").await.value());
        assert_eq!(cache.get::<i32>("k").await.into_value(), None);
    }
}

#[tokio::test]
async fn missed_invalidations_are_replayed() {
    let (remote, _local, cache) = setup();

    cache.set("books:u1", &[1], MINUTE).await;
    cache.set("book:1", &1, MINUTE).await;
    cache.set("book:2", &2, MINUTE).await;

    remote.set_connected(false);
    cache.delete("book:1").await;
    cache.delete_pattern("books:*").await;
    assert_eq!(cache.pending_invalidations().await, 2);
    assert_eq!(remote.peek::<i32>("book:1").await, Some(1), "still stale on the remote");

    remote.set_connected(true);
    assert_eq!(cache.get::<i32>("book:1").await.into_value(), None);
    assert_eq!(cache.pending_invalidations().await, 0);
    assert_eq!(remote.peek::<Value>("books:u1").await, None);
    assert_eq!(cache.get::<i32>("book:2").await.into_value(), Some(2));
}

#[tokio::test]
async fn replay_survives_a_relapse() {
    let (remote, _local, cache) = setup();

    cache.set("book:1", &1, MINUTE).await;
    remote.set_connected(false);
    cache.delete("book:1").await;

    // Back, but every command fails: the journal must be kept.
    remote.set_connected(true);
    remote.set_failing(true);
    let outcome = cache.get::<i32>("book:1").await;
    assert_eq!(outcome.tier(), Tier::Fallback);
    assert_eq!(cache.pending_invalidations().await, 1);

    remote.set_failing(false);
    assert_eq!(cache.get::<i32>("book:1").await.into_value(), None);
    assert_eq!(cache.pending_invalidations().await, 0);
}

#[tokio::test]
async fn pending_flush_swallows_the_rest() {
    let (remote, _local, cache) = setup();

    cache.set("a", &1, MINUTE).await;
    remote.set_connected(false);
    cache.delete("x").await;
    cache.flush().await;
    cache.delete("y").await;
    cache.delete_pattern("z*").await;
    assert_eq!(cache.pending_invalidations().await, 1);

    remote.set_connected(true);
    assert_eq!(cache.get::<i32>("a").await.into_value(), None);
}

#[tokio::test]
async fn unconfigured_primary_keeps_no_journal() {
    let local = Arc::new(LocalCache::new());
    let cache = Cache::builder()
        .primary(Arc::new(RedisCache::disabled()))
        .fallback(local)
        .build()
        .expect("cache");

    assert!(*cache.set("k", &1, MINUTE).await.value());
    assert!(*cache.delete("k").await.value());
    assert_eq!(cache.pending_invalidations().await, 0);
    assert!(cache.is_connected());
}

#[tokio::test]
async fn ttl_reports_the_serving_tier() {
    let (remote, _local, cache) = setup();

    cache.set("k", &1, MINUTE).await;
    let ttl = cache.ttl("k").await;
    assert_eq!(ttl.tier(), Tier::Primary);
    assert!(matches!(ttl.value(), KeyTtl::Remaining(d) if *d <= MINUTE && *d > MINUTE - Duration::from_secs(2)));
    assert_eq!(ttl.value().as_secs(), 60);

    remote.set_connected(false);
    let ttl = cache.ttl("k").await;
    assert_eq!(ttl.tier(), Tier::Fallback);
    assert_eq!(*ttl.value(), KeyTtl::Absent);
    assert_eq!(ttl.value().as_secs(), -1);
}

#[tokio::test]
async fn unusable_payloads_are_misses() {
    let (remote, _local, cache) = setup();

    for connected in [true, false] {
        remote.set_connected(connected);
        cache.set("k", &"text", MINUTE).await;
        let outcome = cache.get::<u64>("k").await;
        assert_eq!(outcome.value(), &None);
        assert!(matches!(outcome.diagnostic(), Some(CacheError::Serialization(_))));

        let outcome = cache.set("k", &1, Duration::ZERO).await;
        assert!(!*outcome.value());
        assert!(matches!(outcome.diagnostic(), Some(CacheError::InvalidTtl(_))));
    }
}

#[tokio::test]
async fn flush_clears_both_tiers() {
    let (remote, local, cache) = setup();

    cache.set("a", &1, MINUTE).await;
    remote.set_connected(false);
    cache.set("b", &2, MINUTE).await;
    remote.set_connected(true);

    let outcome = cache.flush().await;
    assert_eq!(outcome.tier(), Tier::Primary);
    assert_eq!(remote.peek::<i32>("a").await, None);
    assert_eq!(local.get::<i32>("b").await, None);
    assert_eq!(cache.size().await, 0);
}
