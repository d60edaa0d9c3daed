#![cfg(feature = "redis-tests")]
//! Needs a Redis server at `BOOKS_CACHE_REDIS_URL`. Every test works under its own key prefix.

use books_cache::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn redis_url() -> String {
    std::env::var("BOOKS_CACHE_REDIS_URL").expect("BOOKS_CACHE_REDIS_URL must be set for Redis tests")
}

async fn connected() -> Arc<RedisCache> {
    let primary = RedisCache::builder()
        .settings(
            RedisSettings::builder()
                .url(redis_url())
                .health_check_interval(Duration::from_millis(200))
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    assert!(primary.connect().await, "cannot connect to {}", redis_url());
    assert_eq!(primary.state(), ConnectionState::Ready);
    Arc::new(primary)
}

#[tokio::test]
async fn primary_round_trip() {
    let primary = connected().await;

    assert!(primary.set("rt:book:1", &vec!["a", "b"], Duration::from_secs(30)).await);
    assert_eq!(primary.get::<Vec<String>>("rt:book:1").await, Some(vec!["a".into(), "b".into()]));
    assert_eq!(primary.get::<u32>("rt:book:1").await, None, "type mismatch is a miss");

    let ttl = primary.ttl("rt:book:1").await;
    assert!(matches!(ttl, KeyTtl::Remaining(d) if d <= Duration::from_secs(30)));
    assert_eq!(primary.ttl("rt:absent").await, KeyTtl::Absent);

    assert!(primary.delete("rt:book:1").await);
    assert!(primary.delete("rt:book:1").await);
    assert_eq!(primary.get::<Vec<String>>("rt:book:1").await, None);

    primary.close().await;
}

#[tokio::test]
async fn primary_expiry_and_reset() {
    let primary = connected().await;

    assert!(primary.set("exp:short", &1, Duration::from_millis(200)).await);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(primary.get::<i32>("exp:short").await, None);

    assert!(primary.set("exp:k", &"old", Duration::from_millis(300)).await);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(primary.set("exp:k", &"new", Duration::from_secs(5)).await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(primary.get::<String>("exp:k").await.as_deref(), Some("new"));

    primary.close().await;
}

#[tokio::test]
async fn primary_pattern_deletion() {
    let primary = connected().await;

    for i in 0..1200 {
        primary.set(&format!("pd:books:u{i}"), &i, Duration::from_secs(30)).await;
    }
    primary.set("pd:book:1", &1, Duration::from_secs(30)).await;
    primary.set("pd:books?[x]", &1, Duration::from_secs(30)).await;

    assert!(primary.delete_pattern("pd:books:*").await);
    assert_eq!(primary.get::<i32>("pd:books:u7").await, None);
    assert_eq!(primary.get::<i32>("pd:books:u1199").await, None);
    assert_eq!(primary.get::<i32>("pd:book:1").await, Some(1));
    assert_eq!(primary.get::<i32>("pd:books?[x]").await, Some(1), "glob metacharacters are literal");

    primary.close().await;
}

#[tokio::test]
async fn facade_over_redis() {
    let primary = connected().await;
    let cache = Cache::builder().primary(primary.clone()).build().unwrap();

    let outcome = cache.set("fc:books:public", &[1, 2, 3], keys::LIST_TTL).await;
    assert_eq!(outcome.tier(), Tier::Primary);
    assert_eq!(cache.get::<Vec<i32>>("fc:books:public").await.into_value(), Some(vec![1, 2, 3]));

    let mut states = primary.subscribe();
    primary.close().await;
    assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);

    let outcome = cache.get::<Vec<i32>>("fc:books:public").await;
    assert_eq!(outcome.tier(), Tier::Fallback);
    assert_eq!(outcome.into_value(), None);
}

#[tokio::test]
async fn reconnect_passes_through_connecting() {
    let primary = connected().await;
    let mut states = primary.subscribe();

    primary.close().await;
    assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);

    let reconnect = tokio::spawn({
        let primary = primary.clone();
        async move { primary.connect().await }
    });

    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), ConnectionState::Connecting);
    assert!(reconnect.await.unwrap());
    assert_eq!(primary.state(), ConnectionState::Ready);

    primary.close().await;
}
