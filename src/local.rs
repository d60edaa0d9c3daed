use async_trait::async_trait;
use fieldx::fxstruct;
use moka::future::Cache as MokaCache;
use moka::policy::EvictionPolicy;
use moka::Expiry;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;
use tracing::debug;
use tracing::warn;

use crate::error::CacheError;
use crate::error::CacheResult;
use crate::pattern::KeyPattern;
use crate::traits::CacheBackend;
use crate::types::KeyTtl;

#[derive(Clone, Debug)]
struct LocalEntry {
    value:      Arc<Value>,
    ttl:        Duration,
    expires_at: Instant,
}

// Every write carries its own deadline. Moka recomputes expiration on update, so a value installed by a later `set`
// never inherits, nor gets removed by, the deadline of the value it replaced.
struct PerEntryTtl;

impl Expiry<String, LocalEntry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &LocalEntry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &LocalEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Process-local fallback tier.
///
/// Has no external dependencies and is therefore always available. Being process-local, whatever is written here is
/// invisible to sibling instances of the service.
#[fxstruct(sync, builder, get(copy))]
pub struct LocalCache {
    /// Cache name. Most useful for debugging and logging.
    #[fieldx(default("local"))]
    name: &'static str,

    #[fieldx(default(100_000))]
    max_capacity: u64,

    #[fieldx(lazy, private, get(clone), builder(off))]
    entries: Arc<MokaCache<String, LocalEntry>>,
}

impl LocalCache {
    fn build_entries(&self) -> Arc<MokaCache<String, LocalEntry>> {
        Arc::new(
            MokaCache::builder()
                .name(self.name())
                .max_capacity(self.max_capacity())
                .eviction_policy(EvictionPolicy::tiny_lfu())
                .expire_after(PerEntryTtl)
                .build(),
        )
    }

    /// Store a value. Returns `false` if the value can't be encoded or the TTL is zero; no entry is left behind for the
    /// key in that case.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> bool
    where
        T: Serialize + ?Sized,
    {
        let outcome = match serde_json::to_value(value) {
            Ok(v) => self.try_set(key, v, ttl).await,
            Err(err) => Err(err.into()),
        };

        if let Err(err) = outcome {
            warn!("[{}] set({key}) failed: {err}", self.name());
            self.entries().invalidate(key).await;
            return false;
        }
        true
    }

    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let entry = self.entries().get(key).await?;
        match T::deserialize(entry.value.as_ref()) {
            Ok(v) => Some(v),
            Err(err) => {
                warn!("[{}] get({key}): cached value doesn't decode: {err}", self.name());
                None
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.try_delete(key).await.is_ok()
    }

    pub async fn delete_pattern(&self, pattern: &str) -> bool {
        match KeyPattern::new(pattern) {
            Ok(pattern) => self.try_delete_pattern(&pattern).await.is_ok(),
            Err(err) => {
                warn!("[{}] {err}", self.name());
                false
            }
        }
    }

    pub async fn flush(&self) -> bool {
        self.try_flush().await.is_ok()
    }

    pub async fn ttl(&self, key: &str) -> KeyTtl {
        self.try_ttl(key).await.unwrap_or(KeyTtl::Unknown)
    }

    /// Number of live entries. Entries past their deadline are not counted even if moka hasn't evicted them yet.
    pub async fn size(&self) -> u64 {
        let now = Instant::now();
        self.entries().iter().filter(|(_, e)| e.expires_at > now).count() as u64
    }

    #[inline(always)]
    pub fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl CacheBackend for LocalCache {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_connected(&self) -> bool {
        self.is_available()
    }

    async fn try_get(&self, key: &str) -> CacheResult<Option<Value>> {
        debug!("[{}] GET({key})", self.name());
        Ok(self.entries().get(key).await.map(|e| Value::clone(&e.value)))
    }

    async fn try_set(&self, key: &str, value: Value, ttl: Duration) -> CacheResult<()> {
        debug!("[{}] SET({key}, {ttl:?})", self.name());
        if ttl.is_zero() {
            self.entries().invalidate(key).await;
            return Err(CacheError::InvalidTtl(ttl));
        }
        let entry = LocalEntry {
            value: Arc::new(value),
            ttl,
            expires_at: Instant::now() + ttl,
        };
        self.entries().insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn try_delete(&self, key: &str) -> CacheResult<()> {
        debug!("[{}] DEL({key})", self.name());
        self.entries().invalidate(key).await;
        Ok(())
    }

    async fn try_delete_pattern(&self, pattern: &KeyPattern) -> CacheResult<usize> {
        let entries = self.entries();
        let matching = entries
            .iter()
            .filter(|(k, _)| pattern.matches(k))
            .map(|(k, _)| k)
            .collect::<Vec<_>>();

        for key in &matching {
            entries.invalidate(key.as_str()).await;
        }

        debug!("[{}] DEL_PATTERN({}) removed {}", self.name(), pattern.as_str(), matching.len());
        Ok(matching.len())
    }

    async fn try_flush(&self) -> CacheResult<()> {
        debug!("[{}] FLUSH", self.name());
        let entries = self.entries();
        entries.invalidate_all();
        entries.run_pending_tasks().await;
        Ok(())
    }

    async fn try_ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        Ok(match self.entries().get(key).await {
            Some(entry) => {
                let remaining = entry.expires_at.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    KeyTtl::Absent
                }
                else {
                    KeyTtl::Remaining(remaining)
                }
            }
            None => KeyTtl::Absent,
        })
    }
}

impl Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("name", &self.name())
            .field("max_capacity", &self.max_capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_ttl_leaves_nothing_behind() {
        let cache = LocalCache::new();
        assert!(cache.set("k", &1, Duration::from_secs(5)).await);
        assert!(!cache.set("k", &2, Duration::ZERO).await);
        assert_eq!(cache.get::<i32>("k").await, None);
    }

    #[tokio::test]
    async fn type_mismatch_is_a_miss() {
        let cache = LocalCache::new();
        assert!(cache.set("k", &"text", Duration::from_secs(5)).await);
        assert_eq!(cache.get::<u64>("k").await, None);
        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("text"));
    }

    #[tokio::test]
    async fn ttl_counts_down() {
        let cache = LocalCache::new();
        assert!(cache.set("k", &1, Duration::from_secs(60)).await);
        let ttl = cache.ttl("k").await;
        assert!(matches!(ttl, KeyTtl::Remaining(d) if d <= Duration::from_secs(60) && d > Duration::from_secs(58)));
        assert_eq!(cache.ttl("missing").await, KeyTtl::Absent);
    }

    #[tokio::test]
    async fn size_counts_live_entries_only() {
        let cache = LocalCache::new();
        assert!(cache.set("short", &1, Duration::from_millis(100)).await);
        assert!(cache.set("long", &1, Duration::from_secs(60)).await);
        assert_eq!(cache.size().await, 2);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cache.size().await, 1);
    }
}
