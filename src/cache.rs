use fieldx::fxstruct;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use crate::error::CacheError;
use crate::local::LocalCache;
use crate::pattern::KeyPattern;
use crate::traits::CacheBackend;
use crate::types::KeyTtl;
use crate::types::Outcome;
use crate::types::Tier;

/// Past this many journaled invalidations the journal collapses into a single flush of the primary.
const MAX_JOURNAL: usize = 1024;

// An invalidation the primary tier hasn't seen yet.
#[derive(Clone, Debug)]
enum Invalidation {
    Key(String),
    Pattern(KeyPattern),
    Flush,
}

impl Invalidation {
    async fn apply(&self, backend: &dyn CacheBackend) -> Result<(), CacheError> {
        match self {
            Self::Key(key) => backend.try_delete(key).await,
            Self::Pattern(pattern) => backend.try_delete_pattern(pattern).await.map(|_| ()),
            Self::Flush => backend.try_flush().await,
        }
    }
}

/// The cache as the rest of the application sees it.
///
/// Routing is decided per call: if the primary tier reports itself connected the operation goes there, otherwise, or
/// if the primary fails at the transport level mid-call, the operation is performed on the in-process fallback. Reads
/// and writes touch exactly one tier. Invalidations always reach the fallback too, so a key is gone no matter which
/// tier held it; invalidations the primary missed are journaled and replayed before the primary serves anything
/// again.
///
/// No operation ever fails. Each returns an [`Outcome`] telling which tier served it and, if anything went wrong on
/// the way, why.
///
/// ```ignore
/// let primary = Arc::new(RedisCache::builder().settings(settings).build()?);
/// primary.connect().await;
/// let cache = Cache::builder().primary(primary).build()?;
///
/// if cache.get::<Vec<Book>>("books:public").await.into_value().is_none() {
///     let books = store.find(&BookFilter::All).await?;
///     cache.set("books:public", &books, keys::LIST_TTL).await;
/// }
/// ```
#[fxstruct(sync, no_new, builder, default(off))]
pub struct Cache {
    #[fieldx(get(clone))]
    primary: Arc<dyn CacheBackend>,

    #[fieldx(get(clone), default(Arc::new(LocalCache::new())))]
    fallback: Arc<LocalCache>,

    #[fieldx(private, builder(off), default(Mutex::new(Vec::new())))]
    journal: Mutex<Vec<Invalidation>>,
}

impl Cache {
    fn degraded(&self, op: &str, key: &str, err: CacheError) -> Arc<CacheError> {
        warn!(
            "{op}({key}) on {} failed, continuing with {}: {err}",
            self.primary.name(),
            self.fallback.name()
        );
        Arc::new(err)
    }

    // Returns true if the primary can be used for the next operation, i.e. it is connected and has caught up with
    // every invalidation it missed.
    async fn primary_ready(&self) -> bool {
        if !self.primary.is_connected() {
            return false;
        }

        let mut journal = self.journal.lock().await;
        if journal.is_empty() {
            return true;
        }

        debug!("Replaying {} missed invalidation(s) on {}", journal.len(), self.primary.name());
        let pending = std::mem::take(&mut *journal);
        for (idx, invalidation) in pending.iter().enumerate() {
            if let Err(err) = invalidation.apply(self.primary.as_ref()).await {
                if err.is_transport() {
                    warn!("Replaying invalidations on {} interrupted: {err}", self.primary.name());
                    journal.extend(pending[idx..].iter().cloned());
                    return false;
                }
                warn!("Dropping invalidation {invalidation:?}: {err}");
            }
        }
        true
    }

    async fn journal(&self, invalidation: Invalidation) {
        if !self.primary.is_configured() {
            return;
        }
        let mut journal = self.journal.lock().await;
        match invalidation {
            Invalidation::Flush => {
                journal.clear();
                journal.push(Invalidation::Flush);
            }
            _ if journal.len() >= MAX_JOURNAL => {
                journal.clear();
                journal.push(Invalidation::Flush);
            }
            // A pending flush covers everything after it.
            _ if matches!(journal.first(), Some(Invalidation::Flush)) => (),
            invalidation => journal.push(invalidation),
        }
    }

    // Apply an invalidation to the primary; on failure remember it for later. Returns the tier that got it and the
    // reason it didn't reach the primary, if any.
    async fn invalidate_primary(
        &self,
        op: &str,
        key: &str,
        invalidation: Invalidation,
    ) -> (Tier, Option<Arc<CacheError>>) {
        if self.primary_ready().await {
            match invalidation.apply(self.primary.as_ref()).await {
                Ok(()) => return (Tier::Primary, None),
                Err(err) => {
                    let transport = err.is_transport();
                    let diagnostic = self.degraded(op, key, err);
                    if transport {
                        self.journal(invalidation).await;
                        return (Tier::Fallback, Some(diagnostic));
                    }
                    return (Tier::Primary, Some(diagnostic));
                }
            }
        }

        self.journal(invalidation).await;
        (Tier::Fallback, None)
    }

    fn decode<T>(key: &str, raw: Option<Value>, tier: Tier) -> Outcome<Option<T>>
    where
        T: DeserializeOwned,
    {
        match raw.map(serde_json::from_value::<T>).transpose() {
            Ok(value) => Outcome::new(value, tier),
            Err(err) => {
                warn!("Cached value of '{key}' on {tier} doesn't decode, treating as a miss: {err}");
                Outcome::new(None, tier).with_diagnostic(Some(Arc::new(err.into())))
            }
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn get<T>(&self, key: &str) -> Outcome<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut diagnostic = None;

        if self.primary_ready().await {
            match self.primary.try_get(key).await {
                Ok(raw) => return Self::decode(key, raw, Tier::Primary),
                Err(err) if err.is_transport() => diagnostic = Some(self.degraded("get", key, err)),
                Err(err) => {
                    warn!("Cached value of '{key}' on {} unusable: {err}", self.primary.name());
                    return Outcome::new(None, Tier::Primary).with_diagnostic(Some(Arc::new(err)));
                }
            }
        }

        let raw = match self.fallback.try_get(key).await {
            Ok(raw) => raw,
            Err(err) => {
                diagnostic = Some(Arc::new(err));
                None
            }
        };
        Self::decode(key, raw, Tier::Fallback).with_diagnostic(diagnostic)
    }

    /// Store a value. The outcome is `false` if the value couldn't be stored anywhere.
    #[instrument(level = "trace", skip(self, value))]
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> Outcome<bool>
    where
        T: Serialize + ?Sized,
    {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(err) => {
                warn!("Cannot encode value for '{key}': {err}");
                return Outcome::new(false, Tier::Fallback).with_diagnostic(Some(Arc::new(err.into())));
            }
        };

        let mut diagnostic = None;

        if self.primary_ready().await {
            match self.primary.try_set(key, value.clone(), ttl).await {
                Ok(()) => return Outcome::new(true, Tier::Primary),
                Err(err) if err.is_transport() => diagnostic = Some(self.degraded("set", key, err)),
                Err(err) => {
                    warn!("set({key}) rejected by {}: {err}", self.primary.name());
                    return Outcome::new(false, Tier::Primary).with_diagnostic(Some(Arc::new(err)));
                }
            }
        }

        match self.fallback.try_set(key, value, ttl).await {
            Ok(()) => Outcome::new(true, Tier::Fallback).with_diagnostic(diagnostic),
            Err(err) => {
                warn!("set({key}) rejected by {}: {err}", self.fallback.name());
                Outcome::new(false, Tier::Fallback).with_diagnostic(Some(Arc::new(err)))
            }
        }
    }

    /// Drop a key from both tiers. Deleting an absent key is a success.
    #[instrument(level = "trace", skip(self))]
    pub async fn delete(&self, key: &str) -> Outcome<bool> {
        let (tier, diagnostic) = self
            .invalidate_primary("delete", key, Invalidation::Key(key.to_string()))
            .await;
        let done = self.fallback.try_delete(key).await.is_ok();
        Outcome::new(done, tier).with_diagnostic(diagnostic)
    }

    /// Drop every key matching the pattern from both tiers. `*` is the only wildcard.
    #[instrument(level = "trace", skip(self))]
    pub async fn delete_pattern(&self, pattern: &str) -> Outcome<bool> {
        let pattern = match KeyPattern::new(pattern) {
            Ok(p) => p,
            Err(err) => {
                warn!("{err}");
                return Outcome::new(false, Tier::Fallback).with_diagnostic(Some(Arc::new(err)));
            }
        };

        let (tier, diagnostic) = self
            .invalidate_primary("delete_pattern", pattern.as_str(), Invalidation::Pattern(pattern.clone()))
            .await;
        let done = self.fallback.try_delete_pattern(&pattern).await.is_ok();
        Outcome::new(done, tier).with_diagnostic(diagnostic)
    }

    /// Clear both tiers.
    #[instrument(level = "trace", skip(self))]
    pub async fn flush(&self) -> Outcome<bool> {
        let (tier, diagnostic) = self.invalidate_primary("flush", "*", Invalidation::Flush).await;
        let done = self.fallback.try_flush().await.is_ok();
        Outcome::new(done, tier).with_diagnostic(diagnostic)
    }

    /// Remaining lifetime of a key in the tier that would serve it.
    pub async fn ttl(&self, key: &str) -> Outcome<KeyTtl> {
        let mut diagnostic = None;

        if self.primary_ready().await {
            match self.primary.try_ttl(key).await {
                Ok(ttl) => return Outcome::new(ttl, Tier::Primary),
                Err(err) => diagnostic = Some(self.degraded("ttl", key, err)),
            }
        }

        let ttl = self.fallback.try_ttl(key).await.unwrap_or(KeyTtl::Unknown);
        Outcome::new(ttl, Tier::Fallback).with_diagnostic(diagnostic)
    }

    /// Always true in practice: the fallback never goes away. Useful for health reporting only.
    pub fn is_connected(&self) -> bool {
        self.primary.is_connected() || self.fallback.is_available()
    }

    pub fn primary_connected(&self) -> bool {
        self.primary.is_connected()
    }

    /// Number of live entries in the fallback tier.
    pub async fn size(&self) -> u64 {
        self.fallback.size().await
    }

    /// Number of invalidations waiting for the primary to come back.
    pub async fn pending_invalidations(&self) -> usize {
        self.journal.lock().await.len()
    }
}

impl Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("primary", &self.primary)
            .field("fallback", &self.fallback)
            .finish()
    }
}
