//! Test doubles for the cache tiers and the book store.
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::book::Book;
use crate::book::BookChanges;
use crate::book::BookFilter;
use crate::book::BookId;
use crate::book::NewBook;
use crate::book::UserId;
use crate::error::CacheError;
use crate::error::CacheResult;
use crate::error::StoreError;
use crate::local::LocalCache;
use crate::pattern::KeyPattern;
use crate::traits::BookStore;
use crate::traits::CacheBackend;
use crate::types::KeyTtl;

/// A stand-in for the remote tier whose availability is under test control.
///
/// Data lives in a private [`LocalCache`], so what the "remote" holds survives it going down and coming back, just like
/// a real server would keep its keys across a network partition.
#[derive(Debug)]
pub struct FlakyBackend {
    data:      LocalCache,
    connected: AtomicBool,
    failing:   AtomicBool,
    commands:  AtomicUsize,
}

impl Default for FlakyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FlakyBackend {
    /// Starts connected and healthy.
    pub fn new() -> Self {
        Self {
            data:      LocalCache::new(),
            connected: AtomicBool::new(true),
            failing:   AtomicBool::new(false),
            commands:  AtomicUsize::new(0),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Keep reporting a healthy connection but fail every command at the transport level, as a server that dies
    /// between health checks would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of commands that reached the backend, failed ones included.
    pub fn commands(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }

    /// Peek at the stored data, bypassing connection state.
    pub async fn peek<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.data.get(key).await
    }

    pub fn data(&self) -> &LocalCache {
        &self.data
    }

    fn check(&self, op: &'static str) -> CacheResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(CacheError::NotConnected);
        }
        self.commands.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Timeout {
                op,
                timeout: Duration::ZERO,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn try_get(&self, key: &str) -> CacheResult<Option<Value>> {
        self.check("GET")?;
        self.data.try_get(key).await
    }

    async fn try_set(&self, key: &str, value: Value, ttl: Duration) -> CacheResult<()> {
        self.check("SET")?;
        self.data.try_set(key, value, ttl).await
    }

    async fn try_delete(&self, key: &str) -> CacheResult<()> {
        self.check("DEL")?;
        self.data.try_delete(key).await
    }

    async fn try_delete_pattern(&self, pattern: &KeyPattern) -> CacheResult<usize> {
        self.check("SCAN")?;
        self.data.try_delete_pattern(pattern).await
    }

    async fn try_flush(&self) -> CacheResult<()> {
        self.check("FLUSHDB")?;
        self.data.try_flush().await
    }

    async fn try_ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        self.check("PTTL")?;
        self.data.try_ttl(key).await
    }
}

/// A store that is always down.
#[derive(Debug, Default)]
pub struct FailingStore;

impl FailingStore {
    fn error() -> StoreError {
        StoreError::Unavailable("connection refused".to_string())
    }
}

#[async_trait]
impl BookStore for FailingStore {
    async fn find(&self, _filter: &BookFilter) -> Result<Vec<Book>, StoreError> {
        Err(Self::error())
    }

    async fn find_by_id(&self, _id: &BookId) -> Result<Option<Book>, StoreError> {
        Err(Self::error())
    }

    async fn create(&self, _owner: &UserId, _fields: NewBook) -> Result<Book, StoreError> {
        Err(Self::error())
    }

    async fn find_by_id_and_update(&self, _id: &BookId, _changes: BookChanges) -> Result<Option<Book>, StoreError> {
        Err(Self::error())
    }

    async fn find_by_id_and_delete(&self, _id: &BookId) -> Result<Option<Book>, StoreError> {
        Err(Self::error())
    }
}

/// A book with a fixed creation time, `secs` seconds after the epoch.
pub fn book(id: &str, owner: &str, secs: i64) -> Book {
    use chrono::TimeZone;

    Book {
        id:          id.into(),
        name:        format!("Book {id}"),
        description: format!("About {id}"),
        image:       format!("https://img.example/{id}.png"),
        owner:       owner.into(),
        created_at:  chrono::Utc
            .timestamp_opt(secs, 0)
            .single()
            .unwrap_or_else(chrono::Utc::now),
    }
}
