use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;

use crate::book::Book;
use crate::book::BookChanges;
use crate::book::BookFilter;
use crate::book::BookId;
use crate::book::NewBook;
use crate::book::UserId;
use crate::error::CacheResult;
use crate::error::StoreError;
use crate::pattern::KeyPattern;
use crate::types::KeyTtl;

// A single cache tier as the facade sees it. Unlike the public, never-failing methods of the tier types, these report
// what went wrong so the facade can decide whether to fall through to the next tier.
#[async_trait]
pub trait CacheBackend: Debug + Send + Sync + 'static {
    /// Name for logging.
    fn name(&self) -> &'static str;

    /// Synchronous health check, consulted before every operation.
    fn is_connected(&self) -> bool;

    /// False for a tier that was never meant to connect. Invalidations it misses are not worth remembering.
    fn is_configured(&self) -> bool {
        true
    }

    async fn try_get(&self, key: &str) -> CacheResult<Option<Value>>;
    async fn try_set(&self, key: &str, value: Value, ttl: Duration) -> CacheResult<()>;
    async fn try_delete(&self, key: &str) -> CacheResult<()>;
    /// Returns the number of removed keys.
    async fn try_delete_pattern(&self, pattern: &KeyPattern) -> CacheResult<usize>;
    async fn try_flush(&self) -> CacheResult<()>;
    async fn try_ttl(&self, key: &str) -> CacheResult<KeyTtl>;
}

/// The document store holding books. This is the source of truth; the cache only ever holds projections of it.
#[async_trait]
pub trait BookStore: Send + Sync + 'static {
    /// Books matching the filter, newest first.
    async fn find(&self, filter: &BookFilter) -> Result<Vec<Book>, StoreError>;
    async fn find_by_id(&self, id: &BookId) -> Result<Option<Book>, StoreError>;
    async fn create(&self, owner: &UserId, fields: NewBook) -> Result<Book, StoreError>;
    /// Returns the updated record, `None` if there was nothing to update.
    async fn find_by_id_and_update(&self, id: &BookId, changes: BookChanges) -> Result<Option<Book>, StoreError>;
    /// Returns the deleted record, `None` if there was nothing to delete.
    async fn find_by_id_and_delete(&self, id: &BookId) -> Result<Option<Book>, StoreError>;
}
