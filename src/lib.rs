//! # books-cache
//!
//! Two-tier read cache for a books catalogue: Redis in front, an in-process cache behind it, and a document store as
//! the source of truth.
//!
//! # The Basics
//!
//! The crate is built for a read-heavy service with a single rule about consistency: once a write has changed
//! something a cached key depends on, that key is gone before anyone can see the write. There are three kinds of keys:
//!
//! | Key | Holds | Lifetime | Dropped on |
//! | --- | ----- | -------- | ---------- |
//! | `books:<userId>` | the user's books, newest first | 5 min | create/update/delete of any of the user's books |
//! | `books:public` | every book, newest first | 5 min | create/update/delete of any book |
//! | `book:<bookId>` | a single book | 10 min | update/delete of that book |
//!
//! A warmup run at startup fills the listing keys for an hour.
//!
//! # Tiers
//!
//! - [`RedisCache`](primary::RedisCache) is the primary tier. It is opt-in, never fails an operation, and tracks its
//!   connection in an explicit `Disconnected -> Connecting -> Ready` state machine anyone can
//!   [`subscribe`](primary::RedisCache::subscribe) to.
//! - [`LocalCache`](local::LocalCache) is the fallback. It lives in the process, is always available and expires every
//!   entry on its own deadline. Being local, it can't be seen by sibling processes.
//! - [`Cache`] routes every call: to the primary when it is ready, otherwise to the fallback. If the primary fails
//!   mid-call, the call is completed on the fallback. Invalidations go to both tiers, and those the primary missed are
//!   replayed once it is back.
//!
//! Nothing in the cache path ever returns an error. The facade answers with an [`Outcome`](types::Outcome) that tells
//! which tier did the work and carries the reason if the primary had to be bypassed.
//!
//! # Putting It Together
//!
//! ```ignore
//! let config = CacheConfig::from_env()?;
//! let (primary, cache) = config.connect_cache().await?;
//! let store: Arc<dyn BookStore> = Arc::new(MemoryStore::new());
//!
//! CacheWarmer::builder().store(store.clone()).cache(cache.clone()).build()?.warm_up().await;
//!
//! let books = BookService::builder().store(store).cache(cache).build()?;
//! let listing = books.list_books(None).await?;
//! ```
//!
//! # Features
//!
//! - `db` enables [`SeaOrmStore`](store::SeaOrmStore); `sqlite` and `pg` pick the database driver.
//! - `cli` builds the `books-cache` maintenance tool.
//! - `test-support` exposes the [`testing`] doubles to integration tests.
//! - `redis-tests` enables tests that need a live Redis at `BOOKS_CACHE_REDIS_URL`.

#[cfg(feature = "cli")]
pub mod app;
pub mod book;
pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod local;
pub mod pattern;
pub mod primary;
pub mod service;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod types;
pub mod warmup;

#[doc(inline)]
pub use cache::Cache;
#[doc(inline)]
pub use service::BookService;
#[doc(inline)]
pub use traits::BookStore;
#[doc(inline)]
pub use traits::CacheBackend;

pub mod prelude {
    pub use crate::book::*;
    pub use crate::cache::Cache;
    pub use crate::config::CacheConfig;
    pub use crate::error::*;
    pub use crate::keys;
    pub use crate::local::LocalCache;
    pub use crate::primary::RedisCache;
    pub use crate::primary::RedisSettings;
    pub use crate::service::BookService;
    pub use crate::service::Fetched;
    pub use crate::store::MemoryStore;
    #[cfg(feature = "db")]
    pub use crate::store::SeaOrmStore;
    pub use crate::traits::BookStore;
    pub use crate::traits::CacheBackend;
    pub use crate::types::*;
    pub use crate::warmup::CacheWarmer;
    pub use crate::warmup::WarmupReport;
}
