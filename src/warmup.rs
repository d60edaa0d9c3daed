use fieldx::fxstruct;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::book::Book;
use crate::book::BookFilter;
use crate::book::UserId;
use crate::cache::Cache;
use crate::keys;
use crate::traits::BookStore;

/// What a warmup run managed to do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WarmupReport {
    pub books:  usize,
    pub owners: usize,
    /// Keys that couldn't be written.
    pub failed: Vec<String>,
    /// The store couldn't be queried, nothing was written.
    pub aborted: bool,
}

impl WarmupReport {
    pub fn is_complete(&self) -> bool {
        !self.aborted && self.failed.is_empty()
    }
}

/// Pre-populates the listing keys before the service starts taking traffic.
#[fxstruct(sync, no_new, builder, default(off))]
pub struct CacheWarmer {
    store: Arc<dyn BookStore>,
    cache: Arc<Cache>,
    #[fieldx(get(copy), default(keys::WARMUP_TTL))]
    ttl:   Duration,
}

impl CacheWarmer {
    /// Load every book and cache the public listing and one listing per owner. Never fails; a partial or empty
    /// warmup only means the first requests go to the store.
    #[instrument(level = "trace", skip(self))]
    pub async fn warm_up(&self) -> WarmupReport {
        let mut report = WarmupReport::default();

        let books = match self.store.find(&BookFilter::All).await {
            Ok(books) => books,
            Err(err) => {
                warn!("Cache warmup skipped, cannot load books: {err}");
                report.aborted = true;
                return report;
            }
        };

        let mut by_owner: BTreeMap<UserId, Vec<Book>> = BTreeMap::new();
        for book in &books {
            by_owner.entry(book.owner.clone()).or_default().push(book.clone());
        }

        report.books = books.len();
        report.owners = by_owner.len();

        self.write(keys::PUBLIC_BOOKS.to_string(), &books, &mut report).await;
        for (owner, owned) in by_owner {
            match keys::books_of(&owner) {
                Some(key) => self.write(key, &owned, &mut report).await,
                None => warn!("{} book(s) owned by reserved user id '{owner}' are only listed publicly", owned.len()),
            }
        }

        info!(
            "Cache warmed up: {} books, {} owners, {} failed key(s)",
            report.books,
            report.owners,
            report.failed.len()
        );
        report
    }

    async fn write(&self, key: String, books: &[Book], report: &mut WarmupReport) {
        if !*self.cache.set(&key, books, self.ttl()).await.value() {
            warn!("Cache warmup couldn't write '{key}'");
            report.failed.push(key);
        }
    }
}
