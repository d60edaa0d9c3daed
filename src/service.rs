use fieldx::fxstruct;
use std::sync::Arc;
use tracing::debug;
use tracing::instrument;

use crate::book::Book;
use crate::book::BookChanges;
use crate::book::BookFilter;
use crate::book::BookId;
use crate::book::NewBook;
use crate::book::UserId;
use crate::cache::Cache;
use crate::error::ServiceError;
use crate::keys;
use crate::traits::BookStore;

/// A read result and where it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Fetched<T> {
    pub value:      T,
    pub from_cache: bool,
}

impl<T> Fetched<T> {
    fn cached(value: T) -> Self {
        Self {
            value,
            from_cache: true,
        }
    }

    fn fresh(value: T) -> Self {
        Self {
            value,
            from_cache: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Book operations with read-through caching and invalidate-on-write.
///
/// Store errors are returned as they are. Cache trouble never is: in the worst case a read goes to the store.
#[fxstruct(sync, no_new, builder)]
pub struct BookService {
    #[fieldx(get(clone))]
    store: Arc<dyn BookStore>,
    #[fieldx(get(clone))]
    cache: Arc<Cache>,
}

impl BookService {
    /// The viewer's own books, or every book for an anonymous viewer. Newest first.
    #[instrument(level = "trace", skip(self))]
    pub async fn list_books(&self, viewer: Option<&UserId>) -> Result<Fetched<Vec<Book>>, ServiceError> {
        let key = match viewer {
            Some(user) => keys::books_of(user).ok_or_else(|| ServiceError::ReservedUser(user.clone()))?,
            None => keys::PUBLIC_BOOKS.to_string(),
        };
        if let Some(books) = self.cache.get::<Vec<Book>>(&key).await.into_value() {
            return Ok(Fetched::cached(books));
        }

        let filter = viewer.map_or(BookFilter::All, |u| BookFilter::Owner(u.clone()));
        let books = self.store.find(&filter).await?;
        self.cache.set(&key, &books, keys::LIST_TTL).await;
        Ok(Fetched::fresh(books))
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn get_book(&self, id: &BookId) -> Result<Fetched<Book>, ServiceError> {
        let key = keys::book(id);
        if let Some(book) = self.cache.get::<Book>(&key).await.into_value() {
            return Ok(Fetched::cached(book));
        }

        let book = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        self.cache.set(&key, &book, keys::BOOK_TTL).await;
        Ok(Fetched::fresh(book))
    }

    #[instrument(level = "trace", skip(self, fields))]
    pub async fn create_book(&self, owner: &UserId, fields: NewBook) -> Result<Book, ServiceError> {
        Self::not_reserved(owner)?;
        let book = self.store.create(owner, fields).await?;
        self.invalidate(None, owner).await;
        Ok(book)
    }

    #[instrument(level = "trace", skip(self, changes))]
    pub async fn update_book(&self, actor: &UserId, id: &BookId, changes: BookChanges) -> Result<Book, ServiceError> {
        self.owned_by(actor, id).await?;
        let book = self
            .store
            .find_by_id_and_update(id, changes)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        self.invalidate(Some(id), &book.owner).await;
        Ok(book)
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn delete_book(&self, actor: &UserId, id: &BookId) -> Result<Book, ServiceError> {
        self.owned_by(actor, id).await?;
        let book = self
            .store
            .find_by_id_and_delete(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        self.invalidate(Some(id), &book.owner).await;
        Ok(book)
    }

    fn not_reserved(user: &UserId) -> Result<(), ServiceError> {
        if user.is_reserved() {
            return Err(ServiceError::ReservedUser(user.clone()));
        }
        Ok(())
    }

    // Ownership is checked against the store, never against a cached copy.
    async fn owned_by(&self, actor: &UserId, id: &BookId) -> Result<Book, ServiceError> {
        Self::not_reserved(actor)?;
        let book = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
        if &book.owner != actor {
            return Err(ServiceError::Forbidden(id.clone()));
        }
        Ok(book)
    }

    async fn invalidate(&self, id: Option<&BookId>, owner: &UserId) {
        for key in keys::affected_by(id, owner) {
            let outcome = self.cache.delete(&key).await;
            debug!("Invalidated '{key}' on {}", outcome.tier());
        }
    }
}
