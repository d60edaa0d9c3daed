use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::instrument;

use crate::book::sort_newest_first;
use crate::book::Book;
use crate::book::BookChanges;
use crate::book::BookFilter;
use crate::book::BookId;
use crate::book::NewBook;
use crate::book::UserId;
use crate::error::StoreError;
use crate::traits::BookStore;

/// In-process book store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    books: RwLock<HashMap<BookId, Book>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-filled with existing records, timestamps and ids kept as given.
    pub fn with_books(books: impl IntoIterator<Item = Book>) -> Self {
        Self {
            books: RwLock::new(books.into_iter().map(|b| (b.id.clone(), b)).collect()),
        }
    }

    pub async fn len(&self) -> usize {
        self.books.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.books.read().await.is_empty()
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    #[instrument(level = "trace", skip(self))]
    async fn find(&self, filter: &BookFilter) -> Result<Vec<Book>, StoreError> {
        let mut found = self
            .books
            .read()
            .await
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect::<Vec<_>>();
        sort_newest_first(&mut found);
        Ok(found)
    }

    #[instrument(level = "trace", skip(self))]
    async fn find_by_id(&self, id: &BookId) -> Result<Option<Book>, StoreError> {
        Ok(self.books.read().await.get(id).cloned())
    }

    #[instrument(level = "trace", skip(self, fields))]
    async fn create(&self, owner: &UserId, fields: NewBook) -> Result<Book, StoreError> {
        let book = Book {
            id:          BookId::generate(),
            name:        fields.name,
            description: fields.description,
            image:       fields.image,
            owner:       owner.clone(),
            created_at:  Utc::now(),
        };
        debug!("Creating book {} for {owner}", book.id);
        self.books.write().await.insert(book.id.clone(), book.clone());
        Ok(book)
    }

    #[instrument(level = "trace", skip(self, changes))]
    async fn find_by_id_and_update(&self, id: &BookId, changes: BookChanges) -> Result<Option<Book>, StoreError> {
        let mut books = self.books.write().await;
        Ok(books.get_mut(id).map(|book| {
            changes.apply_to(book);
            book.clone()
        }))
    }

    #[instrument(level = "trace", skip(self))]
    async fn find_by_id_and_delete(&self, id: &BookId) -> Result<Option<Book>, StoreError> {
        Ok(self.books.write().await.remove(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn book(id: &str, owner: &str, secs: i64) -> Book {
        Book {
            id:          id.into(),
            name:        format!("Book {id}"),
            description: String::new(),
            image:       String::new(),
            owner:       owner.into(),
            created_at:  Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn listings_are_newest_first() {
        let store = MemoryStore::with_books([book("a", "u1", 10), book("b", "u2", 30), book("c", "u1", 20)]);

        let all = store.find(&BookFilter::All).await.unwrap();
        assert_eq!(all.iter().map(|b| b.id.as_ref()).collect::<Vec<_>>(), ["b", "c", "a"]);

        let mine = store.find(&BookFilter::Owner("u1".into())).await.unwrap();
        assert_eq!(mine.iter().map(|b| b.id.as_ref()).collect::<Vec<_>>(), ["c", "a"]);
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_records() {
        let store = MemoryStore::with_books([book("a", "u1", 10)]);

        let changes = BookChanges {
            name: Some("Renamed".into()),
            ..Default::default()
        };
        let updated = store.find_by_id_and_update(&"a".into(), changes.clone()).await.unwrap();
        assert_eq!(updated.map(|b| b.name).as_deref(), Some("Renamed"));
        assert!(store.find_by_id_and_update(&"zz".into(), changes).await.unwrap().is_none());

        assert!(store.find_by_id_and_delete(&"a".into()).await.unwrap().is_some());
        assert!(store.find_by_id_and_delete(&"a".into()).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }
}
