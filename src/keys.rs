//! Key scopes and their lifetimes.
//!
//! | Key | Holds | Dropped on |
//! | --- | ----- | ---------- |
//! | `books:<userId>` | books owned by the user, newest first | create/update/delete of any of the user's books |
//! | `books:public` | every book, newest first | create/update/delete of any book |
//! | `book:<bookId>` | a single book | update/delete of that book |
use std::time::Duration;

use crate::book::BookId;
use crate::book::UserId;

/// Scope of the anonymous listing. No user may go by this id.
pub const PUBLIC_SCOPE: &str = "public";
pub const PUBLIC_BOOKS: &str = "books:public";

pub const LIST_TTL: Duration = Duration::from_secs(300);
pub const BOOK_TTL: Duration = Duration::from_secs(600);
pub const WARMUP_TTL: Duration = Duration::from_secs(3600);

/// The user's own listing. `None` for a reserved id, whose key would alias a shared list.
pub fn books_of(user: &UserId) -> Option<String> {
    (!user.is_reserved()).then(|| format!("books:{user}"))
}

pub fn book(id: &BookId) -> String {
    format!("book:{id}")
}

/// Keys whose content depends on the given book.
pub fn affected_by(book_id: Option<&BookId>, owner: &UserId) -> Vec<String> {
    let mut keys = Vec::with_capacity(3);
    if let Some(id) = book_id {
        keys.push(book(id));
    }
    keys.extend(books_of(owner));
    keys.push(PUBLIC_BOOKS.to_string());
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_user_listing_aliases_the_public_one() {
        assert_eq!(books_of(&"u1".into()).as_deref(), Some("books:u1"));
        assert_eq!(books_of(&PUBLIC_SCOPE.into()), None);
        assert_eq!(affected_by(None, &PUBLIC_SCOPE.into()), vec![PUBLIC_BOOKS.to_string()]);
        assert_eq!(
            affected_by(Some(&"b1".into()), &"u1".into()),
            vec!["book:b1".to_string(), "books:u1".to_string(), PUBLIC_BOOKS.to_string()]
        );
    }
}
