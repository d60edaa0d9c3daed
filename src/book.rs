use std::fmt::Display;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

macro_rules! string_id {
    ($ty:ident) => {
        impl Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(BookId);
string_id!(UserId);

impl BookId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl UserId {
    /// Ids that can't belong to a user because their listing key is taken by a shared list.
    pub fn is_reserved(&self) -> bool {
        self.0 == crate::keys::PUBLIC_SCOPE
    }
}

/// The book summary as it is listed, cached and returned to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id:          BookId,
    pub name:        String,
    pub description: String,
    pub image:       String,
    pub owner:       UserId,
    pub created_at:  DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewBook {
    pub name:        String,
    pub description: String,
    pub image:       String,
}

/// Partial update. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BookChanges {
    pub name:        Option<String>,
    pub description: Option<String>,
    pub image:       Option<String>,
}

impl BookChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.image.is_none()
    }

    pub fn apply_to(self, book: &mut Book) {
        if let Some(name) = self.name {
            book.name = name;
        }
        if let Some(description) = self.description {
            book.description = description;
        }
        if let Some(image) = self.image {
            book.image = image;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookFilter {
    All,
    Owner(UserId),
}

impl BookFilter {
    pub fn matches(&self, book: &Book) -> bool {
        match self {
            Self::All => true,
            Self::Owner(owner) => &book.owner == owner,
        }
    }
}

/// Newest first, the order every listing is served in.
pub fn sort_newest_first(books: &mut [Book]) {
    books.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}
