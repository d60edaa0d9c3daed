use std::time::Duration;

use thiserror::Error;

use crate::book::BookId;
use crate::book::UserId;

/// Everything that can go wrong inside a cache tier. None of these ever escape the facade; they only travel as the
/// diagnostic part of an [`Outcome`](crate::types::Outcome).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("remote cache is not configured")]
    NotConfigured,

    #[error("remote cache is not connected")]
    NotConnected,

    #[error("remote cache operation '{op}' timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cannot (de)serialize cached value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("bad key pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source:  regex::Error,
    },

    #[error("time-to-live must be positive, got {0:?}")]
    InvalidTtl(Duration),
}

impl CacheError {
    /// Transport-level failures are the ones that make the facade retry an operation on the fallback tier.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured | Self::NotConnected | Self::Timeout { .. } | Self::Redis(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("book store is unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "db")]
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("book {0} not found")]
    NotFound(BookId),

    #[error("book {0} belongs to another user")]
    Forbidden(BookId),

    #[error("user id '{0}' is reserved")]
    ReservedUser(UserId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Parse(#[from] clap::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] garde::Report),

    #[error("cannot build {what}: {message}")]
    Build { what: &'static str, message: String },
}
