//! Book stores. The store is the source of truth; nothing here knows about caching.
pub mod memory;
#[cfg(feature = "db")]
pub mod entity;
#[cfg(feature = "db")]
pub mod migrations;
#[cfg(feature = "db")]
pub mod sea;

pub use memory::MemoryStore;
#[cfg(feature = "db")]
pub use sea::SeaOrmStore;
