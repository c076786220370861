//! Key record storage for the key pool authority
//!
//! Defines the `KeyRecord` data model and the `KeyStore` trait the authority
//! selects from, plus two implementations: `FileStore` persists records as a
//! JSON file with atomic writes, `MemoryStore` keeps them in memory for tests
//! and embedders that don't need persistence.
//!
//! The store is a passive collaborator: it answers eligibility queries and
//! persists records, but all health state transitions are decided by the
//! authority.

pub mod error;
pub mod file;
pub mod memory;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::KeyRecord;
pub use store::{BoxFuture, KeyStore};
