//! The `KeyStore` trait

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::record::KeyRecord;

/// Boxed future alias for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence collaborator for key records.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn KeyStore>` shared between the authority and the service).
pub trait KeyStore: Send + Sync {
    /// Records eligible for selection at `now_millis`: active, and either no
    /// cooldown or an expired one.
    fn find_eligible(&self, now_millis: u64) -> BoxFuture<'_, Result<Vec<KeyRecord>>>;

    /// Look up a record by its secret value.
    fn find_by_secret<'a>(&'a self, secret: &'a str) -> BoxFuture<'a, Result<Option<KeyRecord>>>;

    /// Create and persist a record in the default state for `secret`,
    /// assigning a fresh id.
    fn create<'a>(&'a self, secret: &'a str) -> BoxFuture<'a, Result<KeyRecord>>;

    /// Upsert a record by id and persist it.
    fn save<'a>(&'a self, record: &'a KeyRecord) -> BoxFuture<'a, Result<()>>;

    /// All records regardless of state, for health summaries. Selection never
    /// uses this.
    fn find_all(&self) -> BoxFuture<'_, Result<Vec<KeyRecord>>>;
}
