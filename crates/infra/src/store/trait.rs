use std::sync::Arc;

use thiserror::Error;

use stockyard_core::ExpectedVersion;

/// Record store operation error.
///
/// These are infrastructure errors; business rule failures are `DomainError`s.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The persisted version did not match the writer's expectation.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("record store backend failure: {0}")]
    Backend(String),
}

/// Snapshot store with optimistic versioning.
///
/// Implementations must:
/// - compare `expected` against the currently persisted version and write in
///   one critical section (compare-and-swap)
/// - keep the version reported by the value itself (`AggregateRoot::version`)
pub trait RecordStore<K, V>: Send + Sync {
    /// Load the current snapshot, or `None` if nothing was ever saved.
    fn load(&self, key: &K) -> Result<Option<V>, StoreError>;

    /// Replace the snapshot if the persisted version matches `expected`.
    fn save(&self, key: K, value: V, expected: ExpectedVersion) -> Result<(), StoreError>;

    /// Every stored snapshot, in no particular order.
    fn list(&self) -> Result<Vec<V>, StoreError>;
}

impl<K, V, S> RecordStore<K, V> for Arc<S>
where
    S: RecordStore<K, V> + ?Sized,
{
    fn load(&self, key: &K) -> Result<Option<V>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: K, value: V, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).save(key, value, expected)
    }

    fn list(&self) -> Result<Vec<V>, StoreError> {
        (**self).list()
    }
}
