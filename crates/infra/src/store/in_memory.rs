use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use stockyard_core::{AggregateRoot, ExpectedVersion};

use super::r#trait::{RecordStore, StoreError};

/// In-memory versioned snapshot store.
///
/// Intended for tests/dev and the default single-process deployment.
#[derive(Debug)]
pub struct InMemoryRecordStore<K, V> {
    records: RwLock<HashMap<K, V>>,
}

impl<K, V> InMemoryRecordStore<K, V> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryRecordStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RecordStore<K, V> for InMemoryRecordStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: AggregateRoot + Clone + Send + Sync + 'static,
{
    fn load(&self, key: &K) -> Result<Option<V>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(records.get(key).cloned())
    }

    fn save(&self, key: K, value: V, expected: ExpectedVersion) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let current = records.get(&key).map(AggregateRoot::version);
        if !expected.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "expected {expected:?}, found {current:?}"
            )));
        }
        if let Some(found) = current {
            if value.version() <= found {
                return Err(StoreError::Concurrency(format!(
                    "version must increase (stored {found}, attempted {})",
                    value.version()
                )));
            }
        }

        records.insert(key, value);
        Ok(())
    }

    fn list(&self) -> Result<Vec<V>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(records.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        id: u32,
        version: u64,
    }

    impl AggregateRoot for Counter {
        type Id = u32;

        fn id(&self) -> &Self::Id {
            &self.id
        }

        fn version(&self) -> u64 {
            self.version
        }
    }

    #[test]
    fn absent_write_then_exact_write() {
        let store = InMemoryRecordStore::new();
        store
            .save(1, Counter { id: 1, version: 1 }, ExpectedVersion::Absent)
            .unwrap();
        store
            .save(1, Counter { id: 1, version: 2 }, ExpectedVersion::Exact(1))
            .unwrap();
        assert_eq!(store.load(&1).unwrap().unwrap().version, 2);
    }

    #[test]
    fn stale_writer_is_rejected() {
        let store = InMemoryRecordStore::new();
        store
            .save(1, Counter { id: 1, version: 1 }, ExpectedVersion::Absent)
            .unwrap();
        store
            .save(1, Counter { id: 1, version: 2 }, ExpectedVersion::Exact(1))
            .unwrap();

        let err = store
            .save(1, Counter { id: 1, version: 2 }, ExpectedVersion::Exact(1))
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));

        let err = store
            .save(1, Counter { id: 1, version: 1 }, ExpectedVersion::Absent)
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));
    }

    #[test]
    fn list_returns_every_record() {
        let store = InMemoryRecordStore::new();
        for id in 0..3 {
            store
                .save(id, Counter { id, version: 1 }, ExpectedVersion::Absent)
                .unwrap();
        }
        assert_eq!(store.list().unwrap().len(), 3);
    }
}
