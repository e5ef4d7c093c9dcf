//! A deterministic in-memory [`StateAccess`] backend.
//!
//! Grounded on the teacher's `MockStateManager` test fixture
//! (`api/src/state/tests/mod.rs`), which this promotes from a private
//! test double to the node's actual reference store — swapping its
//! `HashMap` for a `BTreeMap` so `prefix_scan` returns keys in
//! ascending lexicographic order, which every module here (DEX
//! price-time order matching, COMPUTE's deterministic nonce sweep) and
//! the [`paw_api::state::StateOverlay`] merge both require.
//!
//! This is the node's persistence layer. The teacher's durable,
//! sharded, WAL-backed `redb` engine (`kernel/crates/storage`) is the
//! explicitly out-of-scope "persistence engine" collaborator
//! (`spec.md §1`); the only hard requirement this core actually has
//! on storage is the deterministic KV contract `StateAccess` describes.

#![cfg_attr(
    not(test),
    deny(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)
)]

use paw_api::state::{StateAccess, StateScanIter};
use paw_types::error::StateError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An in-memory, `BTreeMap`-backed [`StateAccess`] implementation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl StateAccess for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.data.get(key).cloned())
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        self.data.remove(key);
        Ok(())
    }

    fn batch_set(&mut self, updates: &[(Vec<u8>, Vec<u8>)]) -> Result<(), StateError> {
        for (key, value) in updates {
            self.insert(key, value)?;
        }
        Ok(())
    }

    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>, StateError> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    fn batch_apply(
        &mut self,
        inserts: &[(Vec<u8>, Vec<u8>)],
        deletes: &[Vec<u8>],
    ) -> Result<(), StateError> {
        for key in deletes {
            self.delete(key)?;
        }
        for (key, value) in inserts {
            self.insert(key, value)?;
        }
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<StateScanIter<'_>, StateError> {
        let items: Vec<_> = self
            .data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| Ok((Arc::from(k.as_slice()), Arc::from(v.as_slice()))))
            .collect();
        Ok(Box::new(items.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_scan_returns_ascending_lexicographic_order() {
        let mut store = MemoryStore::new();
        store.insert(b"p/3", b"c").unwrap();
        store.insert(b"p/1", b"a").unwrap();
        store.insert(b"p/2", b"b").unwrap();
        store.insert(b"q/1", b"z").unwrap();

        let keys: Vec<Vec<u8>> = store
            .prefix_scan(b"p/")
            .unwrap()
            .map(|r| r.unwrap().0.to_vec())
            .collect();
        assert_eq!(keys, vec![b"p/1".to_vec(), b"p/2".to_vec(), b"p/3".to_vec()]);
    }

    #[test]
    fn batch_apply_deletes_before_inserting() {
        let mut store = MemoryStore::new();
        store.insert(b"k", b"old").unwrap();
        store
            .batch_apply(&[(b"k".to_vec(), b"new".to_vec())], &[b"k".to_vec()])
            .unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn delete_then_get_returns_none() {
        let mut store = MemoryStore::new();
        store.insert(b"k", b"v").unwrap();
        store.delete(b"k").unwrap();
        assert_eq!(store.get(b"k").unwrap(), None);
    }
}
