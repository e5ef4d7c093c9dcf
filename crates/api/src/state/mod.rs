//! Core state-access trait and type aliases.
//!
//! The teacher's `state` module additionally carries a commitment-scheme
//! abstraction, a pruning/retention manager, state-version pins, and a
//! proof-provider hierarchy, all built around versioned verifiable
//! state for light clients. None of that is needed here: every COMPUTE,
//! DEX, ORACLE, and circuit-breaker operation is expressed purely in
//! terms of a flat key-value store with deterministic prefix scans, so
//! only [`StateAccess`] and the overlay in [`overlay`] are kept.

use paw_types::error::StateError;
use std::sync::Arc;

mod overlay;

pub use overlay::{StateChangeSet, StateDeletes, StateInserts, StateOverlay};

/// An atomically reference-counted, owned key slice.
pub type StateKey = Arc<[u8]>;
/// An atomically reference-counted, owned value slice.
pub type StateVal = Arc<[u8]>;
/// An owned key-value pair from the state, using cheap-to-clone Arcs.
pub type StateKVPair = (StateKey, StateVal);
/// A streaming iterator over key-value pairs from the state. `Send` so it
/// can be moved across async tasks; `Sync` is omitted since iterators are
/// inherently stateful.
pub type StateScanIter<'a> = Box<dyn Iterator<Item = Result<StateKVPair, StateError>> + Send + 'a>;

/// A dyn-safe trait providing a complete key-value storage interface,
/// erasing the concrete store so services and transaction execution
/// code never need to know whether they're backed by an in-memory map
/// or a persistent database.
pub trait StateAccess: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError>;

    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError>;

    fn delete(&mut self, key: &[u8]) -> Result<(), StateError>;

    fn batch_set(&mut self, updates: &[(Vec<u8>, Vec<u8>)]) -> Result<(), StateError>;

    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>, StateError>;

    /// Atomically applies a batch of inserts/updates and deletes. The
    /// primary method for committing a transaction's overlay.
    fn batch_apply(
        &mut self,
        inserts: &[(Vec<u8>, Vec<u8>)],
        deletes: &[Vec<u8>],
    ) -> Result<(), StateError>;

    /// Scans all key-value pairs starting with `prefix`, in ascending
    /// lexicographic key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<StateScanIter<'_>, StateError>;
}

impl<T: StateAccess + ?Sized> StateAccess for Box<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        (**self).get(key)
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError> {
        (**self).insert(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        (**self).delete(key)
    }

    fn batch_set(&mut self, updates: &[(Vec<u8>, Vec<u8>)]) -> Result<(), StateError> {
        (**self).batch_set(updates)
    }

    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>, StateError> {
        (**self).batch_get(keys)
    }

    fn batch_apply(
        &mut self,
        inserts: &[(Vec<u8>, Vec<u8>)],
        deletes: &[Vec<u8>],
    ) -> Result<(), StateError> {
        (**self).batch_apply(inserts, deletes)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<StateScanIter<'_>, StateError> {
        (**self).prefix_scan(prefix)
    }
}
