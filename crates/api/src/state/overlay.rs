//! A copy-on-write state overlay for transaction execution and simulation.

use crate::state::{StateAccess, StateKVPair, StateScanIter};
use paw_types::error::StateError;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::iter::{Fuse, Peekable};
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::sync::Arc;

/// A batch of key-value pairs to be inserted or updated in the state.
pub type StateInserts = Vec<(Vec<u8>, Vec<u8>)>;
/// A batch of keys to be deleted from the state.
pub type StateDeletes = Vec<Vec<u8>>;
/// A complete set of state changes (inserts/updates and deletes) produced
/// by a transaction, ready to commit.
pub type StateChangeSet = (StateInserts, StateDeletes);

/// The smallest byte vector strictly greater than every key starting
/// with `prefix`, or `None` if `prefix` is empty or all `0xFF` bytes
/// (in which case the prefix's range is unbounded above).
fn next_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    if prefix.is_empty() {
        return None;
    }
    let mut ub = prefix.to_vec();
    for i in (0..ub.len()).rev() {
        if let Some(byte) = ub.get_mut(i) {
            if *byte != 0xFF {
                *byte += 1;
                ub.truncate(i + 1);
                return Some(ub);
            }
        }
    }
    None
}

struct MergingIterator<'a> {
    base: Peekable<Fuse<StateScanIter<'a>>>,
    writes: Peekable<btree_map::Range<'a, Vec<u8>, Option<Vec<u8>>>>,
}

impl<'a> Iterator for MergingIterator<'a> {
    type Item = Result<StateKVPair, StateError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let base_key = self
                .base
                .peek()
                .and_then(|res| res.as_ref().ok().map(|(k, _)| k.as_ref()));
            let write_key = self.writes.peek().map(|(k, _)| k.as_slice());

            let decision = match (base_key, write_key) {
                (Some(bk), Some(wk)) => Some(bk.cmp(wk)),
                (Some(_), None) => Some(std::cmp::Ordering::Less),
                (None, Some(_)) => Some(std::cmp::Ordering::Greater),
                (None, None) => None,
            };

            match decision {
                Some(std::cmp::Ordering::Less) => return self.base.next(),
                Some(std::cmp::Ordering::Greater) => {
                    if let Some((key, val_opt)) = self.writes.next() {
                        if let Some(val) = val_opt {
                            return Some(Ok((Arc::from(key.clone()), Arc::from(val.clone()))));
                        }
                    }
                }
                Some(std::cmp::Ordering::Equal) => {
                    self.base.next();
                    if let Some((key, val_opt)) = self.writes.next() {
                        if let Some(val) = val_opt {
                            return Some(Ok((Arc::from(key.clone()), Arc::from(val.clone()))));
                        }
                    }
                }
                None => return None,
            }
        }
    }
}

/// An in-memory, copy-on-write overlay on top of any `StateAccess`.
///
/// Reads check the local `writes` cache first and fall through to
/// `base` on a miss. Writes never touch `base` — call
/// [`StateOverlay::into_ordered_batch`] to extract them for commit, or
/// drop the overlay to discard them (simulation / `validate_ante`
/// rejection).
pub struct StateOverlay<'a> {
    base: &'a dyn StateAccess,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> StateOverlay<'a> {
    pub fn new(base: &'a dyn StateAccess) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
        }
    }

    /// Consumes the overlay, splitting its writes into deterministically
    /// ordered inserts and deletes for committing to the canonical state.
    pub fn into_ordered_batch(self) -> StateChangeSet {
        let mut inserts = Vec::new();
        let mut deletes = Vec::new();
        for (key, value_opt) in self.writes {
            match value_opt {
                Some(value) => inserts.push((key, value)),
                None => deletes.push(key),
            }
        }
        (inserts, deletes)
    }
}

impl<'a> StateAccess for StateOverlay<'a> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        match self.writes.get(key) {
            Some(value_opt) => Ok(value_opt.clone()),
            None => self.base.get(key),
        }
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError> {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn batch_set(&mut self, updates: &[(Vec<u8>, Vec<u8>)]) -> Result<(), StateError> {
        for (key, value) in updates {
            self.insert(key, value)?;
        }
        Ok(())
    }

    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>, StateError> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.get(key)?);
        }
        Ok(results)
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
        let base = self.base.prefix_scan(prefix)?.fuse().peekable();

        let start = Included(prefix.to_vec());
        let end = match next_prefix(prefix) {
            Some(ub) => Excluded(ub),
            None => Unbounded,
        };
        let writes = self.writes.range((start, end)).peekable();

        Ok(Box::new(MergingIterator { base, writes }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as StdBTreeMap;

    #[derive(Default)]
    struct FakeStore(StdBTreeMap<Vec<u8>, Vec<u8>>);

    impl StateAccess for FakeStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
            Ok(self.0.get(key).cloned())
        }
        fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError> {
            self.0.insert(key.to_vec(), value.to_vec());
            Ok(())
        }
        fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
            self.0.remove(key);
            Ok(())
        }
        fn batch_set(&mut self, updates: &[(Vec<u8>, Vec<u8>)]) -> Result<(), StateError> {
            for (k, v) in updates {
                self.insert(k, v)?;
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
            for k in deletes {
                self.delete(k)?;
            }
            for (k, v) in inserts {
                self.insert(k, v)?;
            }
            Ok(())
        }
        fn prefix_scan(&self, prefix: &[u8]) -> Result<StateScanIter<'_>, StateError> {
            let items: Vec<_> = self
                .0
                .range(prefix.to_vec()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| Ok((Arc::from(k.as_slice()), Arc::from(v.as_slice()))))
                .collect();
            Ok(Box::new(items.into_iter()))
        }
    }

    #[test]
    fn overlay_read_prefers_writes_over_base() {
        let mut base = FakeStore::default();
        base.insert(b"k", b"base-value").unwrap();
        let mut overlay = StateOverlay::new(&base);
        overlay.insert(b"k", b"overlay-value").unwrap();
        assert_eq!(overlay.get(b"k").unwrap(), Some(b"overlay-value".to_vec()));
    }

    #[test]
    fn overlay_delete_shadows_base_without_mutating_it() {
        let mut base = FakeStore::default();
        base.insert(b"k", b"v").unwrap();
        let mut overlay = StateOverlay::new(&base);
        overlay.delete(b"k").unwrap();
        assert_eq!(overlay.get(b"k").unwrap(), None);
        assert_eq!(base.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn into_ordered_batch_splits_inserts_and_deletes() {
        let base = FakeStore::default();
        let mut overlay = StateOverlay::new(&base);
        overlay.insert(b"a", b"1").unwrap();
        overlay.delete(b"b").unwrap();
        let (inserts, deletes) = overlay.into_ordered_batch();
        assert_eq!(inserts, vec![(b"a".to_vec(), b"1".to_vec())]);
        assert_eq!(deletes, vec![b"b".to_vec()]);
    }

    #[test]
    fn prefix_scan_merges_base_and_overlay_in_key_order() {
        let mut base = FakeStore::default();
        base.insert(b"p/1", b"base-1").unwrap();
        base.insert(b"p/3", b"base-3").unwrap();
        let mut overlay = StateOverlay::new(&base);
        overlay.insert(b"p/2", b"overlay-2").unwrap();
        overlay.delete(b"p/3").unwrap();

        let keys: Vec<Vec<u8>> = overlay
            .prefix_scan(b"p/")
            .unwrap()
            .map(|r| r.unwrap().0.to_vec())
            .collect();
        assert_eq!(keys, vec![b"p/1".to_vec(), b"p/2".to_vec()]);
    }
}
