//! Circuit breaker: a single-byte CLOSED/OPEN flag per module, stored
//! directly in the KV store and consulted at handler entry.
//!
//! Not grounded on a teacher module (the teacher has no module-pause
//! primitive); the design itself is prescribed directly by this core's
//! own notes: "the breaker is a single-byte flag per module in the KV
//! store; handlers consult it at entry. This keeps the control flow
//! purely data-driven and deterministic, and makes pause/resume
//! trivially auditable in the state diff." Only a designated
//! governance authority (checked via
//! [`crate::ports::GovernanceAuthority`] at the call site, not here)
//! may flip a breaker; this module only stores and reads the flag.

use crate::state::StateAccess;
use paw_types::error::StateError;

const OPEN: u8 = 1;
const CLOSED: u8 = 0;

/// Reads a module or per-provider breaker flag. Absent keys read as
/// CLOSED (normal operation) — a module starts unpaused until governance
/// explicitly opens it.
pub fn is_paused(state: &dyn StateAccess, breaker_key: &[u8]) -> Result<bool, StateError> {
    Ok(state.get(breaker_key)?.is_some_and(|v| v.first() == Some(&OPEN)))
}

/// Flips a breaker flag. Callers are responsible for checking governance
/// authority and for emitting the `circuit_breaker_{open,close}` event.
pub fn set_paused(state: &mut dyn StateAccess, breaker_key: &[u8], paused: bool) -> Result<(), StateError> {
    let byte = if paused { OPEN } else { CLOSED };
    state.insert(breaker_key, &[byte])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeStore(BTreeMap<Vec<u8>, Vec<u8>>);

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
        fn prefix_scan(&self, prefix: &[u8]) -> Result<crate::state::StateScanIter<'_>, StateError> {
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
    fn absent_breaker_reads_as_closed() {
        let state = FakeStore::default();
        assert!(!is_paused(&state, b"breaker").unwrap());
    }

    #[test]
    fn set_then_read_round_trips() {
        let mut state = FakeStore::default();
        set_paused(&mut state, b"breaker", true).unwrap();
        assert!(is_paused(&state, b"breaker").unwrap());
        set_paused(&mut state, b"breaker", false).unwrap();
        assert!(!is_paused(&state, b"breaker").unwrap());
    }
}
