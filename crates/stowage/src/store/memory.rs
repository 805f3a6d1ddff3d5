//! In-memory fake host.
//!
//! Tests drive the exact collection code paths against this backend instead
//! of stable memory. Cloning a handle shares the underlying map, mirroring
//! how every real host handle aliases one ambient store.

use crate::store::{HostError, HostStore, MAX_KEY_BYTES, MAX_VALUE_BYTES};
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

///
/// MemoryStore
///

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of raw keys currently stored, across all collections.
    #[must_use]
    pub fn raw_len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Report whether the exact raw key is stored. Test introspection only;
    /// collections never bypass the adapter like this.
    #[must_use]
    pub fn contains_raw(&self, key: &[u8]) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Raw keys currently stored under a byte prefix, in lexicographic order.
    #[must_use]
    pub fn raw_keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        self.entries
            .borrow()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn check_limits(key: &[u8], value: Option<&[u8]>) -> Result<(), HostError> {
        if key.len() > MAX_KEY_BYTES {
            return Err(HostError::KeyTooLarge {
                len: key.len(),
                max: MAX_KEY_BYTES,
            });
        }
        if let Some(value) = value
            && value.len() > MAX_VALUE_BYTES
        {
            return Err(HostError::ValueTooLarge {
                len: value.len(),
                max: MAX_VALUE_BYTES,
            });
        }

        Ok(())
    }
}

impl HostStore for MemoryStore {
    fn storage_read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HostError> {
        Self::check_limits(key, None)?;

        Ok(self.entries.borrow().get(key).cloned())
    }

    fn storage_write(&self, key: &[u8], value: &[u8]) -> Result<bool, HostError> {
        Self::check_limits(key, Some(value))?;

        let prior = self
            .entries
            .borrow_mut()
            .insert(key.to_vec(), value.to_vec());

        Ok(prior.is_some())
    }

    fn storage_remove(&self, key: &[u8]) -> Result<bool, HostError> {
        Self::check_limits(key, None)?;

        Ok(self.entries.borrow_mut().remove(key).is_some())
    }

    fn storage_has_key(&self, key: &[u8]) -> Result<bool, HostError> {
        Self::check_limits(key, None)?;

        Ok(self.entries.borrow().contains_key(key))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_remove_roundtrip() {
        let store = MemoryStore::new();

        assert!(!store.storage_write(b"k", b"v1").expect("write"));
        assert!(store.storage_write(b"k", b"v2").expect("overwrite"));
        assert_eq!(store.storage_read(b"k").expect("read"), Some(b"v2".to_vec()));
        assert!(store.storage_has_key(b"k").expect("has"));

        assert!(store.storage_remove(b"k").expect("remove"));
        assert!(!store.storage_remove(b"k").expect("second remove"));
        assert_eq!(store.storage_read(b"k").expect("read"), None);
    }

    #[test]
    fn clones_alias_the_same_map() {
        let store = MemoryStore::new();
        let alias = store.clone();

        store.storage_write(b"k", b"v").expect("write");
        assert_eq!(alias.storage_read(b"k").expect("read"), Some(b"v".to_vec()));
        assert_eq!(alias.raw_len(), 1);
    }

    #[test]
    fn oversized_key_is_rejected() {
        let store = MemoryStore::new();
        let key = vec![0u8; MAX_KEY_BYTES + 1];

        let err = store.storage_write(&key, b"v").expect_err("oversized key");
        assert!(matches!(err, HostError::KeyTooLarge { .. }));
    }

    #[test]
    fn oversized_value_is_rejected() {
        let store = MemoryStore::new();
        let value = vec![0u8; MAX_VALUE_BYTES + 1];

        let err = store.storage_write(b"k", &value).expect_err("oversized value");
        assert!(matches!(err, HostError::ValueTooLarge { .. }));
    }
}
