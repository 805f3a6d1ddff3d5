//! Non-iterable key-only store.
//!
//! Same storage and cost profile as the lookup map with the value fixed to a
//! one-byte presence marker, so membership checks never decode anything.

use crate::{
    error::Error,
    key::StorageKey,
    meta::{self, CollectionKind, Header},
    prefix::Prefix,
    serialize::{CborCodec, ValueCodec},
    store::{Adapter, HostStore, StableStore},
};
use std::marker::PhantomData;

const KIND: CollectionKind = CollectionKind::LookupSet;

/// Stored payload for every member. The byte value itself is meaningless;
/// only presence is.
pub(in crate::collections) const PRESENCE_MARKER: [u8; 1] = [1];

///
/// LookupSet
///

pub struct LookupSet<K, S: HostStore = StableStore, C = CborCodec> {
    prefix: Prefix,
    adapter: Adapter<S>,
    _marker: PhantomData<fn() -> (K, C)>,
}

impl<K, S: HostStore, C> LookupSet<K, S, C> {
    #[must_use]
    pub fn new(prefix: Prefix) -> Self
    where
        S: Default,
    {
        Self::with_host(prefix, S::default())
    }

    #[must_use]
    pub const fn with_host(prefix: Prefix, host: S) -> Self {
        Self {
            prefix,
            adapter: Adapter::new(host),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn prefix(&self) -> &Prefix {
        &self.prefix
    }
}

impl<K, S, C> LookupSet<K, S, C>
where
    K: StorageKey,
    S: HostStore,
    C: ValueCodec,
{
    fn entry_key(&self, key: &K) -> Vec<u8> {
        self.prefix.entry_key(key.to_key_bytes().as_slice())
    }

    fn header(&self) -> Result<Header, Error> {
        Ok(meta::load_header(&self.adapter, &self.prefix, KIND, C::VERSION)?
            .unwrap_or(Header::new(KIND, C::VERSION)))
    }

    fn commit(&self, mut header: Header) -> Result<(), Error> {
        header.bump();
        meta::store_header(&self.adapter, &self.prefix, header)
    }

    pub fn len(&self) -> Result<u64, Error> {
        self.header().map(|header| header.len)
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Mutation counter, for caller-side diagnostics.
    pub fn generation(&self) -> Result<u64, Error> {
        self.header().map(|header| header.generation)
    }

    pub fn contains(&self, key: &K) -> Result<bool, Error> {
        self.adapter.has(&self.entry_key(key))
    }

    /// Add `key`. Returns whether it was newly added.
    pub fn add(&mut self, key: &K) -> Result<bool, Error> {
        let mut header = self.header()?;

        let was_present = self.adapter.write(&self.entry_key(key), &PRESENCE_MARKER)?;
        if !was_present {
            header.len += 1;
        }
        self.commit(header)?;

        Ok(!was_present)
    }

    /// Remove `key`. Returns whether it was present; absence mutates
    /// nothing.
    pub fn remove(&mut self, key: &K) -> Result<bool, Error> {
        let mut header = self.header()?;

        if !self.adapter.remove(&self.entry_key(key))? {
            return Ok(false);
        }
        // Members orphaned by a prior `clear` are not counted in `len`.
        header.len = header.len.saturating_sub(1);
        self.commit(header)?;

        Ok(true)
    }

    /// Add every key from `keys`.
    pub fn extend<I>(&mut self, keys: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = K>,
    {
        let mut header = self.header()?;
        let mut touched = false;

        for key in keys {
            let was_present = self.adapter.write(&self.entry_key(&key), &PRESENCE_MARKER)?;
            if !was_present {
                header.len += 1;
            }
            touched = true;
        }

        if touched {
            self.commit(header)?;
        }

        Ok(())
    }

    /// Reset the length to zero by dropping the metadata header.
    ///
    /// Payload markers are NOT touched: prior members remain in host storage
    /// and still answer `contains` until removed explicitly — see
    /// [`LookupSet::drain_known_keys`].
    pub fn clear(&mut self) -> Result<(), Error> {
        meta::remove_header(&self.adapter, &self.prefix)?;

        Ok(())
    }

    /// Remove every member named by `keys`. Returns how many were removed.
    pub fn drain_known_keys<I>(&mut self, keys: I) -> Result<u64, Error>
    where
        I: IntoIterator<Item = K>,
    {
        let mut header = self.header()?;
        let mut removed = 0u64;

        for key in keys {
            if self.adapter.remove(&self.entry_key(&key))? {
                removed += 1;
                header.len = header.len.saturating_sub(1);
            }
        }

        if removed > 0 {
            self.commit(header)?;
        }

        Ok(removed)
    }
}

impl<K, S: HostStore, C> Clone for LookupSet<K, S, C> {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            adapter: self.adapter.clone(),
            _marker: PhantomData,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn set(label: &str) -> LookupSet<String, MemoryStore> {
        let prefix = Prefix::try_from(label).expect("test prefix");
        LookupSet::with_host(prefix, MemoryStore::new())
    }

    #[test]
    fn add_contains_remove_roundtrip() {
        let mut set = set("ls1");

        assert!(set.add(&"x".into()).expect("add"));
        assert!(!set.add(&"x".into()).expect("re-add"));
        assert!(set.contains(&"x".into()).expect("contains"));
        assert_eq!(set.len().expect("len"), 1);

        assert!(set.remove(&"x".into()).expect("remove"));
        assert!(!set.remove(&"x".into()).expect("second remove"));
        assert!(!set.contains(&"x".into()).expect("contains"));
        assert_eq!(set.len().expect("len"), 0);
    }

    #[test]
    fn clear_orphans_members_by_contract() {
        let mut set = set("ls2");
        set.add(&"x".into()).expect("add");

        set.clear().expect("clear");

        assert_eq!(set.len().expect("len"), 0);
        // The marker survives the shallow clear; this is the documented
        // orphan-storage consequence.
        assert!(set.contains(&"x".into()).expect("contains"));
    }

    #[test]
    fn drain_known_keys_deep_clears_listed_members() {
        let mut set = set("ls3");
        set.extend(["a".to_string(), "b".to_string()]).expect("extend");
        set.clear().expect("clear");

        let removed = set
            .drain_known_keys(["a".to_string(), "b".to_string(), "c".to_string()])
            .expect("drain");

        assert_eq!(removed, 2);
        assert!(!set.contains(&"a".into()).expect("contains"));
        assert!(!set.contains(&"b".into()).expect("contains"));
    }
}
