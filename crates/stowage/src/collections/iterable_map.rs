//! Key/value store with lazy enumeration.
//!
//! Lookup semantics are identical to [`LookupMap`]; on top of them a
//! companion sequence at `prefix ‖ INDEX_SEP` records present keys in
//! insertion order, and a reverse position map at `prefix ‖ REVERSE_IDX_SEP`
//! maps each key to its index slot so removal is O(1). Removal swap-removes
//! in the key index, so iteration order is not preserved across removals.
//!
//! The position-map layout is part of a stored instance: once a map has been
//! written with it, later code versions must keep it (changing the strategy
//! is a storage migration).

use crate::{
    collections::{
        LookupMap, Sequence,
        codec::{decode_key, decode_value, encode_value},
        cursor::Cursor,
    },
    error::Error,
    key::StorageKey,
    meta::{self, CollectionKind, Header},
    prefix::Prefix,
    serialize::{CborCodec, ValueCodec},
    store::{Adapter, HostStore, StableStore},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_bytes::ByteBuf;
use std::marker::PhantomData;

const KIND: CollectionKind = CollectionKind::IterableMap;

///
/// IterableMap
///

pub struct IterableMap<K, V, S: HostStore = StableStore, C = CborCodec> {
    prefix: Prefix,
    adapter: Adapter<S>,
    index: Sequence<ByteBuf, S, C>,
    positions: LookupMap<ByteBuf, u64, S, C>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, S: HostStore, C> IterableMap<K, V, S, C> {
    #[must_use]
    pub fn new(prefix: Prefix) -> Self
    where
        S: Default,
    {
        Self::with_host(prefix, S::default())
    }

    #[must_use]
    pub fn with_host(prefix: Prefix, host: S) -> Self {
        let index = Sequence::with_host(prefix.index_prefix(), host.clone());
        let positions = LookupMap::with_host(prefix.reverse_prefix(), host.clone());

        Self {
            prefix,
            adapter: Adapter::new(host),
            index,
            positions,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn prefix(&self) -> &Prefix {
        &self.prefix
    }
}

impl<K, V, S, C> IterableMap<K, V, S, C>
where
    K: StorageKey,
    V: Serialize + DeserializeOwned,
    S: HostStore,
    C: ValueCodec,
{
    fn entry_key_for(&self, encoded: &[u8]) -> Vec<u8> {
        self.prefix.entry_key(encoded)
    }

    fn header(&self) -> Result<Header, Error> {
        Ok(meta::load_header(&self.adapter, &self.prefix, KIND, C::VERSION)?
            .unwrap_or(Header::new(KIND, C::VERSION)))
    }

    fn commit(&self, mut header: Header) -> Result<(), Error> {
        header.bump();
        meta::store_header(&self.adapter, &self.prefix, header)
    }

    pub(in crate::collections) fn current_generation(&self) -> Result<u64, Error> {
        Ok(
            meta::load_header(&self.adapter, &self.prefix, KIND, C::VERSION)?
                .map_or(0, |header| header.generation),
        )
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

    /// Length of the companion key index. Always equals `len()` for a
    /// healthy map; exposed as a caller-side consistency cross-check.
    pub fn index_len(&self) -> Result<u64, Error> {
        self.index.len()
    }

    /// Load the value stored under `key`. Absence is `Ok(None)`.
    pub fn get(&self, key: &K) -> Result<Option<V>, Error> {
        self.adapter
            .read(&self.entry_key_for(key.to_key_bytes().as_slice()))?
            .map(|bytes| decode_value::<C, V>(&bytes))
            .transpose()
    }

    /// Strict lookup: absence is [`Error::KeyAbsent`].
    pub fn try_get(&self, key: &K) -> Result<V, Error> {
        self.get(key)?.ok_or_else(|| Error::KeyAbsent {
            key: key.to_key_bytes(),
        })
    }

    pub fn contains(&self, key: &K) -> Result<bool, Error> {
        self.adapter.has(&self.entry_key_for(key.to_key_bytes().as_slice()))
    }

    /// Store `value` under `key`. A new key is appended to the key index
    /// and its slot recorded in the position map; an existing key only has
    /// its payload overwritten.
    pub fn set(&mut self, key: &K, value: &V) -> Result<(), Error> {
        let mut header = self.header()?;
        let key_bytes = key.to_key_bytes();
        let encoded = encode_value::<C, V>(value)?;

        let was_present = self
            .adapter
            .write(&self.entry_key_for(key_bytes.as_slice()), &encoded)?;
        if !was_present {
            let tracked = ByteBuf::from(key_bytes.into_vec());
            self.positions.set(&tracked, &header.len)?;
            self.index.push(&tracked)?;
            header.len += 1;
        }
        self.commit(header)
    }

    /// Store `value` under `key` and return the prior value.
    pub fn insert(&mut self, key: &K, value: &V) -> Result<Option<V>, Error> {
        let prior = self.get(key)?;
        self.set(key, value)?;

        Ok(prior)
    }

    /// Remove `key` and return its value. The vacated key-index slot is
    /// filled by the last tracked key, whose position entry is repointed.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>, Error> {
        let mut header = self.header()?;
        let key_bytes = key.to_key_bytes();
        let entry_key = self.entry_key_for(key_bytes.as_slice());

        let Some(bytes) = self.adapter.read(&entry_key)? else {
            return Ok(None);
        };
        let value = decode_value::<C, V>(&bytes)?;

        let tracked = ByteBuf::from(key_bytes.into_vec());
        let slot = self.positions.remove(&tracked)?.ok_or_else(|| {
            Error::index_desync(format!(
                "no position recorded for present key {}",
                key.to_key_bytes()
            ))
        })?;

        self.adapter.remove(&entry_key)?;
        self.index.swap_remove(slot)?;

        // The previously-last key now occupies `slot`; repoint it.
        let remaining = self.index.len()?;
        if slot < remaining {
            let moved = self.index.load_slot(slot)?;
            self.positions.set(&moved, &slot)?;
        }

        header.len = header.len.saturating_sub(1);
        self.commit(header)?;

        Ok(Some(value))
    }

    /// Store every entry from `entries`.
    pub fn extend<I>(&mut self, entries: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.set(&key, &value)?;
        }

        Ok(())
    }

    /// Deep clear: removes every payload entry, every position entry, the
    /// key index, and resets the length to zero. O(len) host calls. A map
    /// that was never created stays untouched.
    pub fn clear(&mut self) -> Result<(), Error> {
        let Some(mut header) = meta::load_header(&self.adapter, &self.prefix, KIND, C::VERSION)?
        else {
            return Ok(());
        };

        let tracked = self.index.len()?;
        for slot in 0..tracked {
            let key_bytes = self.index.load_slot(slot)?;
            self.adapter.remove(&self.entry_key_for(key_bytes.as_slice()))?;
            self.positions.remove_untracked(&key_bytes)?;
        }

        self.index.clear()?;
        self.positions.clear()?;

        header.len = 0;
        self.commit(header)
    }

    /// Lazy cursor over the keys, in key-index order.
    pub fn keys(&self) -> Result<Keys<'_, K, V, S, C>, Error> {
        let header = self.header()?;

        Ok(Keys {
            map: self,
            cursor: Cursor::new(header.len, header.generation),
        })
    }

    /// Lazy cursor over the values, in key-index order.
    pub fn values(&self) -> Result<Values<'_, K, V, S, C>, Error> {
        let header = self.header()?;

        Ok(Values {
            map: self,
            cursor: Cursor::new(header.len, header.generation),
        })
    }

    /// Lazy cursor over `(key, value)` pairs, in key-index order.
    pub fn iter(&self) -> Result<Entries<'_, K, V, S, C>, Error> {
        let header = self.header()?;

        Ok(Entries {
            map: self,
            cursor: Cursor::new(header.len, header.generation),
        })
    }

    // One tracked key, decoded back to the logical type.
    fn tracked_key(&self, slot: u64) -> Result<K, Error> {
        let key_bytes = self.index.load_slot(slot)?;
        decode_key::<K>(key_bytes.as_slice())
    }

    // One tracked key plus its payload.
    fn tracked_entry(&self, slot: u64) -> Result<(K, V), Error> {
        let key_bytes = self.index.load_slot(slot)?;
        let entry_key = self.entry_key_for(key_bytes.as_slice());

        let bytes = self.adapter.read(&entry_key)?.ok_or_else(|| {
            Error::index_desync(format!("tracked key has no payload at slot {slot}"))
        })?;

        Ok((decode_key::<K>(key_bytes.as_slice())?, decode_value::<C, V>(&bytes)?))
    }
}

impl<K, V, S: HostStore, C> Clone for IterableMap<K, V, S, C> {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            adapter: self.adapter.clone(),
            index: self.index.clone(),
            positions: self.positions.clone(),
            _marker: PhantomData,
        }
    }
}

///
/// Keys
///

pub struct Keys<'a, K, V, S: HostStore, C> {
    map: &'a IterableMap<K, V, S, C>,
    cursor: Cursor,
}

impl<K, V, S, C> Iterator for Keys<'_, K, V, S, C>
where
    K: StorageKey,
    V: Serialize + DeserializeOwned,
    S: HostStore,
    C: ValueCodec,
{
    type Item = Result<K, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_exhausted() {
            return None;
        }
        if let Some(err) = self.cursor.verify(self.map.current_generation()) {
            return Some(Err(err));
        }

        let slot = self.cursor.take_front();
        let item = self.map.tracked_key(slot);
        if item.is_err() {
            self.cursor.fuse();
        }

        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.cursor.remaining() as usize;
        (remaining, Some(remaining))
    }
}

///
/// Values
///

pub struct Values<'a, K, V, S: HostStore, C> {
    map: &'a IterableMap<K, V, S, C>,
    cursor: Cursor,
}

impl<K, V, S, C> Iterator for Values<'_, K, V, S, C>
where
    K: StorageKey,
    V: Serialize + DeserializeOwned,
    S: HostStore,
    C: ValueCodec,
{
    type Item = Result<V, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_exhausted() {
            return None;
        }
        if let Some(err) = self.cursor.verify(self.map.current_generation()) {
            return Some(Err(err));
        }

        let slot = self.cursor.take_front();
        let item = self.map.tracked_entry(slot).map(|(_, value)| value);
        if item.is_err() {
            self.cursor.fuse();
        }

        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.cursor.remaining() as usize;
        (remaining, Some(remaining))
    }
}

///
/// Entries
///

pub struct Entries<'a, K, V, S: HostStore, C> {
    map: &'a IterableMap<K, V, S, C>,
    cursor: Cursor,
}

impl<K, V, S, C> Iterator for Entries<'_, K, V, S, C>
where
    K: StorageKey,
    V: Serialize + DeserializeOwned,
    S: HostStore,
    C: ValueCodec,
{
    type Item = Result<(K, V), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_exhausted() {
            return None;
        }
        if let Some(err) = self.cursor.verify(self.map.current_generation()) {
            return Some(Err(err));
        }

        let slot = self.cursor.take_front();
        let item = self.map.tracked_entry(slot);
        if item.is_err() {
            self.cursor.fuse();
        }

        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.cursor.remaining() as usize;
        (remaining, Some(remaining))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::BTreeSet;

    fn map(label: &str) -> IterableMap<String, u64, MemoryStore> {
        let prefix = Prefix::try_from(label).expect("test prefix");
        IterableMap::with_host(prefix, MemoryStore::new())
    }

    fn key_set(map: &IterableMap<String, u64, MemoryStore>) -> BTreeSet<String> {
        map.keys()
            .expect("keys")
            .collect::<Result<BTreeSet<_>, _>>()
            .expect("key iteration")
    }

    #[test]
    fn set_get_remove_roundtrip() {
        let mut map = map("im1");

        map.set(&"a".into(), &1).expect("set");
        map.set(&"b".into(), &2).expect("set");
        map.set(&"a".into(), &10).expect("overwrite");

        assert_eq!(map.len().expect("len"), 2);
        assert_eq!(map.index_len().expect("index len"), 2);
        assert_eq!(map.get(&"a".into()).expect("get"), Some(10));
        assert_eq!(map.remove(&"b".into()).expect("remove"), Some(2));
        assert_eq!(map.remove(&"b".into()).expect("second remove"), None);
        assert_eq!(map.len().expect("len"), 1);
        assert_eq!(map.index_len().expect("index len"), 1);
    }

    #[test]
    fn keys_enumerate_in_insertion_order() {
        let mut map = map("im2");
        map.set(&"x".into(), &1).expect("set");
        map.set(&"y".into(), &2).expect("set");
        map.set(&"z".into(), &3).expect("set");

        let keys: Vec<String> = map
            .keys()
            .expect("keys")
            .collect::<Result<Vec<_>, _>>()
            .expect("key iteration");
        assert_eq!(keys, vec!["x", "y", "z"]);

        let values: Vec<u64> = map
            .values()
            .expect("values")
            .collect::<Result<Vec<_>, _>>()
            .expect("value iteration");
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn removal_swaps_last_key_into_the_hole() {
        let mut map = map("im3");
        map.set(&"x".into(), &1).expect("set");
        map.set(&"y".into(), &2).expect("set");
        map.set(&"z".into(), &3).expect("set");

        map.remove(&"x".into()).expect("remove");

        let keys: Vec<String> = map
            .keys()
            .expect("keys")
            .collect::<Result<Vec<_>, _>>()
            .expect("key iteration");
        assert_eq!(keys, vec!["z", "y"]);

        // The moved key must still be removable through its new slot.
        assert_eq!(map.remove(&"z".into()).expect("remove moved key"), Some(3));
        assert_eq!(key_set(&map), BTreeSet::from(["y".to_string()]));
    }

    #[test]
    fn iteration_matches_contains_after_mutation_storm() {
        let mut map = map("im4");
        for i in 0..12u64 {
            map.set(&format!("k{i}"), &i).expect("set");
        }
        for i in (0..12u64).step_by(3) {
            map.remove(&format!("k{i}")).expect("remove");
        }
        map.set(&"k0".into(), &100).expect("re-add");

        let enumerated = key_set(&map);
        for i in 0..12u64 {
            let key = format!("k{i}");
            assert_eq!(
                map.contains(&key).expect("contains"),
                enumerated.contains(&key),
                "key {key} visibility diverged between contains and iteration"
            );
        }
        assert_eq!(enumerated.len() as u64, map.len().expect("len"));
    }

    #[test]
    fn iterator_invalidated_by_mutation() {
        let host = MemoryStore::new();
        let prefix = Prefix::try_from("im5").expect("prefix");
        let mut map: IterableMap<String, u64, MemoryStore> =
            IterableMap::with_host(prefix.clone(), host.clone());
        map.set(&"k1".into(), &1).expect("set");

        let mut keys = map.keys().expect("keys");

        let mut alias: IterableMap<String, u64, MemoryStore> =
            IterableMap::with_host(prefix, host);
        alias.set(&"k2".into(), &2).expect("set");

        assert!(matches!(keys.next(), Some(Err(Error::Invalidated { .. }))));
        assert!(keys.next().is_none(), "iterator must fuse after the error");
    }

    #[test]
    fn deep_clear_removes_payload_index_and_positions() {
        let host = MemoryStore::new();
        let prefix = Prefix::try_from("im6").expect("prefix");
        let mut map: IterableMap<String, u64, MemoryStore> =
            IterableMap::with_host(prefix.clone(), host.clone());

        map.set(&"a".into(), &1).expect("set");
        map.set(&"b".into(), &2).expect("set");
        map.clear().expect("clear");

        assert_eq!(map.len().expect("len"), 0);
        assert!(!map.contains(&"a".into()).expect("contains"));
        assert!(map.iter().expect("iter").next().is_none());

        // Every surviving raw key must be a metadata header, never a
        // payload, index slot, or position entry.
        let survivors = host.raw_keys_with_prefix(prefix.as_bytes());
        assert_eq!(survivors.len(), 2, "own and index headers");
        for key in survivors {
            assert_eq!(*key.last().expect("nonempty"), 0xF1, "non-header key survived: {key:?}");
        }

        // The map is fully usable after the clear.
        map.set(&"c".into(), &3).expect("set after clear");
        assert_eq!(map.len().expect("len"), 1);
    }

    #[test]
    fn insert_returns_prior_and_extend_bulk_loads() {
        let mut map = map("im7");

        assert_eq!(map.insert(&"k".into(), &1).expect("insert"), None);
        assert_eq!(map.insert(&"k".into(), &2).expect("insert"), Some(1));

        map.extend([("p".to_string(), 7), ("q".to_string(), 8)])
            .expect("extend");
        assert_eq!(map.len().expect("len"), 3);
        assert_eq!(map.try_get(&"q".into()).expect("try_get"), 8);
    }
}
