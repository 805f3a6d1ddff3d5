//! Key-sorted map with floor/ceiling and half-open range scans.
//!
//! The companion key index is a sequence kept in strictly ascending
//! encoded-byte order, which by the [`StorageKey`] contract is the keys'
//! logical order. Lookups binary-search the index (O(log n) host reads);
//! insertion and removal land on the order-preserving shifting variants of
//! the sequence, so they cost O(n) host writes in the worst case. No
//! reverse position map is kept: the binary search already locates slots.

use crate::{
    collections::{
        Sequence,
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
use std::{
    cmp::Ordering,
    marker::PhantomData,
    ops::{Bound, RangeBounds},
};

const KIND: CollectionKind = CollectionKind::OrderedMap;

///
/// OrderedMap
///

pub struct OrderedMap<K, V, S: HostStore = StableStore, C = CborCodec> {
    prefix: Prefix,
    adapter: Adapter<S>,
    index: Sequence<ByteBuf, S, C>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, S: HostStore, C> OrderedMap<K, V, S, C> {
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

        Self {
            prefix,
            adapter: Adapter::new(host),
            index,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn prefix(&self) -> &Prefix {
        &self.prefix
    }
}

impl<K, V, S, C> OrderedMap<K, V, S, C>
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

    // Binary search over the sorted key index. `Ok(slot)` when the probe is
    // stored, `Err(insertion point)` otherwise. O(log len) host reads.
    fn locate(&self, probe: &[u8], len: u64) -> Result<Result<u64, u64>, Error> {
        let mut lo = 0u64;
        let mut hi = len;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let stored = self.index.load_slot(mid)?;
            match stored.as_slice().cmp(probe) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(Ok(mid)),
            }
        }

        Ok(Err(lo))
    }

    fn key_at(&self, slot: u64) -> Result<K, Error> {
        decode_key::<K>(self.index.load_slot(slot)?.as_slice())
    }

    fn entry_at(&self, slot: u64) -> Result<(K, V), Error> {
        let key_bytes = self.index.load_slot(slot)?;
        let bytes = self
            .adapter
            .read(&self.entry_key_for(key_bytes.as_slice()))?
            .ok_or_else(|| {
                Error::index_desync(format!("sorted key has no payload at slot {slot}"))
            })?;

        Ok((decode_key::<K>(key_bytes.as_slice())?, decode_value::<C, V>(&bytes)?))
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

    /// Length of the companion key index, as a consistency cross-check.
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
        self.adapter
            .has(&self.entry_key_for(key.to_key_bytes().as_slice()))
    }

    /// Store `value` under `key`, keeping the key index sorted. A fresh key
    /// costs the binary search plus the index shift; an existing key only
    /// has its payload overwritten.
    pub fn set(&mut self, key: &K, value: &V) -> Result<(), Error> {
        let mut header = self.header()?;
        let key_bytes = key.to_key_bytes();
        let encoded = encode_value::<C, V>(value)?;

        match self.locate(key_bytes.as_slice(), header.len)? {
            Ok(_) => {
                self.adapter
                    .write(&self.entry_key_for(key_bytes.as_slice()), &encoded)?;
            }
            Err(slot) => {
                let tracked = ByteBuf::from(key_bytes.clone().into_vec());
                self.index.insert(slot, &tracked)?;
                self.adapter
                    .write(&self.entry_key_for(key_bytes.as_slice()), &encoded)?;
                header.len += 1;
            }
        }

        self.commit(header)
    }

    /// Store `value` under `key` and return the prior value.
    pub fn insert(&mut self, key: &K, value: &V) -> Result<Option<V>, Error> {
        let prior = self.get(key)?;
        self.set(key, value)?;

        Ok(prior)
    }

    /// Remove `key` and return its value, closing the index gap so the
    /// sorted order is preserved. Absence is `Ok(None)` and mutates nothing.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>, Error> {
        let mut header = self.header()?;
        let key_bytes = key.to_key_bytes();

        let Ok(slot) = self.locate(key_bytes.as_slice(), header.len)? else {
            return Ok(None);
        };

        let entry_key = self.entry_key_for(key_bytes.as_slice());
        let bytes = self.adapter.read(&entry_key)?.ok_or_else(|| {
            Error::index_desync(format!("sorted key has no payload at slot {slot}"))
        })?;
        let value = decode_value::<C, V>(&bytes)?;

        self.index.remove(slot)?;
        self.adapter.remove(&entry_key)?;

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

    /// Deep clear: removes every payload entry and the key index, and
    /// resets the length to zero. O(len) host calls.
    pub fn clear(&mut self) -> Result<(), Error> {
        let Some(mut header) = meta::load_header(&self.adapter, &self.prefix, KIND, C::VERSION)?
        else {
            return Ok(());
        };

        let tracked = self.index.len()?;
        for slot in 0..tracked {
            let key_bytes = self.index.load_slot(slot)?;
            self.adapter
                .remove(&self.entry_key_for(key_bytes.as_slice()))?;
        }

        self.index.clear()?;

        header.len = 0;
        self.commit(header)
    }

    /// Least stored key.
    pub fn min_key(&self) -> Result<K, Error> {
        let header = self.header()?;
        if header.len == 0 {
            return Err(Error::Empty);
        }

        self.key_at(0)
    }

    /// Greatest stored key.
    pub fn max_key(&self) -> Result<K, Error> {
        let header = self.header()?;
        if header.len == 0 {
            return Err(Error::Empty);
        }

        self.key_at(header.len - 1)
    }

    /// Greatest stored key `<= key`, if any.
    pub fn floor(&self, key: &K) -> Result<Option<K>, Error> {
        let header = self.header()?;

        match self.locate(key.to_key_bytes().as_slice(), header.len)? {
            Ok(slot) => self.key_at(slot).map(Some),
            Err(0) => Ok(None),
            Err(point) => self.key_at(point - 1).map(Some),
        }
    }

    /// Least stored key `>= key`, if any.
    pub fn ceiling(&self, key: &K) -> Result<Option<K>, Error> {
        let header = self.header()?;

        match self.locate(key.to_key_bytes().as_slice(), header.len)? {
            Ok(slot) => self.key_at(slot).map(Some),
            Err(point) if point == header.len => Ok(None),
            Err(point) => self.key_at(point).map(Some),
        }
    }

    /// Greatest stored key strictly `< key`, if any.
    pub fn lower(&self, key: &K) -> Result<Option<K>, Error> {
        let header = self.header()?;

        let point = match self.locate(key.to_key_bytes().as_slice(), header.len)? {
            Ok(slot) | Err(slot) => slot,
        };

        if point == 0 {
            Ok(None)
        } else {
            self.key_at(point - 1).map(Some)
        }
    }

    /// Least stored key strictly `> key`, if any.
    pub fn higher(&self, key: &K) -> Result<Option<K>, Error> {
        let header = self.header()?;

        let point = match self.locate(key.to_key_bytes().as_slice(), header.len)? {
            Ok(slot) => slot + 1,
            Err(point) => point,
        };

        if point >= header.len {
            Ok(None)
        } else {
            self.key_at(point).map(Some)
        }
    }

    /// Lazy ascending cursor over the keys inside `range`. Inverted or
    /// disjoint ranges yield an empty cursor, never an error;
    /// `range(..)` is exactly `keys()`.
    pub fn range<R>(&self, range: R) -> Result<RangeKeys<'_, K, V, S, C>, Error>
    where
        R: RangeBounds<K>,
    {
        let header = self.header()?;

        let start = match range.start_bound() {
            Bound::Unbounded => 0,
            Bound::Included(key) => {
                match self.locate(key.to_key_bytes().as_slice(), header.len)? {
                    Ok(slot) | Err(slot) => slot,
                }
            }
            Bound::Excluded(key) => {
                match self.locate(key.to_key_bytes().as_slice(), header.len)? {
                    Ok(slot) => slot + 1,
                    Err(point) => point,
                }
            }
        };
        let end = match range.end_bound() {
            Bound::Unbounded => header.len,
            Bound::Included(key) => {
                match self.locate(key.to_key_bytes().as_slice(), header.len)? {
                    Ok(slot) => slot + 1,
                    Err(point) => point,
                }
            }
            Bound::Excluded(key) => {
                match self.locate(key.to_key_bytes().as_slice(), header.len)? {
                    Ok(slot) | Err(slot) => slot,
                }
            }
        };

        Ok(RangeKeys {
            map: self,
            cursor: Cursor::with_range(start, end, header.generation),
        })
    }

    /// Lazy cursor over all keys in ascending order.
    pub fn keys(&self) -> Result<RangeKeys<'_, K, V, S, C>, Error> {
        self.range(..)
    }

    /// Lazy cursor over the values, in ascending key order.
    pub fn values(&self) -> Result<OrderedValues<'_, K, V, S, C>, Error> {
        let header = self.header()?;

        Ok(OrderedValues {
            map: self,
            cursor: Cursor::new(header.len, header.generation),
        })
    }

    /// Lazy cursor over `(key, value)` pairs, in ascending key order.
    pub fn iter(&self) -> Result<OrderedEntries<'_, K, V, S, C>, Error> {
        let header = self.header()?;

        Ok(OrderedEntries {
            map: self,
            cursor: Cursor::new(header.len, header.generation),
        })
    }
}

impl<K, V, S: HostStore, C> Clone for OrderedMap<K, V, S, C> {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            adapter: self.adapter.clone(),
            index: self.index.clone(),
            _marker: PhantomData,
        }
    }
}

///
/// RangeKeys
///

pub struct RangeKeys<'a, K, V, S: HostStore, C> {
    map: &'a OrderedMap<K, V, S, C>,
    cursor: Cursor,
}

impl<K, V, S, C> Iterator for RangeKeys<'_, K, V, S, C>
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
        let item = self.map.key_at(slot);
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
/// OrderedValues
///

pub struct OrderedValues<'a, K, V, S: HostStore, C> {
    map: &'a OrderedMap<K, V, S, C>,
    cursor: Cursor,
}

impl<K, V, S, C> Iterator for OrderedValues<'_, K, V, S, C>
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
        let item = self.map.entry_at(slot).map(|(_, value)| value);
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
/// OrderedEntries
///

pub struct OrderedEntries<'a, K, V, S: HostStore, C> {
    map: &'a OrderedMap<K, V, S, C>,
    cursor: Cursor,
}

impl<K, V, S, C> Iterator for OrderedEntries<'_, K, V, S, C>
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
        let item = self.map.entry_at(slot);
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
