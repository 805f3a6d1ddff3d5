//! Key-only store with lazy enumeration.
//!
//! Same shape as the iterable map with the payload fixed to the one-byte
//! presence marker: a key index records members in insertion order and a
//! reverse position map gives O(1) removal. Removal swap-removes in the key
//! index, so enumeration order is not preserved across removals.

use crate::{
    collections::{
        LookupMap, Sequence,
        codec::decode_key,
        cursor::Cursor,
        lookup_set::PRESENCE_MARKER,
    },
    error::Error,
    key::StorageKey,
    meta::{self, CollectionKind, Header},
    prefix::Prefix,
    serialize::{CborCodec, ValueCodec},
    store::{Adapter, HostStore, StableStore},
};
use serde_bytes::ByteBuf;
use std::marker::PhantomData;

const KIND: CollectionKind = CollectionKind::IterableSet;

///
/// IterableSet
///

pub struct IterableSet<K, S: HostStore = StableStore, C = CborCodec> {
    prefix: Prefix,
    adapter: Adapter<S>,
    index: Sequence<ByteBuf, S, C>,
    positions: LookupMap<ByteBuf, u64, S, C>,
    _marker: PhantomData<fn() -> (K, C)>,
}

impl<K, S: HostStore, C> IterableSet<K, S, C> {
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

impl<K, S, C> IterableSet<K, S, C>
where
    K: StorageKey,
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

    /// Length of the companion key index, as a consistency cross-check.
    pub fn index_len(&self) -> Result<u64, Error> {
        self.index.len()
    }

    pub fn contains(&self, key: &K) -> Result<bool, Error> {
        self.adapter
            .has(&self.entry_key_for(key.to_key_bytes().as_slice()))
    }

    /// Add `key`. Returns whether it was newly added.
    pub fn add(&mut self, key: &K) -> Result<bool, Error> {
        let mut header = self.header()?;
        let key_bytes = key.to_key_bytes();

        let was_present = self
            .adapter
            .write(&self.entry_key_for(key_bytes.as_slice()), &PRESENCE_MARKER)?;
        if !was_present {
            let tracked = ByteBuf::from(key_bytes.into_vec());
            self.positions.set(&tracked, &header.len)?;
            self.index.push(&tracked)?;
            header.len += 1;
        }
        self.commit(header)?;

        Ok(!was_present)
    }

    /// Remove `key`. Returns whether it was present; absence mutates
    /// nothing.
    pub fn remove(&mut self, key: &K) -> Result<bool, Error> {
        let mut header = self.header()?;
        let key_bytes = key.to_key_bytes();
        let entry_key = self.entry_key_for(key_bytes.as_slice());

        if !self.adapter.has(&entry_key)? {
            return Ok(false);
        }

        let tracked = ByteBuf::from(key_bytes.into_vec());
        let slot = self.positions.remove(&tracked)?.ok_or_else(|| {
            Error::index_desync(format!(
                "no position recorded for present member {}",
                key.to_key_bytes()
            ))
        })?;

        self.adapter.remove(&entry_key)?;
        self.index.swap_remove(slot)?;

        // The previously-last member now occupies `slot`; repoint it.
        let remaining = self.index.len()?;
        if slot < remaining {
            let moved = self.index.load_slot(slot)?;
            self.positions.set(&moved, &slot)?;
        }

        header.len = header.len.saturating_sub(1);
        self.commit(header)?;

        Ok(true)
    }

    /// Add every key from `keys`.
    pub fn extend<I>(&mut self, keys: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = K>,
    {
        for key in keys {
            self.add(&key)?;
        }

        Ok(())
    }

    /// Deep clear: removes every member marker, every position entry, the
    /// key index, and resets the length to zero. O(len) host calls.
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
            self.positions.remove_untracked(&key_bytes)?;
        }

        self.index.clear()?;
        self.positions.clear()?;

        header.len = 0;
        self.commit(header)
    }

    /// Lazy cursor over the members, in key-index order.
    pub fn iter(&self) -> Result<Members<'_, K, S, C>, Error> {
        let header = self.header()?;

        Ok(Members {
            set: self,
            cursor: Cursor::new(header.len, header.generation),
        })
    }

    fn tracked_member(&self, slot: u64) -> Result<K, Error> {
        let key_bytes = self.index.load_slot(slot)?;
        decode_key::<K>(key_bytes.as_slice())
    }
}

impl<K, S: HostStore, C> Clone for IterableSet<K, S, C> {
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
/// Members
///

pub struct Members<'a, K, S: HostStore, C> {
    set: &'a IterableSet<K, S, C>,
    cursor: Cursor,
}

impl<K, S, C> Iterator for Members<'_, K, S, C>
where
    K: StorageKey,
    S: HostStore,
    C: ValueCodec,
{
    type Item = Result<K, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_exhausted() {
            return None;
        }
        if let Some(err) = self.cursor.verify(self.set.current_generation()) {
            return Some(Err(err));
        }

        let slot = self.cursor.take_front();
        let item = self.set.tracked_member(slot);
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
