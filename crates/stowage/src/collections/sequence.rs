//! Indexed, append-friendly persistent container.
//!
//! Slots live at `prefix ‖ ENTRY_SEP ‖ u64-be(index)` and are always exactly
//! `{0, 1, …, len-1}`: no holes. Append and pop touch one slot;
//! `swap_remove` trades observable order for O(1) middle removal; the
//! order-preserving `insert`/`remove` variants shift every subsequent slot
//! and are what the ordered map's key index builds on.

use crate::{
    collections::{
        codec::{decode_value, encode_value},
        cursor::Cursor,
    },
    error::Error,
    meta::{self, CollectionKind, Header},
    prefix::Prefix,
    serialize::{CborCodec, ValueCodec},
    store::{Adapter, HostStore, StableStore},
};
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;

const KIND: CollectionKind = CollectionKind::Sequence;

///
/// Sequence
///

pub struct Sequence<V, S: HostStore = StableStore, C = CborCodec> {
    prefix: Prefix,
    adapter: Adapter<S>,
    _marker: PhantomData<fn() -> (V, C)>,
}

impl<V, S: HostStore, C> Sequence<V, S, C> {
    /// Handle over the default host backend. Allocates nothing; the
    /// collection itself is created by its first mutation.
    #[must_use]
    pub fn new(prefix: Prefix) -> Self
    where
        S: Default,
    {
        Self::with_host(prefix, S::default())
    }

    /// Handle over an explicit host backend.
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

impl<V, S, C> Sequence<V, S, C>
where
    V: Serialize + DeserializeOwned,
    S: HostStore,
    C: ValueCodec,
{
    fn slot_key(&self, index: u64) -> Vec<u8> {
        self.prefix.entry_key(&index.to_be_bytes())
    }

    // Stored header, or a fresh one for a collection that does not exist
    // yet. Mutators persist it back (creating the collection); readers drop
    // it unwritten.
    fn header(&self) -> Result<Header, Error> {
        Ok(meta::load_header(&self.adapter, &self.prefix, KIND, C::VERSION)?
            .unwrap_or(Header::new(KIND, C::VERSION)))
    }

    fn commit(&self, mut header: Header) -> Result<(), Error> {
        header.bump();
        meta::store_header(&self.adapter, &self.prefix, header)
    }

    // Raw slot bytes. A missing slot below the recorded length is stored
    // state out of sync with the header.
    fn slot_bytes(&self, index: u64) -> Result<Vec<u8>, Error> {
        self.adapter
            .read(&self.slot_key(index))?
            .ok_or_else(|| Error::index_desync(format!("sequence slot {index} is missing")))
    }

    pub(in crate::collections) fn load_slot(&self, index: u64) -> Result<V, Error> {
        decode_value::<C, V>(&self.slot_bytes(index)?)
    }

    pub(in crate::collections) fn current_generation(&self) -> Result<u64, Error> {
        Ok(
            meta::load_header(&self.adapter, &self.prefix, KIND, C::VERSION)?
                .map_or(0, |header| header.generation),
        )
    }

    /// Number of stored values.
    pub fn len(&self) -> Result<u64, Error> {
        self.header().map(|header| header.len)
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Mutation counter, for caller-side diagnostics.
    pub fn generation(&self) -> Result<u64, Error> {
        self.current_generation()
    }

    /// Load the value at `index`.
    pub fn get(&self, index: u64) -> Result<V, Error> {
        let header = self.header()?;
        if index >= header.len {
            return Err(Error::OutOfRange {
                index,
                len: header.len,
            });
        }

        self.load_slot(index)
    }

    pub fn first(&self) -> Result<Option<V>, Error> {
        let header = self.header()?;
        if header.len == 0 {
            return Ok(None);
        }

        self.load_slot(0).map(Some)
    }

    pub fn last(&self) -> Result<Option<V>, Error> {
        let header = self.header()?;
        if header.len == 0 {
            return Ok(None);
        }

        self.load_slot(header.len - 1).map(Some)
    }

    /// Overwrite the value at `index`.
    pub fn set(&mut self, index: u64, value: &V) -> Result<(), Error> {
        let header = self.header()?;
        if index >= header.len {
            return Err(Error::OutOfRange {
                index,
                len: header.len,
            });
        }

        let encoded = encode_value::<C, V>(value)?;
        self.adapter.write(&self.slot_key(index), &encoded)?;
        self.commit(header)
    }

    /// Overwrite the value at `index` and return the prior value.
    pub fn replace(&mut self, index: u64, value: &V) -> Result<V, Error> {
        let header = self.header()?;
        if index >= header.len {
            return Err(Error::OutOfRange {
                index,
                len: header.len,
            });
        }

        let prior = self.load_slot(index)?;
        let encoded = encode_value::<C, V>(value)?;
        self.adapter.write(&self.slot_key(index), &encoded)?;
        self.commit(header)?;

        Ok(prior)
    }

    /// Append a value at the end. One slot write.
    pub fn push(&mut self, value: &V) -> Result<(), Error> {
        let mut header = self.header()?;
        let encoded = encode_value::<C, V>(value)?;

        self.adapter.write(&self.slot_key(header.len), &encoded)?;
        header.len += 1;
        self.commit(header)
    }

    /// Append every value from `values`.
    pub fn extend<I>(&mut self, values: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = V>,
    {
        let mut header = self.header()?;
        let mut appended = false;

        for value in values {
            let encoded = encode_value::<C, V>(&value)?;
            self.adapter.write(&self.slot_key(header.len), &encoded)?;
            header.len += 1;
            appended = true;
        }

        if appended {
            self.commit(header)?;
        }

        Ok(())
    }

    /// Remove and return the last value.
    pub fn pop(&mut self) -> Result<V, Error> {
        let mut header = self.header()?;
        if header.len == 0 {
            return Err(Error::Empty);
        }

        let last = header.len - 1;
        let value = self.load_slot(last)?;
        self.adapter.remove(&self.slot_key(last))?;
        header.len = last;
        self.commit(header)?;

        Ok(value)
    }

    /// Remove the value at `index` by moving the last value into its slot.
    ///
    /// O(1) host traffic, but observable order changes; at the last index
    /// this is exactly `pop`. Use [`Sequence::remove`] to preserve order.
    pub fn swap_remove(&mut self, index: u64) -> Result<V, Error> {
        let mut header = self.header()?;
        if index >= header.len {
            return Err(Error::OutOfRange {
                index,
                len: header.len,
            });
        }

        let last = header.len - 1;
        let removed = self.load_slot(index)?;

        if index == last {
            self.adapter.remove(&self.slot_key(last))?;
        } else {
            let moved = self
                .adapter
                .take(&self.slot_key(last))?
                .ok_or_else(|| Error::index_desync(format!("sequence slot {last} is missing")))?;
            self.adapter.write(&self.slot_key(index), &moved)?;
        }

        header.len = last;
        self.commit(header)?;

        Ok(removed)
    }

    /// Insert at `index`, shifting every subsequent slot one to the right.
    /// O(len - index) host writes; `index == len` appends.
    pub fn insert(&mut self, index: u64, value: &V) -> Result<(), Error> {
        let mut header = self.header()?;
        if index > header.len {
            return Err(Error::OutOfRange {
                index,
                len: header.len,
            });
        }

        let encoded = encode_value::<C, V>(value)?;

        let mut slot = header.len;
        while slot > index {
            let moved = self.slot_bytes(slot - 1)?;
            self.adapter.write(&self.slot_key(slot), &moved)?;
            slot -= 1;
        }

        self.adapter.write(&self.slot_key(index), &encoded)?;
        header.len += 1;
        self.commit(header)
    }

    /// Remove at `index`, shifting every subsequent slot one to the left.
    /// O(len - index) host writes. Order-preserving.
    pub fn remove(&mut self, index: u64) -> Result<V, Error> {
        let mut header = self.header()?;
        if index >= header.len {
            return Err(Error::OutOfRange {
                index,
                len: header.len,
            });
        }

        let removed = self.load_slot(index)?;

        for slot in index + 1..header.len {
            let moved = self.slot_bytes(slot)?;
            self.adapter.write(&self.slot_key(slot - 1), &moved)?;
        }

        self.adapter.remove(&self.slot_key(header.len - 1))?;
        header.len -= 1;
        self.commit(header)?;

        Ok(removed)
    }

    /// Remove every slot and reset the length to zero. O(len) host calls.
    /// A collection that was never created stays untouched.
    pub fn clear(&mut self) -> Result<(), Error> {
        let Some(mut header) = meta::load_header(&self.adapter, &self.prefix, KIND, C::VERSION)?
        else {
            return Ok(());
        };

        for index in 0..header.len {
            self.adapter.remove(&self.slot_key(index))?;
        }

        header.len = 0;
        self.commit(header)
    }

    /// Lazy cursor over the values in index order. One host read per step;
    /// mutating the sequence mid-iteration fails the next step with
    /// [`Error::Invalidated`].
    pub fn iter(&self) -> Result<SeqIter<'_, V, S, C>, Error> {
        let header = self.header()?;

        Ok(SeqIter {
            seq: self,
            cursor: Cursor::new(header.len, header.generation),
        })
    }

    /// Materialize every value. The one operation that deliberately loads
    /// the whole collection; everything else stays incremental.
    pub fn to_vec(&self) -> Result<Vec<V>, Error> {
        self.iter()?.collect()
    }
}

impl<V, S: HostStore, C> Clone for Sequence<V, S, C> {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            adapter: self.adapter.clone(),
            _marker: PhantomData,
        }
    }
}

///
/// SeqIter
///

pub struct SeqIter<'a, V, S: HostStore, C> {
    seq: &'a Sequence<V, S, C>,
    cursor: Cursor,
}

impl<V, S, C> Iterator for SeqIter<'_, V, S, C>
where
    V: Serialize + DeserializeOwned,
    S: HostStore,
    C: ValueCodec,
{
    type Item = Result<V, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_exhausted() {
            return None;
        }
        if let Some(err) = self.cursor.verify(self.seq.current_generation()) {
            return Some(Err(err));
        }

        let index = self.cursor.take_front();
        let item = self.seq.load_slot(index);
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

impl<V, S, C> DoubleEndedIterator for SeqIter<'_, V, S, C>
where
    V: Serialize + DeserializeOwned,
    S: HostStore,
    C: ValueCodec,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.cursor.is_exhausted() {
            return None;
        }
        if let Some(err) = self.cursor.verify(self.seq.current_generation()) {
            return Some(Err(err));
        }

        let index = self.cursor.take_back();
        let item = self.seq.load_slot(index);
        if item.is_err() {
            self.cursor.fuse();
        }

        Some(item)
    }
}

///
/// TESTS
///
