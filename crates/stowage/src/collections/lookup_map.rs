//! Non-iterable key/value store.
//!
//! Each logical key is canonically encoded and appended to the prefix; no
//! record of present keys is kept, which is what makes every operation O(1)
//! host traffic — and what makes `clear` shallow (see [`LookupMap::clear`]).

use crate::{
    collections::codec::{decode_value, encode_value},
    error::Error,
    key::StorageKey,
    meta::{self, CollectionKind, Header},
    prefix::Prefix,
    serialize::{CborCodec, ValueCodec},
    store::{Adapter, HostStore, StableStore},
};
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;

const KIND: CollectionKind = CollectionKind::LookupMap;

///
/// LookupMap
///

pub struct LookupMap<K, V, S: HostStore = StableStore, C = CborCodec> {
    prefix: Prefix,
    adapter: Adapter<S>,
    _marker: PhantomData<fn() -> (K, V, C)>,
}

impl<K, V, S: HostStore, C> LookupMap<K, V, S, C> {
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

impl<K, V, S, C> LookupMap<K, V, S, C>
where
    K: StorageKey,
    V: Serialize + DeserializeOwned,
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

    /// Count of present entries: successful `set`s minus successful removes.
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

    /// Load the value stored under `key`. Absence is `Ok(None)`, not an
    /// error. Touches only the payload slot.
    pub fn get(&self, key: &K) -> Result<Option<V>, Error> {
        self.adapter
            .read(&self.entry_key(key))?
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
        self.adapter.has(&self.entry_key(key))
    }

    /// Store `value` under `key`. The cheap write path: presence is learned
    /// from the write itself and the prior value is never read back.
    pub fn set(&mut self, key: &K, value: &V) -> Result<(), Error> {
        let mut header = self.header()?;
        let encoded = encode_value::<C, V>(value)?;

        let was_present = self.adapter.write(&self.entry_key(key), &encoded)?;
        if !was_present {
            header.len += 1;
        }
        self.commit(header)
    }

    /// Store `value` under `key` and return the prior value. One extra host
    /// read compared to [`LookupMap::set`].
    pub fn insert(&mut self, key: &K, value: &V) -> Result<Option<V>, Error> {
        let mut header = self.header()?;
        let entry_key = self.entry_key(key);

        let prior = self
            .adapter
            .read(&entry_key)?
            .map(|bytes| decode_value::<C, V>(&bytes))
            .transpose()?;

        let encoded = encode_value::<C, V>(value)?;
        self.adapter.write(&entry_key, &encoded)?;
        if prior.is_none() {
            header.len += 1;
        }
        self.commit(header)?;

        Ok(prior)
    }

    /// Remove `key` and return its value. Absence is `Ok(None)` and mutates
    /// nothing.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>, Error> {
        let mut header = self.header()?;
        let entry_key = self.entry_key(key);

        let Some(bytes) = self.adapter.read(&entry_key)? else {
            return Ok(None);
        };
        let value = decode_value::<C, V>(&bytes)?;

        self.adapter.remove(&entry_key)?;
        // Entries orphaned by a prior `clear` are not counted in `len`.
        header.len = header.len.saturating_sub(1);
        self.commit(header)?;

        Ok(Some(value))
    }

    /// Store every entry from `entries`.
    pub fn extend<I>(&mut self, entries: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut header = self.header()?;
        let mut touched = false;

        for (key, value) in entries {
            let encoded = encode_value::<C, V>(&value)?;
            let was_present = self.adapter.write(&self.entry_key(&key), &encoded)?;
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
    /// This does NOT touch payload entries: the kind is non-iterable, so the
    /// library cannot know which keys exist. Prior entries remain in host
    /// storage (and still answer `get`/`contains`) until rewritten through
    /// the same keys or removed explicitly — see
    /// [`LookupMap::drain_known_keys`] for the caller-driven deep clear.
    pub fn clear(&mut self) -> Result<(), Error> {
        meta::remove_header(&self.adapter, &self.prefix)?;

        Ok(())
    }

    /// Remove every entry named by `keys`; the caller supplies the key list
    /// the library does not track. Returns how many entries were removed.
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

    // Payload-only removal that bypasses length tracking. Deep clears of
    // composite collections use this to drop entries they enumerate
    // elsewhere.
    pub(in crate::collections) fn remove_untracked(&self, key: &K) -> Result<bool, Error> {
        self.adapter.remove(&self.entry_key(key))
    }
}

impl<K, V, S: HostStore, C> Clone for LookupMap<K, V, S, C> {
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
