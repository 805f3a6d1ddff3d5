//! Stable-memory backend for the flat store.
//!
//! One stable BTreeMap holds every `(composed key, payload)` pair. The map
//! is initialized lazily on first access from a dedicated virtual memory, so
//! constructing handles allocates nothing.

use crate::store::{HostError, HostStore, MAX_KEY_BYTES, MAX_VALUE_BYTES};
use canic_cdk::structures::{
    BTreeMap, DefaultMemoryImpl, Storable,
    memory::{MemoryId, VirtualMemory},
    storable::Bound,
};
use canic_memory::manager::MEMORY_MANAGER;
use std::{borrow::Cow, cell::RefCell};

/// Memory id reserved for the flat store. Embedders sharing the memory
/// manager must keep this id free.
const FLAT_STORE_MEMORY_ID: u8 = 0;

///
/// RawStorageKey
/// Bounded composed-key bytes as stored in the stable map.
///

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
struct RawStorageKey(Vec<u8>);

impl Storable for RawStorageKey {
    fn to_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.0)
    }

    fn from_bytes(bytes: Cow<'_, [u8]>) -> Self {
        Self(bytes.into_owned())
    }

    fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: MAX_KEY_BYTES as u32,
        is_fixed_size: false,
    };
}

///
/// RawEntryPayload
/// Bounded entry payload bytes as stored in the stable map.
///

#[derive(Clone, Debug, Eq, PartialEq)]
struct RawEntryPayload(Vec<u8>);

impl Storable for RawEntryPayload {
    fn to_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.0)
    }

    fn from_bytes(bytes: Cow<'_, [u8]>) -> Self {
        Self(bytes.into_owned())
    }

    fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: MAX_VALUE_BYTES as u32,
        is_fixed_size: false,
    };
}

type FlatMap = BTreeMap<RawStorageKey, RawEntryPayload, VirtualMemory<DefaultMemoryImpl>>;

thread_local! {
    static FLAT_STORE: RefCell<Option<FlatMap>> = const { RefCell::new(None) };
}

// Lazily initialize and access the backing stable map.
fn with_flat_store<R>(f: impl FnOnce(&mut FlatMap) -> R) -> R {
    FLAT_STORE.with(|cell| {
        if cell.borrow().is_none() {
            let memory = MEMORY_MANAGER
                .with_borrow_mut(|mgr| mgr.get(MemoryId::new(FLAT_STORE_MEMORY_ID)));
            *cell.borrow_mut() = Some(BTreeMap::init(memory));
        }
        let mut guard = cell.borrow_mut();
        let store = guard.as_mut().expect("flat store missing after init");
        f(store)
    })
}

fn checked_key(key: &[u8]) -> Result<RawStorageKey, HostError> {
    if key.len() > MAX_KEY_BYTES {
        return Err(HostError::KeyTooLarge {
            len: key.len(),
            max: MAX_KEY_BYTES,
        });
    }

    Ok(RawStorageKey(key.to_vec()))
}

///
/// StableStore
///
/// Zero-sized handle over the thread-local stable map. Cloning is free and
/// every clone aliases the same storage, matching the ambient host model.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct StableStore;

impl StableStore {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HostStore for StableStore {
    fn storage_read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HostError> {
        let key = checked_key(key)?;

        Ok(with_flat_store(|store| store.get(&key)).map(|payload| payload.0))
    }

    fn storage_write(&self, key: &[u8], value: &[u8]) -> Result<bool, HostError> {
        let key = checked_key(key)?;
        if value.len() > MAX_VALUE_BYTES {
            return Err(HostError::ValueTooLarge {
                len: value.len(),
                max: MAX_VALUE_BYTES,
            });
        }

        let prior = with_flat_store(|store| store.insert(key, RawEntryPayload(value.to_vec())));

        Ok(prior.is_some())
    }

    fn storage_remove(&self, key: &[u8]) -> Result<bool, HostError> {
        let key = checked_key(key)?;

        Ok(with_flat_store(|store| store.remove(&key)).is_some())
    }

    fn storage_has_key(&self, key: &[u8]) -> Result<bool, HostError> {
        let key = checked_key(key)?;

        Ok(with_flat_store(|store| store.get(&key)).is_some())
    }
}
