//! Single gateway between typed collections and the host store.
//!
//! Collections never call a [`HostStore`] directly. Routing every call
//! through one adapter keeps key discipline and traffic accounting in one
//! place, and makes the backing store substitutable at construction.

use crate::{
    error::Error,
    obs::{self, StorageOp},
    store::HostStore,
};

///
/// Adapter
///

#[derive(Clone, Debug)]
pub(crate) struct Adapter<S: HostStore> {
    host: S,
}

impl<S: HostStore> Adapter<S> {
    pub(crate) const fn new(host: S) -> Self {
        Self { host }
    }

    /// Load the payload stored at `key`, if any.
    pub(crate) fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        obs::record(StorageOp::Read);

        Ok(self.host.storage_read(key)?)
    }

    /// Store `value` at `key`. Returns whether a prior payload was present.
    pub(crate) fn write(&self, key: &[u8], value: &[u8]) -> Result<bool, Error> {
        obs::record(StorageOp::Write);

        Ok(self.host.storage_write(key, value)?)
    }

    /// Remove the payload at `key`. Returns whether one was present.
    pub(crate) fn remove(&self, key: &[u8]) -> Result<bool, Error> {
        obs::record(StorageOp::Remove);

        Ok(self.host.storage_remove(key)?)
    }

    /// Remove the payload at `key` and return it.
    pub(crate) fn take(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let Some(bytes) = self.read(key)? else {
            return Ok(None);
        };
        self.remove(key)?;

        Ok(Some(bytes))
    }

    /// Report whether a payload is stored at `key`.
    pub(crate) fn has(&self, key: &[u8]) -> Result<bool, Error> {
        obs::record(StorageOp::Contains);

        Ok(self.host.storage_has_key(key)?)
    }
}

///
/// TESTS
///
