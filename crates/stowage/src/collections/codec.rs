//! Collection-layer encode/decode policy.
//!
//! This is the only collection code allowed to call the `serialize` and
//! `key` format modules directly. Policy lives here: encode failures happen
//! before any write, decode failures on stored bytes are classified as
//! corruption-grade errors.

use crate::{
    error::Error,
    key::StorageKey,
    serialize::ValueCodec,
};
use serde::{Serialize, de::DeserializeOwned};

/// Encode one entry payload. Fails before anything observable is written.
pub(in crate::collections) fn encode_value<C, T>(value: &T) -> Result<Vec<u8>, Error>
where
    C: ValueCodec,
    T: Serialize,
{
    C::encode(value).map_err(Error::Encode)
}

/// Decode one persisted entry payload.
pub(in crate::collections) fn decode_value<C, T>(bytes: &[u8]) -> Result<T, Error>
where
    C: ValueCodec,
    T: DeserializeOwned,
{
    C::decode(bytes).map_err(Error::decode_value)
}

/// Decode one persisted logical key from its canonical bytes.
pub(in crate::collections) fn decode_key<K>(bytes: &[u8]) -> Result<K, Error>
where
    K: StorageKey,
{
    K::from_key_bytes(bytes).map_err(Error::decode_key)
}
