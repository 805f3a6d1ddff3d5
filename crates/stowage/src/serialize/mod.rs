mod cbor;

use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error as ThisError;

/// Generic CBOR serialization infrastructure.
///
/// This module is format-level only:
/// - No collection-layer constants or policy limits are defined here.
/// - Callers that need bounded decode must pass explicit limits.
/// - Engine-specific decode policy belongs in subsystem wrappers (for
///   example, `collections::codec`).

///
/// SerializeError
///

#[derive(Debug, ThisError)]
pub enum SerializeError {
    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("deserialize error: {0}")]
    Deserialize(String),

    #[error("deserialize size limit exceeded: {len} bytes (limit {max_bytes})")]
    DeserializeSizeLimitExceeded { len: usize, max_bytes: usize },
}

///
/// SerializeErrorKind
///
/// Stable error-kind taxonomy for serializer failures.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SerializeErrorKind {
    Serialize,
    Deserialize,
    DeserializeSizeLimitExceeded,
}

impl SerializeErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Serialize => "serialize",
            Self::Deserialize => "deserialize",
            Self::DeserializeSizeLimitExceeded => "deserialize_size_limit_exceeded",
        }
    }
}

impl fmt::Display for SerializeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SerializeError {
    /// Return a stable error kind independent of backend error-message text.
    #[must_use]
    pub const fn kind(&self) -> SerializeErrorKind {
        match self {
            Self::Serialize(_) => SerializeErrorKind::Serialize,
            Self::Deserialize(_) => SerializeErrorKind::Deserialize,
            Self::DeserializeSizeLimitExceeded { .. } => {
                SerializeErrorKind::DeserializeSizeLimitExceeded
            }
        }
    }
}

///
/// ValueCodec
///
/// Pluggable value serialization for collection payloads.
///
/// The codec version is persisted in every collection's metadata header and
/// checked on load, so a stored collection can never be silently reread
/// through an incompatible codec.
///

pub trait ValueCodec {
    /// Persisted format version, frozen per codec implementation.
    const VERSION: u16;

    fn encode<T>(value: &T) -> Result<Vec<u8>, SerializeError>
    where
        T: Serialize;

    fn decode<T>(bytes: &[u8]) -> Result<T, SerializeError>
    where
        T: DeserializeOwned;
}

///
/// CborCodec
///
/// Default codec: self-describing compact binary values via CBOR.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct CborCodec;

impl ValueCodec for CborCodec {
    const VERSION: u16 = 1;

    fn encode<T>(value: &T) -> Result<Vec<u8>, SerializeError>
    where
        T: Serialize,
    {
        cbor::serialize(value)
    }

    fn decode<T>(bytes: &[u8]) -> Result<T, SerializeError>
    where
        T: DeserializeOwned,
    {
        cbor::deserialize(bytes)
    }
}

/// Serialize a value using the default codec.
pub fn serialize<T>(value: &T) -> Result<Vec<u8>, SerializeError>
where
    T: Serialize,
{
    cbor::serialize(value)
}

/// Deserialize a value produced by [`serialize`].
pub fn deserialize<T>(bytes: &[u8]) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    cbor::deserialize(bytes)
}

/// Deserialize a value produced by [`serialize`], with an explicit size limit.
///
/// Size limits are caller policy, not serialization-format policy.
pub fn deserialize_bounded<T>(bytes: &[u8], max_bytes: usize) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    cbor::deserialize_bounded(bytes, max_bytes)
}
