//! Library-wide error model.
//!
//! Every fallible operation surfaces one of the [`Error`] discriminants
//! below; nothing is retried or swallowed inside the library. Boundary
//! modules keep their own focused error enums and convert inward.

use crate::{
    key::{KeyBytes, KeyDecodeError},
    meta::{CollectionKind, HeaderDecodeError},
    serialize::SerializeError,
    store::HostError,
};
use thiserror::Error as ThisError;

///
/// Error
///

#[derive(Debug, ThisError)]
pub enum Error {
    /// Sequence access past the current length.
    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: u64, len: u64 },

    /// `pop`/`min`/`max` on an empty collection.
    #[error("collection is empty")]
    Empty,

    /// Strict lookup of a key that is not present. Plain `get` reports
    /// absence as `Ok(None)` instead.
    #[error("key not present: {key}")]
    KeyAbsent { key: KeyBytes },

    /// The prefix already holds a collection of a different kind.
    #[error("prefix already holds a {found} (handle expects a {expected})")]
    KindMismatch {
        expected: CollectionKind,
        found: CollectionKind,
    },

    /// Value encoding failed before anything was written.
    #[error("value encoding failed: {0}")]
    Encode(#[source] SerializeError),

    /// Stored bytes failed to decode: corruption or schema drift, fatal to
    /// the operation.
    #[error("stored bytes failed to decode: {0}")]
    Decode(#[from] DecodeError),

    /// The collection mutated underneath a live iterator. Recoverable by
    /// restarting iteration.
    #[error("iterator invalidated: generation moved from {captured} to {current}")]
    Invalidated { captured: u64, current: u64 },

    /// Host storage failure, passed through untouched.
    #[error(transparent)]
    Host(#[from] HostError),
}

///
/// DecodeError
///
/// What exactly failed to decode. All variants indicate corrupted or
/// incompatible stored state, never caller input.
///

#[derive(Debug, ThisError)]
pub enum DecodeError {
    #[error("value payload: {0}")]
    Value(#[source] SerializeError),

    #[error("logical key: {0}")]
    Key(#[from] KeyDecodeError),

    #[error("metadata header: {0}")]
    Header(#[from] HeaderDecodeError),

    #[error("key index out of sync with entries: {message}")]
    IndexDesync { message: String },
}

impl Error {
    /// Classify an entry/key-index disagreement as stored-state corruption.
    pub(crate) fn index_desync(message: impl Into<String>) -> Self {
        Self::Decode(DecodeError::IndexDesync {
            message: message.into(),
        })
    }

    pub(crate) fn decode_value(source: SerializeError) -> Self {
        Self::Decode(DecodeError::Value(source))
    }

    pub(crate) fn decode_key(source: KeyDecodeError) -> Self {
        Self::Decode(DecodeError::Key(source))
    }
}

///
/// TESTS
///
