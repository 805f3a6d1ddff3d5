//! Per-collection metadata headers.
//!
//! Every collection keeps one fixed-width record at `prefix ‖ META_SEP`:
//! length, kind tag, generation counter, codec version. The layout is a
//! protocol invariant; it is encoded by hand rather than through the value
//! codec so headers stay readable across codec choices.

use crate::{
    error::{DecodeError, Error},
    prefix::Prefix,
    store::{Adapter, HostStore},
};
use derive_more::Display;
use thiserror::Error as ThisError;

///
/// HeaderDecodeError
/// (decode / corruption boundary)
///

#[derive(Debug, ThisError)]
pub enum HeaderDecodeError {
    #[error("header has wrong size: {len} bytes (expected {expected})")]
    SizeMismatch { len: usize, expected: usize },

    #[error("header carries unknown collection kind tag {tag:#04x}")]
    UnknownKind { tag: u8 },

    #[error("stored codec version {stored} is incompatible with handle codec version {expected}")]
    CodecVersion { stored: u16, expected: u16 },
}

///
/// CollectionKind
///
/// Immutable after first creation under a prefix: a header stored with one
/// kind refuses handles of any other kind.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum CollectionKind {
    #[display("sequence")]
    Sequence,

    #[display("lookup map")]
    LookupMap,

    #[display("lookup set")]
    LookupSet,

    #[display("iterable map")]
    IterableMap,

    #[display("iterable set")]
    IterableSet,

    #[display("ordered map")]
    OrderedMap,
}

impl CollectionKind {
    // ── Kind tags (DO NOT reorder) ───────────────────────────────────
    const TAG_SEQUENCE: u8 = 0;
    const TAG_LOOKUP_MAP: u8 = 1;
    const TAG_LOOKUP_SET: u8 = 2;
    const TAG_ITERABLE_MAP: u8 = 3;
    const TAG_ITERABLE_SET: u8 = 4;
    const TAG_ORDERED_MAP: u8 = 5;

    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Sequence => Self::TAG_SEQUENCE,
            Self::LookupMap => Self::TAG_LOOKUP_MAP,
            Self::LookupSet => Self::TAG_LOOKUP_SET,
            Self::IterableMap => Self::TAG_ITERABLE_MAP,
            Self::IterableSet => Self::TAG_ITERABLE_SET,
            Self::OrderedMap => Self::TAG_ORDERED_MAP,
        }
    }

    pub const fn try_from_tag(tag: u8) -> Result<Self, HeaderDecodeError> {
        match tag {
            Self::TAG_SEQUENCE => Ok(Self::Sequence),
            Self::TAG_LOOKUP_MAP => Ok(Self::LookupMap),
            Self::TAG_LOOKUP_SET => Ok(Self::LookupSet),
            Self::TAG_ITERABLE_MAP => Ok(Self::IterableMap),
            Self::TAG_ITERABLE_SET => Ok(Self::IterableSet),
            Self::TAG_ORDERED_MAP => Ok(Self::OrderedMap),
            _ => Err(HeaderDecodeError::UnknownKind { tag }),
        }
    }
}

///
/// Header
///
/// Layout (big-endian, fixed offsets):
/// `length: u64 ‖ kind: u8 ‖ generation: u64 ‖ codec-version: u16`.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Header {
    pub len: u64,
    pub kind: CollectionKind,
    pub generation: u64,
    pub codec_version: u16,
}

impl Header {
    /// Fixed serialized size in bytes (protocol invariant).
    /// DO NOT CHANGE without migration.
    pub(crate) const STORED_SIZE: usize = 8 + 1 + 8 + 2;

    const LEN_OFFSET: usize = 0;
    const KIND_OFFSET: usize = 8;
    const GENERATION_OFFSET: usize = 9;
    const CODEC_VERSION_OFFSET: usize = 17;

    /// Fresh header for a collection created by its first mutation.
    pub(crate) const fn new(kind: CollectionKind, codec_version: u16) -> Self {
        Self {
            len: 0,
            kind,
            generation: 0,
            codec_version,
        }
    }

    /// Advance the generation counter. Every mutation does this exactly once
    /// so live iterators can detect the change.
    pub(crate) const fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub(crate) fn to_bytes(self) -> [u8; Self::STORED_SIZE] {
        let mut buf = [0u8; Self::STORED_SIZE];
        buf[Self::LEN_OFFSET..Self::KIND_OFFSET].copy_from_slice(&self.len.to_be_bytes());
        buf[Self::KIND_OFFSET] = self.kind.tag();
        buf[Self::GENERATION_OFFSET..Self::CODEC_VERSION_OFFSET]
            .copy_from_slice(&self.generation.to_be_bytes());
        buf[Self::CODEC_VERSION_OFFSET..].copy_from_slice(&self.codec_version.to_be_bytes());
        buf
    }

    pub(crate) fn try_from_bytes(bytes: &[u8]) -> Result<Self, HeaderDecodeError> {
        if bytes.len() != Self::STORED_SIZE {
            return Err(HeaderDecodeError::SizeMismatch {
                len: bytes.len(),
                expected: Self::STORED_SIZE,
            });
        }

        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[Self::LEN_OFFSET..Self::KIND_OFFSET]);

        let kind = CollectionKind::try_from_tag(bytes[Self::KIND_OFFSET])?;

        let mut generation = [0u8; 8];
        generation.copy_from_slice(&bytes[Self::GENERATION_OFFSET..Self::CODEC_VERSION_OFFSET]);

        let mut codec_version = [0u8; 2];
        codec_version.copy_from_slice(&bytes[Self::CODEC_VERSION_OFFSET..]);

        Ok(Self {
            len: u64::from_be_bytes(len),
            kind,
            generation: u64::from_be_bytes(generation),
            codec_version: u16::from_be_bytes(codec_version),
        })
    }
}

/// Load a collection's header, enforcing the kind and codec-version guards.
///
/// `Ok(None)` means the collection has never been created (reads behave as
/// length 0). A stored kind other than `expected` is fatal: two differently
/// typed collections must never share a prefix.
pub(crate) fn load_header<S: HostStore>(
    adapter: &Adapter<S>,
    prefix: &Prefix,
    expected: CollectionKind,
    codec_version: u16,
) -> Result<Option<Header>, Error> {
    let Some(bytes) = adapter.read(&prefix.meta_key())? else {
        return Ok(None);
    };

    let header =
        Header::try_from_bytes(&bytes).map_err(|err| Error::Decode(DecodeError::Header(err)))?;

    if header.kind != expected {
        return Err(Error::KindMismatch {
            expected,
            found: header.kind,
        });
    }
    if header.codec_version != codec_version {
        return Err(Error::Decode(DecodeError::Header(
            HeaderDecodeError::CodecVersion {
                stored: header.codec_version,
                expected: codec_version,
            },
        )));
    }

    Ok(Some(header))
}

/// Peek at the kind stored under a prefix, without committing to a handle
/// type. `Ok(None)` when no collection has been created there. This is the
/// one header read that skips the kind guard; it exists so callers can
/// diagnose a `KindMismatch` or audit a namespace.
pub fn stored_kind<S: HostStore>(
    host: &S,
    prefix: &Prefix,
) -> Result<Option<CollectionKind>, Error> {
    let adapter = Adapter::new(host.clone());
    let Some(bytes) = adapter.read(&prefix.meta_key())? else {
        return Ok(None);
    };

    let header =
        Header::try_from_bytes(&bytes).map_err(|err| Error::Decode(DecodeError::Header(err)))?;

    Ok(Some(header.kind))
}

/// Persist a header in the same receipt as the payload change it describes.
pub(crate) fn store_header<S: HostStore>(
    adapter: &Adapter<S>,
    prefix: &Prefix,
    header: Header,
) -> Result<(), Error> {
    adapter.write(&prefix.meta_key(), &header.to_bytes())?;

    Ok(())
}

/// Drop a header outright (lookup-kind `clear`). Returns prior presence.
pub(crate) fn remove_header<S: HostStore>(
    adapter: &Adapter<S>,
    prefix: &Prefix,
) -> Result<bool, Error> {
    adapter.remove(&prefix.meta_key())
}

///
/// TESTS
///
