//! Canonical, order-preserving byte encodings for logical keys.
//!
//! Every keyed collection addresses host storage through the encoding
//! produced here, and the ordered map's key index is sorted by these bytes
//! directly. The contract is therefore strict: for any two keys of the same
//! type, `a < b` exactly when `encode(a) < encode(b)` lexicographically.
//! Signed integers flip the sign bit so byte order matches numeric order;
//! text and byte strings are stored raw, so their byte order is their
//! lexicographic order.

use derive_more::Deref;
use serde_bytes::ByteBuf;
use std::fmt;
use thiserror::Error as ThisError;

///
/// KeyDecodeError
/// (decode / corruption boundary)
///

#[derive(Debug, ThisError)]
pub enum KeyDecodeError {
    #[error("key payload has wrong width: {len} bytes (expected {expected})")]
    WidthMismatch { len: usize, expected: usize },

    #[error("key payload is not valid utf-8")]
    Utf8,

    #[error("key payload is not a valid {kind} encoding")]
    Malformed { kind: &'static str },
}

///
/// KeyBytes
///
/// Owned canonical encoding of one logical key. This is the exact byte
/// suffix appended to a collection prefix, and the payload error variants
/// carry to identify the offending key.
///

#[derive(Clone, Debug, Default, Deref, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct KeyBytes(Vec<u8>);

impl KeyBytes {
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for KeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<Vec<u8>> for KeyBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

///
/// StorageKey
///
/// Canonical byte encoding for logical collection keys.
///
/// Invariants every implementation must uphold:
/// - Canonical: equal keys produce byte-equal encodings.
/// - Order-preserving: encoded byte order equals the type's `Ord`.
/// - Stable: no process-local state (addresses, hashes with random seeds).
///

pub trait StorageKey: Sized {
    /// Append this key's canonical bytes to `out`.
    fn write_key_bytes(&self, out: &mut Vec<u8>);

    /// Decode a key from its canonical bytes.
    fn from_key_bytes(bytes: &[u8]) -> Result<Self, KeyDecodeError>;

    /// Encode this key into owned canonical bytes.
    fn to_key_bytes(&self) -> KeyBytes {
        let mut out = Vec::new();
        self.write_key_bytes(&mut out);
        KeyBytes(out)
    }
}

// ── Fixed-width integer encodings ────────────────────────────────────

const fn ordered_i32_bytes(value: i32) -> [u8; 4] {
    let biased = value.cast_unsigned() ^ (1u32 << 31);
    biased.to_be_bytes()
}

const fn ordered_i64_bytes(value: i64) -> [u8; 8] {
    let biased = value.cast_unsigned() ^ (1u64 << 63);
    biased.to_be_bytes()
}

const fn ordered_i128_bytes(value: i128) -> [u8; 16] {
    let biased = value.cast_unsigned() ^ (1u128 << 127);
    biased.to_be_bytes()
}

fn fixed_width<const N: usize>(bytes: &[u8]) -> Result<[u8; N], KeyDecodeError> {
    <[u8; N]>::try_from(bytes).map_err(|_| KeyDecodeError::WidthMismatch {
        len: bytes.len(),
        expected: N,
    })
}

impl StorageKey for u32 {
    fn write_key_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, KeyDecodeError> {
        fixed_width::<4>(bytes).map(Self::from_be_bytes)
    }
}

impl StorageKey for u64 {
    fn write_key_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, KeyDecodeError> {
        fixed_width::<8>(bytes).map(Self::from_be_bytes)
    }
}

impl StorageKey for u128 {
    fn write_key_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, KeyDecodeError> {
        fixed_width::<16>(bytes).map(Self::from_be_bytes)
    }
}

impl StorageKey for i32 {
    fn write_key_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&ordered_i32_bytes(*self));
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, KeyDecodeError> {
        let raw = fixed_width::<4>(bytes).map(u32::from_be_bytes)?;
        Ok((raw ^ (1u32 << 31)).cast_signed())
    }
}

impl StorageKey for i64 {
    fn write_key_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&ordered_i64_bytes(*self));
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, KeyDecodeError> {
        let raw = fixed_width::<8>(bytes).map(u64::from_be_bytes)?;
        Ok((raw ^ (1u64 << 63)).cast_signed())
    }
}

impl StorageKey for i128 {
    fn write_key_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&ordered_i128_bytes(*self));
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, KeyDecodeError> {
        let raw = fixed_width::<16>(bytes).map(u128::from_be_bytes)?;
        Ok((raw ^ (1u128 << 127)).cast_signed())
    }
}

impl StorageKey for bool {
    fn write_key_bytes(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, KeyDecodeError> {
        match bytes {
            [0] => Ok(false),
            [1] => Ok(true),
            [_] => Err(KeyDecodeError::Malformed { kind: "bool" }),
            _ => Err(KeyDecodeError::WidthMismatch {
                len: bytes.len(),
                expected: 1,
            }),
        }
    }
}

// ── Variable-width encodings ─────────────────────────────────────────

impl StorageKey for String {
    fn write_key_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, KeyDecodeError> {
        std::str::from_utf8(bytes)
            .map(ToOwned::to_owned)
            .map_err(|_| KeyDecodeError::Utf8)
    }
}

impl StorageKey for Vec<u8> {
    fn write_key_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, KeyDecodeError> {
        Ok(bytes.to_vec())
    }
}

impl StorageKey for ByteBuf {
    fn write_key_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self, KeyDecodeError> {
        Ok(Self::from(bytes.to_vec()))
    }
}

///
/// TESTS
///
