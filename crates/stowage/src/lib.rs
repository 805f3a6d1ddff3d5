//! Persistent collections for flat byte-keyed contract storage.
//!
//! The host gives contracts exactly four durable primitives — read, write,
//! remove, and has-key over arbitrary byte keys — and charges for every one
//! of them. This crate layers map, set, sequence, and ordered-map
//! abstractions on top, keeping every operation incremental: entries load
//! one at a time, iteration is an explicit lazy cursor, and nothing
//! materializes a whole collection unless the caller asks for it.
//!
//! Each collection owns the key space under its [`prefix::Prefix`] and keeps
//! a small metadata header (length, kind, generation, codec version) beside
//! its entries. Handles are cheap value types: constructing one touches no
//! storage, and the collection itself comes into existence on its first
//! mutation. The backing store is chosen per handle — stable memory in a
//! deployed canister, an in-memory fake host in tests — and both run the
//! identical collection code.
#![warn(unreachable_pub)]

pub mod collections;
pub mod error;
pub mod key;
pub mod meta;
pub mod obs;
pub mod prefix;
pub mod serialize;
pub mod store;

///
/// Prelude
///
/// The vocabulary most contracts need: the collection kinds, the prefix
/// type, the key/codec traits, and the backends.
///

pub mod prelude {
    pub use crate::{
        collections::{
            IterableMap, IterableSet, LookupMap, LookupSet, OrderedMap, Sequence,
        },
        error::Error,
        key::StorageKey,
        meta::CollectionKind,
        prefix::Prefix,
        serialize::{CborCodec, ValueCodec},
        store::{HostStore, MemoryStore, StableStore},
    };
}
