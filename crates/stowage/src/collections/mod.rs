//! The collection kinds.
//!
//! Every handle here is a cheap value type over `(prefix, host backend,
//! codec)`; holding one allocates no host resources. Collections come into
//! existence on their first mutation and keep all durable state — length,
//! kind, generation, payload — in host storage, so any number of handles can
//! be rebuilt over the same prefix across invocations.

pub(crate) mod codec;
pub(crate) mod cursor;

mod iterable_map;
mod iterable_set;
mod lookup_map;
mod lookup_set;
mod ordered_map;
mod sequence;

#[cfg(test)]
mod tests;

pub use iterable_map::{Entries, IterableMap, Keys, Values};
pub use iterable_set::{IterableSet, Members};
pub use lookup_map::LookupMap;
pub use lookup_set::LookupSet;
pub use ordered_map::{OrderedEntries, OrderedMap, OrderedValues, RangeKeys};
pub use sequence::{SeqIter, Sequence};
