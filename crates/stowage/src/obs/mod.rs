//! Storage-traffic accounting.
//!
//! The library emits no logs. What it does expose is a set of thread-local
//! saturating counters over the four host operations, so callers and tests
//! can account for the metered traffic a sequence of collection calls
//! produced. Counters are process-local diagnostics, never persisted.

mod metrics;

pub use metrics::{StorageOpReport, report, reset};

pub(crate) use metrics::{StorageOp, record};
