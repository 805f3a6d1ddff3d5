use std::cell::RefCell;

thread_local! {
    static STATE: RefCell<StorageOpReport> = const { RefCell::new(StorageOpReport::new()) };
}

///
/// StorageOp
/// One host-boundary operation, as recorded by the storage adapter.
///

#[derive(Clone, Copy, Debug)]
pub(crate) enum StorageOp {
    Read,
    Write,
    Remove,
    Contains,
}

///
/// StorageOpReport
/// Cumulative host-operation counts since the last reset.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StorageOpReport {
    pub reads: u64,
    pub writes: u64,
    pub removes: u64,
    pub contains_checks: u64,
}

impl StorageOpReport {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reads: 0,
            writes: 0,
            removes: 0,
            contains_checks: 0,
        }
    }

    /// Total host calls across all four operations.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.reads
            .saturating_add(self.writes)
            .saturating_add(self.removes)
            .saturating_add(self.contains_checks)
    }
}

/// Record one host-boundary operation.
pub(crate) fn record(op: StorageOp) {
    STATE.with_borrow_mut(|state| match op {
        StorageOp::Read => state.reads = state.reads.saturating_add(1),
        StorageOp::Write => state.writes = state.writes.saturating_add(1),
        StorageOp::Remove => state.removes = state.removes.saturating_add(1),
        StorageOp::Contains => {
            state.contains_checks = state.contains_checks.saturating_add(1);
        }
    });
}

/// Snapshot the current counters.
#[must_use]
pub fn report() -> StorageOpReport {
    STATE.with_borrow(|state| *state)
}

/// Reset all counters to zero.
pub fn reset() {
    STATE.with_borrow_mut(|state| *state = StorageOpReport::new());
}

///
/// TESTS
///
