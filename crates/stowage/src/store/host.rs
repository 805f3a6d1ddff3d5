use thiserror::Error as ThisError;

///
/// HostError
///
/// Failure at the host storage boundary. These pass through the library
/// untouched; a mutation that fails here must abort the enclosing receipt.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum HostError {
    #[error("storage key exceeds host limit: {len} bytes (limit {max})")]
    KeyTooLarge { len: usize, max: usize },

    #[error("storage value exceeds host limit: {len} bytes (limit {max})")]
    ValueTooLarge { len: usize, max: usize },

    #[error("host storage failure: {message}")]
    Backend { message: String },
}

///
/// HostStore
///
/// The four storage primitives the host provides, and nothing else: no
/// ordering, no iteration, no range reads. Handles are cheap value types;
/// cloning one must alias the same underlying store.
///

pub trait HostStore: Clone {
    /// Load the value stored at `key`, if any.
    fn storage_read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HostError>;

    /// Store `value` at `key`, overwriting any prior value.
    /// Returns whether a prior value was present.
    fn storage_write(&self, key: &[u8], value: &[u8]) -> Result<bool, HostError>;

    /// Remove the value stored at `key`.
    /// Returns whether a prior value was present.
    fn storage_remove(&self, key: &[u8]) -> Result<bool, HostError>;

    /// Report whether a value is stored at `key`.
    fn storage_has_key(&self, key: &[u8]) -> Result<bool, HostError>;
}
