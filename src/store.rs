//! Key-store contract consumed by the tree walker.
//!
//! The trait mirrors an offline-registry enumeration API: keys are opened by
//! name relative to a parent, metadata is queried per key, and values are
//! fetched with a two-phase probe/fetch convention — the first call carries
//! no buffer and must answer [`StoreError::MoreData`] with the required byte
//! count; the second call carries a buffer of that size.  Handles are plain
//! values; dropping one closes it.

use crate::reader::ReadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Probe reply: the value exists and its data needs this many bytes.
    #[error("value data requires {0} bytes")]
    MoreData(u32),
    #[error("no item at index {0}")]
    NoMoreItems(u32),
    #[error("subkey '{0}' not found")]
    NotFound(String),
    #[error("corrupt cell at hive offset {offset:#x}: {reason}")]
    Corrupt { offset: u32, reason: String },
    #[error(transparent)]
    Read(#[from] ReadError),
}

/// Metadata for one open key.
#[derive(Debug, Clone, Copy)]
pub struct KeyInfo {
    pub subkey_count:    u32,
    pub value_count:     u32,
    /// Raw FILETIME; always present — a key without one is a corrupt key.
    pub last_write_time: u64,
}

/// Result of a successful value fetch.
#[derive(Debug, Clone)]
pub struct ValueInfo {
    /// Value name; empty for the default value.
    pub name:         String,
    pub type_code:    u32,
    pub data_len:     u32,
    /// False when the value carries no data cell at all; the caller's buffer
    /// is left empty in that case.
    pub data_present: bool,
}

pub trait KeyStore {
    type Key;

    /// Open the hive's root key.
    fn root_key(&mut self) -> Result<Self::Key, StoreError>;

    /// Open a subkey by name, relative to `parent`.
    fn open_key(&mut self, parent: &Self::Key, name: &str) -> Result<Self::Key, StoreError>;

    /// Subkey count, value count and last-write time for `key`.
    fn query_info(&mut self, key: &Self::Key) -> Result<KeyInfo, StoreError>;

    /// Name of the subkey at `index` (store enumeration order).
    fn enum_key(&mut self, key: &Self::Key, index: u32) -> Result<String, StoreError>;

    /// Two-phase value enumeration.  With `data: None` this is a size probe
    /// and must reply `Err(MoreData(len))` for every existing value index.
    /// With `data: Some(buf)` the buffer is cleared and filled with the
    /// value's bytes and the full [`ValueInfo`] is returned.
    fn enum_value(
        &mut self,
        key: &Self::Key,
        index: u32,
        data: Option<&mut Vec<u8>>,
    ) -> Result<ValueInfo, StoreError>;
}
