//! Root-key recovery straight from the hive file bytes.
//!
//! The traversal needs the root key's name to seed every cell path, and a
//! hive does not store that name anywhere convenient — it lives inside the
//! first key-node record.  This module recovers it with nothing but fixed
//! byte-offset reads: no opened-hive API, no cell index.
//!
//! Offset scheme: a field-by-field sequential read of the declared record
//! layout (the self-describing variant), not a fixed-offset jump.  The walk
//! is: `regf` signature at 0 → `hbin` signature at 4096 → the remaining
//! 28 bytes of the bin header (bin offset, bin size, reserved, bin
//! timestamp, spare) → the first cell, assumed to hold the root key node:
//! cell size, `nk` signature, node flags (the hive-entry bit must be set),
//! FILETIME, fifteen u32 metadata fields, name length, class length, then
//! the name bytes themselves.
//!
//! Any mismatch is fatal to the caller: no XML is emitted before the root
//! key is resolved.

use crate::hive::{HBIN_SIGNATURE, KEY_COMP_NAME, KEY_HIVE_ENTRY, NK_SIGNATURE, REGF_SIGNATURE};
use crate::reader::{HiveCursor, ReadError};
use std::fs::File;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Longest key name a hive can hold.
const MAX_KEY_NAME: usize = 255;

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("cannot open hive file: {0}")]
    Open(#[source] io::Error),
    #[error("missing 'regf' signature at offset 0")]
    InvalidHiveSignature,
    #[error("missing 'hbin' signature at offset 4096")]
    InvalidBlockSignature,
    #[error("first cell of the first bin is not the root key node")]
    NotRootNode,
    #[error(transparent)]
    Read(#[from] ReadError),
}

/// The recovered root key.
#[derive(Debug, Clone)]
pub struct RootKeyInfo {
    pub name:            String,
    /// Raw FILETIME of the root key node.
    pub last_write_time: u64,
}

/// Validate the hive's container signatures and read the root key's name out
/// of the first key-node record.
pub fn locate_root_key(path: &Path) -> Result<RootKeyInfo, LocatorError> {
    let file = File::open(path).map_err(LocatorError::Open)?;
    let mut cur = HiveCursor::new(file);

    let magic = cur.read_bytes_at(0, 4)?;
    if magic != REGF_SIGNATURE {
        return Err(LocatorError::InvalidHiveSignature);
    }

    let bin_magic = cur.read_bytes_at(4096, 4)?;
    if bin_magic != HBIN_SIGNATURE {
        return Err(LocatorError::InvalidBlockSignature);
    }

    // Rest of the 32-byte bin header.
    let _bin_offset = cur.read_u32()?;
    let _bin_size = cur.read_u32()?;
    let _reserved = cur.read_u64()?;
    let _bin_timestamp = cur.read_u64()?;
    let _spare = cur.read_u32()?;

    // First cell: the root key node.
    let _cell_size = cur.read_i32()?;
    let node_sig = cur.read_u16()?;
    if node_sig != NK_SIGNATURE {
        return Err(LocatorError::NotRootNode);
    }
    let node_flags = cur.read_u16()?;
    if node_flags & KEY_HIVE_ENTRY == 0 {
        return Err(LocatorError::NotRootNode);
    }

    let last_write_time = cur.read_u64()?;

    // Fixed metadata run between the timestamp and the name fields.
    let _access_bits = cur.read_u32()?;
    let _parent_offset = cur.read_u32()?;
    let _subkey_count = cur.read_u32()?;
    let _volatile_subkey_count = cur.read_u32()?;
    let _subkey_list_offset = cur.read_u32()?;
    let _volatile_subkey_list_offset = cur.read_u32()?;
    let _value_count = cur.read_u32()?;
    let _value_list_offset = cur.read_u32()?;
    let _security_offset = cur.read_u32()?;
    let _class_offset = cur.read_u32()?;
    let _max_name_len = cur.read_u32()?;
    let _max_class_len = cur.read_u32()?;
    let _max_value_name_len = cur.read_u32()?;
    let _max_value_data_len = cur.read_u32()?;
    let _work_var = cur.read_u32()?;

    let name_len = cur.read_u16()? as usize;
    let _class_len = cur.read_u16()?;
    if name_len == 0 || name_len > MAX_KEY_NAME {
        return Err(LocatorError::NotRootNode);
    }

    let name_bytes = cur.read_bytes(name_len)?;
    let name = if node_flags & KEY_COMP_NAME != 0 {
        String::from_utf8_lossy(&name_bytes).into_owned()
    } else {
        let chars: Vec<u16> = name_bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&chars)
    };

    Ok(RootKeyInfo { name, last_write_time })
}
