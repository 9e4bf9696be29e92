//! On-disk registry hive parsing.
//!
//! This is the built-in [`KeyStore`]: it serves the tree walker directly from
//! the raw hive file, no registry API involved.
//!
//! On-disk layout:
//! ```text
//! +0x0000  base block ("regf" signature, 4096 bytes)
//!   +0x0000  signature "regf"
//!   +0x0004  primary sequence number (u32)
//!   +0x0008  secondary sequence number (u32)
//!   +0x0024  root cell offset (u32, relative to hive data)
//!   +0x0028  hive data length (u32)
//! +0x1000  first bin ("hbin" signature), then further bins
//!   +0x0000  signature "hbin"
//!   +0x0004  bin offset (u32)
//!   +0x0008  bin size (u32)
//!   then cells: |size (i32, negative = allocated)|data...|
//!     "nk" — key node         "vk" — key value
//!     "lf"/"lh" — fast leaf   "li" — leaf index   "ri" — index root
//! ```
//! Cell offsets are relative to the hive data area (file offset 4096).
//! A corrupt cell fails only the operation that touched it; the rest of the
//! hive stays reachable.

use crate::reader::HiveCursor;
use crate::store::{KeyInfo, KeyStore, StoreError, ValueInfo};
use byteorder::{ByteOrder, LittleEndian};
use std::fs::File;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

// ── Constants ────────────────────────────────────────────────────────────────

pub const REGF_SIGNATURE: &[u8; 4] = b"regf";
pub const HBIN_SIGNATURE: &[u8; 4] = b"hbin";

pub const NK_SIGNATURE: u16 = 0x6B6E; // "nk" little-endian
pub const VK_SIGNATURE: u16 = 0x6B76; // "vk" little-endian
const LF_SIGNATURE: u16 = 0x666C; // "lf"
const LH_SIGNATURE: u16 = 0x686C; // "lh"
const RI_SIGNATURE: u16 = 0x6972; // "ri"
const LI_SIGNATURE: u16 = 0x696C; // "li"

/// The base block is always 4096 bytes; hive data starts right after it.
pub const HBASE_BLOCK_SIZE: u64 = 4096;

const REGF_ROOT_CELL: usize = 0x24;
const REGF_HIVE_LENGTH: usize = 0x28;

// NK field offsets relative to the "nk" signature.
const NK_FLAGS: usize = 2;
const NK_TIMESTAMP: usize = 4;
const NK_SUBKEY_COUNT: usize = 20;
const NK_SUBKEY_LIST: usize = 28;
const NK_VALUE_COUNT: usize = 36;
const NK_VALUE_LIST: usize = 40;
const NK_NAME_LENGTH: usize = 72;
const NK_NAME_START: usize = 76;

/// NK flag: root key of the hive.
pub const KEY_HIVE_ENTRY: u16 = 0x0004;
/// NK flag: name stored as ASCII, not UTF-16LE.
pub const KEY_COMP_NAME: u16 = 0x0020;

// VK field offsets relative to the "vk" signature.
const VK_NAME_LENGTH: usize = 2;
const VK_DATA_LENGTH: usize = 4;
const VK_DATA_OFFSET: usize = 8;
const VK_TYPE: usize = 12;
const VK_FLAGS: usize = 16;
const VK_NAME_START: usize = 20;

/// VK flag: value name stored as ASCII.
const VALUE_COMP_NAME: u16 = 0x0001;

/// Data length bit 31: data lives inline in the data-offset field.
const VK_DATA_RESIDENT: u32 = 0x8000_0000;

const NO_CELL: u32 = 0xFFFF_FFFF;
/// Caps against corrupt records claiming absurd sizes.
const MAX_LIST_COUNT: usize = 10_000;
const MAX_VALUE_DATA: usize = 1024 * 1024;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum HiveError {
    #[error("cannot open hive file: {0}")]
    Open(#[source] io::Error),
    #[error("missing 'regf' signature at offset 0")]
    InvalidSignature,
    #[error("hive header rejected: {0}")]
    BadHeader(String),
    #[error("root cell is not a key node")]
    BadRootNode,
    #[error(transparent)]
    Read(#[from] crate::reader::ReadError),
}

// ── Hive file ────────────────────────────────────────────────────────────────

/// Opaque handle to one key: the offset of its NK cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHandle {
    cell: u32,
}

/// A parsed key node.
#[derive(Debug, Clone)]
struct KeyNode {
    timestamp:    u64,
    subkey_count: u32,
    subkey_list:  u32,
    value_count:  u32,
    value_list:   u32,
    name:         String,
}

/// An open hive file, validated on construction.
pub struct HiveFile {
    cursor:      HiveCursor<File>,
    hive_length: u32,
    root_cell:   u32,
}

impl HiveFile {
    /// Open and validate a hive.  Checks the `regf` signature, the header's
    /// root-cell/length sanity and that the root cell is an NK record.
    pub fn open(path: &Path) -> Result<Self, HiveError> {
        let file = File::open(path).map_err(HiveError::Open)?;
        let mut cursor = HiveCursor::new(file);

        let header = cursor.read_bytes_at(0, HBASE_BLOCK_SIZE as usize)?;
        if &header[0..4] != REGF_SIGNATURE {
            return Err(HiveError::InvalidSignature);
        }

        let seq1 = LittleEndian::read_u32(&header[4..8]);
        let seq2 = LittleEndian::read_u32(&header[8..12]);
        if seq1 != seq2 {
            // Dirty hive; contents are still readable, the tail may be stale.
            debug!("hive sequence numbers differ ({seq1} != {seq2})");
        }

        let root_cell = LittleEndian::read_u32(&header[REGF_ROOT_CELL..REGF_ROOT_CELL + 4]);
        let hive_length = LittleEndian::read_u32(&header[REGF_HIVE_LENGTH..REGF_HIVE_LENGTH + 4]);
        if hive_length == 0 || root_cell >= hive_length {
            return Err(HiveError::BadHeader(format!(
                "root cell {root_cell:#x} outside hive data length {hive_length:#x}"
            )));
        }

        let mut hive = Self { cursor, hive_length, root_cell };

        // Root cell must carry the NK signature.
        let probe = hive
            .read_cell(root_cell, 6)
            .map_err(|_| HiveError::BadRootNode)?;
        if LittleEndian::read_u16(&probe[4..6]) != NK_SIGNATURE {
            return Err(HiveError::BadRootNode);
        }

        Ok(hive)
    }

    pub fn hive_length(&self) -> u32 {
        self.hive_length
    }

    /// Read `len` bytes of a cell, size prefix included.  Offsets are
    /// relative to the hive data area and bounds-checked against the
    /// declared hive length.
    fn read_cell(&mut self, cell: u32, len: usize) -> Result<Vec<u8>, StoreError> {
        if cell == NO_CELL || cell as u64 >= self.hive_length as u64 {
            return Err(StoreError::Corrupt {
                offset: cell,
                reason: format!("cell offset exceeds hive length {:#x}", self.hive_length),
            });
        }
        let bytes = self.cursor.read_bytes_at(HBASE_BLOCK_SIZE + cell as u64, len)?;
        Ok(bytes)
    }

    /// Parse the NK record at `cell`.
    fn read_key_node(&mut self, cell: u32) -> Result<KeyNode, StoreError> {
        // Cell: i32 size | u16 sig | fixed fields up to the name.
        let head = self.read_cell(cell, 4 + NK_NAME_START)?;
        let nk = &head[4..];

        if LittleEndian::read_u16(&nk[0..2]) != NK_SIGNATURE {
            return Err(StoreError::Corrupt {
                offset: cell,
                reason: format!("expected 'nk' signature, got {}", hex::encode(&nk[0..2])),
            });
        }

        let flags = LittleEndian::read_u16(&nk[NK_FLAGS..NK_FLAGS + 2]);
        let timestamp = LittleEndian::read_u64(&nk[NK_TIMESTAMP..NK_TIMESTAMP + 8]);
        let subkey_count = LittleEndian::read_u32(&nk[NK_SUBKEY_COUNT..NK_SUBKEY_COUNT + 4]);
        let subkey_list = LittleEndian::read_u32(&nk[NK_SUBKEY_LIST..NK_SUBKEY_LIST + 4]);
        let value_count = LittleEndian::read_u32(&nk[NK_VALUE_COUNT..NK_VALUE_COUNT + 4]);
        let value_list = LittleEndian::read_u32(&nk[NK_VALUE_LIST..NK_VALUE_LIST + 4]);
        let name_len = LittleEndian::read_u16(&nk[NK_NAME_LENGTH..NK_NAME_LENGTH + 2]) as usize;

        let name = if name_len > 0 {
            let full = self.read_cell(cell, 4 + NK_NAME_START + name_len)?;
            decode_name(&full[4 + NK_NAME_START..], flags & KEY_COMP_NAME != 0)
        } else {
            String::new()
        };

        Ok(KeyNode {
            timestamp,
            subkey_count,
            subkey_list,
            value_count,
            value_list,
            name,
        })
    }

    /// Read a subkey list cell and return the child NK offsets, flattening
    /// `ri` index roots recursively.
    fn read_subkey_offsets(&mut self, list_cell: u32) -> Result<Vec<u32>, StoreError> {
        let head = self.read_cell(list_cell, 4 + 4)?;
        let sig = LittleEndian::read_u16(&head[4..6]);
        let count = LittleEndian::read_u16(&head[6..8]) as usize;

        if count > MAX_LIST_COUNT {
            return Err(StoreError::Corrupt {
                offset: list_cell,
                reason: format!("subkey list count {count} is unreasonably large"),
            });
        }

        match sig {
            LF_SIGNATURE | LH_SIGNATURE => {
                // Entries: u32 offset + u32 name hash.
                let data = self.read_cell(list_cell, 8 + count * 8)?;
                Ok((0..count)
                    .map(|i| LittleEndian::read_u32(&data[8 + i * 8..12 + i * 8]))
                    .collect())
            }
            LI_SIGNATURE => {
                // Entries: u32 offset only.
                let data = self.read_cell(list_cell, 8 + count * 4)?;
                Ok((0..count)
                    .map(|i| LittleEndian::read_u32(&data[8 + i * 4..12 + i * 4]))
                    .collect())
            }
            RI_SIGNATURE => {
                let data = self.read_cell(list_cell, 8 + count * 4)?;
                let mut offsets = Vec::new();
                for i in 0..count {
                    let sub_list = LittleEndian::read_u32(&data[8 + i * 4..12 + i * 4]);
                    match self.read_subkey_offsets(sub_list) {
                        Ok(sub) => offsets.extend(sub),
                        Err(e) => {
                            debug!("skipping bad ri sub-list at {sub_list:#x}: {e}");
                        }
                    }
                }
                Ok(offsets)
            }
            _ => Err(StoreError::Corrupt {
                offset: list_cell,
                reason: format!("unknown subkey list signature {sig:#06x}"),
            }),
        }
    }

    /// Offset of the VK cell for value `index` of `node`.
    fn value_cell_at(&mut self, node: &KeyNode, index: u32) -> Result<u32, StoreError> {
        if index >= node.value_count {
            return Err(StoreError::NoMoreItems(index));
        }
        let list = self.read_cell(node.value_list, 4 + node.value_count as usize * 4)?;
        let base = 4 + index as usize * 4;
        Ok(LittleEndian::read_u32(&list[base..base + 4]))
    }

    /// Parse the VK record at `cell`; fetch the data bytes when `data` is
    /// given, honoring the resident (inline) flag in the length field.
    fn read_value(
        &mut self,
        cell: u32,
        data: Option<&mut Vec<u8>>,
    ) -> Result<ValueInfo, StoreError> {
        let head = self.read_cell(cell, 4 + VK_NAME_START)?;
        let vk = &head[4..];

        if LittleEndian::read_u16(&vk[0..2]) != VK_SIGNATURE {
            return Err(StoreError::Corrupt {
                offset: cell,
                reason: format!("expected 'vk' signature, got {}", hex::encode(&vk[0..2])),
            });
        }

        let name_len = LittleEndian::read_u16(&vk[VK_NAME_LENGTH..VK_NAME_LENGTH + 2]) as usize;
        let data_len_raw = LittleEndian::read_u32(&vk[VK_DATA_LENGTH..VK_DATA_LENGTH + 4]);
        let data_offset = LittleEndian::read_u32(&vk[VK_DATA_OFFSET..VK_DATA_OFFSET + 4]);
        let type_code = LittleEndian::read_u32(&vk[VK_TYPE..VK_TYPE + 4]);
        let vk_flags = LittleEndian::read_u16(&vk[VK_FLAGS..VK_FLAGS + 2]);

        let resident = data_len_raw & VK_DATA_RESIDENT != 0;
        let data_len = data_len_raw & !VK_DATA_RESIDENT;

        let name = if name_len > 0 {
            let full = self.read_cell(cell, 4 + VK_NAME_START + name_len)?;
            decode_name(&full[4 + VK_NAME_START..], vk_flags & VALUE_COMP_NAME != 0)
        } else {
            String::new()
        };

        let mut info = ValueInfo {
            name,
            type_code,
            data_len,
            data_present: true,
        };

        if let Some(buf) = data {
            buf.clear();
            if data_len == 0 {
                // Zero-length data; present but empty.
            } else if resident {
                let inline_len = (data_len as usize).min(4);
                buf.extend_from_slice(&data_offset.to_le_bytes()[..inline_len]);
            } else if data_offset == NO_CELL {
                info.data_present = false;
            } else {
                let capped = (data_len as usize).min(MAX_VALUE_DATA);
                let cell_bytes = self.read_cell(data_offset, 4 + capped)?;
                buf.extend_from_slice(&cell_bytes[4..]);
            }
        }

        Ok(info)
    }
}

/// Decode a key or value name: ASCII when the compressed-name flag is set,
/// UTF-16LE otherwise.
fn decode_name(bytes: &[u8], compressed: bool) -> String {
    if compressed {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        let chars: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&c| c != 0)
            .collect();
        String::from_utf16_lossy(&chars)
    }
}

// ── KeyStore implementation ──────────────────────────────────────────────────

impl KeyStore for HiveFile {
    type Key = KeyHandle;

    fn root_key(&mut self) -> Result<KeyHandle, StoreError> {
        Ok(KeyHandle { cell: self.root_cell })
    }

    fn open_key(&mut self, parent: &KeyHandle, name: &str) -> Result<KeyHandle, StoreError> {
        let node = self.read_key_node(parent.cell)?;
        if node.subkey_count == 0 || node.subkey_list == NO_CELL {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let offsets = self.read_subkey_offsets(node.subkey_list)?;
        let wanted = name.to_lowercase();
        for off in offsets {
            match self.read_key_node(off) {
                Ok(child) if child.name.to_lowercase() == wanted => {
                    return Ok(KeyHandle { cell: off });
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("skipping bad subkey at {off:#x}: {e}");
                }
            }
        }
        Err(StoreError::NotFound(name.to_string()))
    }

    fn query_info(&mut self, key: &KeyHandle) -> Result<KeyInfo, StoreError> {
        let node = self.read_key_node(key.cell)?;
        Ok(KeyInfo {
            subkey_count:    node.subkey_count,
            value_count:     node.value_count,
            last_write_time: node.timestamp,
        })
    }

    fn enum_key(&mut self, key: &KeyHandle, index: u32) -> Result<String, StoreError> {
        let node = self.read_key_node(key.cell)?;
        if index >= node.subkey_count || node.subkey_list == NO_CELL {
            return Err(StoreError::NoMoreItems(index));
        }
        let offsets = self.read_subkey_offsets(node.subkey_list)?;
        let off = *offsets
            .get(index as usize)
            .ok_or(StoreError::NoMoreItems(index))?;
        Ok(self.read_key_node(off)?.name)
    }

    fn enum_value(
        &mut self,
        key: &KeyHandle,
        index: u32,
        data: Option<&mut Vec<u8>>,
    ) -> Result<ValueInfo, StoreError> {
        let node = self.read_key_node(key.cell)?;
        let vk_cell = self.value_cell_at(&node, index)?;

        match data {
            None => {
                // Size probe: report the required byte count for every
                // existing value, zero-length ones included.  The cap keeps
                // corrupt length fields from driving huge allocations.
                let info = self.read_value(vk_cell, None)?;
                Err(StoreError::MoreData(info.data_len.min(MAX_VALUE_DATA as u32)))
            }
            Some(buf) => self.read_value(vk_cell, Some(buf)),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
