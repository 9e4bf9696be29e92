//! Recursive key traversal.
//!
//! Pre-order, values before children: each key's record is emitted first,
//! then every one of its values, then each subtree in store enumeration
//! order.  Failures below the root are absorbed where they occur — a bad
//! key loses its subtree, a bad value or subkey loses only itself, and the
//! rest of the hive still comes out.  Only write errors on the output
//! stream propagate.

use crate::emit::{filetime_to_iso, KeyRecord, ValueRecord, XmlWriter};
use crate::store::{KeyStore, StoreError};
use crate::value::{decode, type_label, REG_BINARY};
use std::io::{self, Write};
use tracing::debug;

/// Path segment used for a value with an empty name.
const DEFAULT_VALUE_NAME: &str = "Default";

/// Registry path separator.
const PATH_SEPARATOR: char = '\\';

/// Visit `key` and everything below it, streaming records into `xml`.
///
/// `path` is the absolute path of `key` — the root key's name at the top of
/// the recursion, ancestors joined with `\` below it.
pub fn walk_key<S, W>(
    store: &mut S,
    xml: &mut XmlWriter<W>,
    key: &S::Key,
    path: &str,
) -> io::Result<()>
where
    S: KeyStore,
    W: Write,
{
    // Metadata failure aborts this subtree only.
    let info = match store.query_info(key) {
        Ok(info) => info,
        Err(e) => {
            debug!("skipping key '{path}': metadata query failed: {e}");
            return Ok(());
        }
    };
    let mtime = filetime_to_iso(info.last_write_time);

    xml.key_record(&KeyRecord { path, mtime: &mtime })?;

    for index in 0..info.value_count {
        // Phase one: size probe.  Anything but a MoreData reply means the
        // value is absent or corrupt; skip it.
        let needed = match store.enum_value(key, index, None) {
            Err(StoreError::MoreData(n)) => n,
            Ok(_) => {
                debug!("skipping value {index} of '{path}': probe returned no size");
                continue;
            }
            Err(e) => {
                debug!("skipping value {index} of '{path}': {e}");
                continue;
            }
        };

        // Phase two: fetch into a frame-local buffer.
        let mut data = Vec::with_capacity(needed as usize);
        let value = match store.enum_value(key, index, Some(&mut data)) {
            Ok(v) => v,
            Err(e) => {
                debug!("skipping value {index} of '{path}': fetch failed: {e}");
                continue;
            }
        };

        let name = if value.name.is_empty() {
            DEFAULT_VALUE_NAME
        } else {
            value.name.as_str()
        };
        let value_path = format!("{path}{PATH_SEPARATOR}{name}");
        let raw = value.data_present.then_some(data.as_slice());

        xml.value_record(&ValueRecord {
            path:      &value_path,
            name,
            mtime:     &mtime,
            data_type: type_label(value.type_code),
            data:      &decode(raw, value.type_code),
            raw_data:  &decode(raw, REG_BINARY),
        })?;
    }

    for index in 0..info.subkey_count {
        let name = match store.enum_key(key, index) {
            Ok(name) => name,
            Err(e) => {
                debug!("skipping subkey {index} of '{path}': {e}");
                continue;
            }
        };
        let child = match store.open_key(key, &name) {
            Ok(child) => child,
            Err(e) => {
                debug!("skipping subkey '{name}' of '{path}': open failed: {e}");
                continue;
            }
        };
        let child_path = format!("{path}{PATH_SEPARATOR}{name}");
        walk_key(store, xml, &child, &child_path)?;
    }

    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────────────
