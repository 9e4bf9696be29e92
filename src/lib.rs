pub mod reader;
pub mod rootkey;
pub mod value;
pub mod store;
pub mod hive;
pub mod walker;
pub mod emit;

pub use reader::{HiveCursor, ReadError};
pub use rootkey::{locate_root_key, LocatorError, RootKeyInfo};
pub use value::{decode, type_label};
pub use store::{KeyInfo, KeyStore, StoreError, ValueInfo};
pub use hive::{HiveError, HiveFile};
pub use walker::walk_key;
pub use emit::XmlWriter;
