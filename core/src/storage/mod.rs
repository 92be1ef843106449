//! Key/value cache shared by gateways.
//!
//! # Design
//! Values are either JSON data or byte streams. `get` returns `Ok(None)` for
//! a missing key, which is distinct from a stored JSON `null`.
//!
//! Implementations take `&self` and guard their state internally so one
//! instance can be shared between several gateways through an `Arc`. Nothing
//! coordinates access across processes.

mod file;
mod memory;

use std::fmt;
use std::io::Read;

use serde_json::Value;

use crate::error::Result;

pub use file::{FileStorage, INDEX_FILE_NAME};
pub use memory::MemoryStorage;

/// A stored value.
pub enum StorageValue {
    Data(Value),
    Stream(Box<dyn Read + Send>),
}

impl StorageValue {
    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        StorageValue::Stream(Box::new(reader))
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            StorageValue::Data(value) => Some(value),
            StorageValue::Stream(_) => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, StorageValue::Stream(_))
    }

    /// Drain a stream, or serialize data as JSON.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            StorageValue::Data(value) => Ok(serde_json::to_vec(&value)
                .map_err(|e| crate::Error::MalformedInput(e.to_string()))?),
            StorageValue::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

impl fmt::Debug for StorageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageValue::Data(value) => f.debug_tuple("Data").field(value).finish(),
            StorageValue::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Value> for StorageValue {
    fn from(value: Value) -> Self {
        StorageValue::Data(value)
    }
}

/// Key/value cache.
pub trait Storage: Send + Sync {
    /// `Ok(None)` when the key is not set.
    fn get(&self, key: &str) -> Result<Option<StorageValue>>;

    fn set(&self, key: &str, value: StorageValue) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;

    /// Remove every entry.
    fn delete_all(&self) -> Result<()>;
}
