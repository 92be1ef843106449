//! Storage held in process memory.
//!
//! # Design
//! One map guarded by a mutex. Streams are read to the end on `set` and
//! handed back as fresh readers on every `get`.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::{Storage, StorageValue};
use crate::error::Result;

#[derive(Debug, Clone)]
enum Entry {
    Data(Value),
    Bytes(Arc<[u8]>),
}

/// In-process storage. Streams are buffered in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<StorageValue>> {
        let entries = self.entries.lock();
        Ok(entries.get(key).map(|entry| match entry {
            Entry::Data(value) => StorageValue::Data(value.clone()),
            Entry::Bytes(bytes) => StorageValue::stream(Cursor::new(Arc::clone(bytes))),
        }))
    }

    fn set(&self, key: &str, value: StorageValue) -> Result<()> {
        let entry = match value {
            StorageValue::Data(value) => Entry::Data(value),
            StorageValue::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Entry::Bytes(buf.into())
            }
        };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_key_is_none_not_an_error() {
        let storage = MemoryStorage::new();
        assert!(storage.get("not_existing_key").unwrap().is_none());
    }

    #[test]
    fn stored_null_is_distinct_from_missing() {
        let storage = MemoryStorage::new();
        storage.set("nothing", Value::Null.into()).unwrap();
        let value = storage.get("nothing").unwrap().unwrap();
        assert_eq!(value.as_data(), Some(&Value::Null));
    }

    #[test]
    fn set_get_delete() {
        let storage = MemoryStorage::new();
        storage.set("test_key", json!("value").into()).unwrap();
        assert_eq!(
            storage.get("test_key").unwrap().unwrap().as_data(),
            Some(&json!("value"))
        );
        storage.delete("test_key").unwrap();
        assert!(storage.get("test_key").unwrap().is_none());
    }

    #[test]
    fn streams_can_be_read_more_than_once() {
        let storage = MemoryStorage::new();
        storage
            .set("blob", StorageValue::stream(Cursor::new(b"bytes".to_vec())))
            .unwrap();
        for _ in 0..2 {
            let value = storage.get("blob").unwrap().unwrap();
            assert!(value.is_stream());
            assert_eq!(value.into_bytes().unwrap(), b"bytes");
        }
    }

    #[test]
    fn delete_all_flushes() {
        let storage = MemoryStorage::new();
        storage.set("a", json!(1).into()).unwrap();
        storage.set("b", json!({"x": [1, 2]}).into()).unwrap();
        assert_eq!(storage.len(), 2);
        storage.delete_all().unwrap();
        assert!(storage.is_empty());
    }
}
