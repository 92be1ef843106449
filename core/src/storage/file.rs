//! Storage backed by a directory.
//!
//! # Design
//! JSON values share one index file; streams get a file per key. Stream
//! writes are staged in a temporary file and renamed into place, and only
//! then is the index entry for the key dropped.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::{Storage, StorageValue};
use crate::error::{Error, Result};

/// Name of the index file holding the JSON-valued entries.
///
/// A fixed sentinel kept for compatibility with existing storage
/// directories; it carries no meaning of its own.
pub const INDEX_FILE_NAME: &str = "YmFuYW5lDQo";

/// Directory-backed storage.
///
/// JSON values live in a single index file that is loaded on construction
/// and rewritten wholesale on every change. Streams are written to one file
/// per key. A key lives in exactly one of the two places: storing one kind
/// removes the other.
///
/// There is no file locking; concurrent writers from several processes can
/// lose updates.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    index: Mutex<Map<String, Value>>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if dir.exists() && !dir.is_dir() {
            return Err(Error::StorageLocationConflict(dir));
        }
        fs::create_dir_all(&dir)?;
        let index = load_index(&dir.join(INDEX_FILE_NAME))?;
        tracing::debug!(dir = %dir.display(), entries = index.len(), "file storage opened");
        Ok(Self {
            dir,
            index: Mutex::new(index),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    /// Path of the per-key file, `None` when the key is not a safe file name.
    fn file_path(&self, key: &str) -> Option<PathBuf> {
        let unsafe_name = key.is_empty()
            || key == "."
            || key == ".."
            || key == INDEX_FILE_NAME
            || key.contains(['/', '\\', '\0']);
        (!unsafe_name).then(|| self.dir.join(key))
    }

    fn save(&self, index: &Map<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec(index).map_err(|e| Error::MalformedInput(e.to_string()))?;
        fs::write(self.index_path(), bytes)?;
        Ok(())
    }

    fn delete_file(&self, key: &str) -> Result<()> {
        let Some(path) = self.file_path(key) else {
            return Ok(());
        };
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(key, "removed stream file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn load_index(path: &Path) -> Result<Map<String, Value>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => return Err(e.into()),
    };
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::MalformedInput(format!(
            "storage index {} is not a JSON object",
            path.display()
        ))),
        Err(e) => Err(Error::MalformedInput(format!(
            "storage index {}: {e}",
            path.display()
        ))),
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<StorageValue>> {
        if let Some(value) = self.index.lock().get(key) {
            return Ok(Some(StorageValue::Data(value.clone())));
        }
        let Some(path) = self.file_path(key) else {
            return Ok(None);
        };
        match File::open(path) {
            Ok(file) => Ok(Some(StorageValue::stream(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: StorageValue) -> Result<()> {
        let mut index = self.index.lock();
        match value {
            StorageValue::Data(value) => {
                index.insert(key.to_string(), value);
                self.save(&index)?;
                self.delete_file(key)
            }
            StorageValue::Stream(mut reader) => {
                let path = self
                    .file_path(key)
                    .ok_or_else(|| Error::InvalidStorageKey(key.to_string()))?;
                // A failed copy must leave the previous entry in place.
                let mut staged = tempfile::NamedTempFile::new_in(&self.dir)?;
                let written = io::copy(&mut reader, staged.as_file_mut())?;
                staged.persist(&path).map_err(|e| Error::Io(e.error))?;
                tracing::debug!(key, bytes = written, "wrote stream file");
                if index.remove(key).is_some() {
                    self.save(&index)?;
                }
                Ok(())
            }
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut index = self.index.lock();
        self.delete_file(key)?;
        if index.remove(key).is_some() {
            self.save(&index)?;
        }
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        let mut index = self.index.lock();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        index.clear();
        Ok(())
    }
}
