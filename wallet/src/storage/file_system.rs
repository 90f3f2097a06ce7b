use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::{validate_key, KeyValueStore};
use crate::error::StorageError;

/// One JSON file per key: `{base}/{namespace}/{key}.json`
#[derive(Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Create a new store with the default base directory ("./wallets")
    pub fn new() -> Self {
        Self {
            base_path: PathBuf::from("./wallets"),
        }
    }

    /// Create store with custom base directory (for testing)
    pub fn new_with_base_dir(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_path
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf, StorageError> {
        validate_key(namespace)?;
        Ok(self.base_path.join(namespace))
    }

    fn entry_path(&self, namespace: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.namespace_dir(namespace)?.join(format!("{}.json", key)))
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.entry_path(namespace, key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.entry_path(namespace, key)?;
        fs::create_dir_all(self.namespace_dir(namespace)?)?;
        fs::write(path, value)?;
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<bool, StorageError> {
        let path = self.entry_path(namespace, key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Deleted {}/{}", namespace, key);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.namespace_dir(namespace)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
