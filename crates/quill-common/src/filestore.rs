use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::kv::KeyValueStore;

const FILE_SUFFIX: &str = ".json";

/// Directory-backed store: one file per key.
///
/// Keys are percent-encoded to form file names, so any key string is safe.
pub struct FileStore<T = PathBuf>
where
    T: AsRef<Path>,
{
    path: T,
}

impl<T> FileStore<T>
where
    T: AsRef<Path>,
{
    /// Open a store rooted at `path`, creating the directory if needed.
    pub fn open(path: T) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path.as_ref())
            .map_err(|e| StoreError::io(path.as_ref().display().to_string(), e))?;
        Ok(Self { path })
    }

    pub fn root(&self) -> &Path {
        self.path.as_ref()
    }

    fn file_for(&self, key: &str) -> PathBuf {
        self.path
            .as_ref()
            .join(format!("{}{}", urlencoding::encode(key), FILE_SUFFIX))
    }
}

impl<T> KeyValueStore for FileStore<T>
where
    T: AsRef<Path>,
{
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.file_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // write-then-rename so a crash never leaves a half-written value
        let target = self.file_for(key);
        let tmp = target.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|e| StoreError::io(key, e))?;
        std::fs::rename(&tmp, &target).map_err(|e| StoreError::io(key, e))
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        match std::fs::remove_file(self.file_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }

    fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let root = self.path.as_ref().display().to_string();
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(self.path.as_ref()).map_err(|e| StoreError::io(&root, e))? {
            let entry = entry.map_err(|e| StoreError::io(&root, e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(encoded) = name.strip_suffix(FILE_SUFFIX) else {
                continue;
            };
            match urlencoding::decode(encoded) {
                Ok(key) => keys.push(key.into_owned()),
                Err(e) => tracing::warn!(file = %name, error = %e, "skipping undecodable store file"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
