use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing::{debug, warn};

/// Client-persistent string storage, the way a browser exposes local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;

    /// Writes every entry in order. Backends that can commit in one step override this.
    fn set_many(&self, entries: &[(&str, &str)]) -> anyhow::Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> anyhow::Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // a poisoned map is still a usable map
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries().remove(key);
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> anyhow::Result<()> {
        let mut map = self.entries();
        for (key, value) in entries {
            map.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> anyhow::Result<()> {
        let mut map = self.entries();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// A JSON object on disk. Every process pointing at the same path shares it.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file or one that is not a JSON object reads as empty; any
    /// other I/O failure is an error so nothing gets written over the file.
    fn read_all(&self) -> anyhow::Result<HashMap<String, String>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("read {}", self.path.display()));
            }
        };
        match serde_json::from_str::<HashMap<String, String>>(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "session storage is not valid JSON; treating as empty");
                Ok(HashMap::new())
            }
        }
    }

    fn write_all(&self, map: &HashMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create storage directory {}", parent.display()))?;
        }
        let payload = serde_json::to_vec(map).context("encode session storage")?;
        let temp = self
            .path
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        std::fs::write(&temp, payload)
            .with_context(|| format!("write {}", temp.display()))?;
        std::fs::rename(&temp, &self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }

    fn update<F>(&self, apply: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_all()?;
        apply(&mut map);
        self.write_all(&map)
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        match self.read_all() {
            Ok(mut map) => map.remove(key),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "failed to read session storage");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.update(|map| {
            map.remove(key);
        })
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> anyhow::Result<()> {
        self.update(|map| {
            for (key, value) in entries {
                map.insert(key.to_string(), value.to_string());
            }
        })
    }

    fn remove_many(&self, keys: &[&str]) -> anyhow::Result<()> {
        self.update(|map| {
            for key in keys {
                map.remove(*key);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_set_get_remove() {
        let store = MemoryStorage::new();
        store.set("token", "abc").unwrap();
        assert_eq!(store.get("token").as_deref(), Some("abc"));
        store.remove("token").unwrap();
        assert!(store.get("token").is_none());
    }

    #[test]
    fn file_storage_is_shared_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let first = FileStorage::new(&path);
        let second = FileStorage::new(&path);

        first.set_many(&[("token", "t"), ("user", "{}")]).unwrap();
        assert_eq!(second.get("token").as_deref(), Some("t"));

        second.remove_many(&["token", "user"]).unwrap();
        assert!(first.get("token").is_none());
        assert!(first.get("user").is_none());
    }

    #[test]
    fn file_storage_treats_garbage_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json at all").unwrap();

        let store = FileStorage::new(&path);
        assert!(store.get("token").is_none());

        store.set("token", "fresh").unwrap();
        assert_eq!(store.get("token").as_deref(), Some("fresh"));
    }

    #[test]
    fn unreadable_file_fails_writes_without_touching_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        // a directory in its place cannot be read as a file
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "").unwrap();

        let store = FileStorage::new(&path);
        assert!(store.get("token").is_none());

        let err = store.set("user", "{}").unwrap_err();
        assert!(format!("{err:#}").contains("session.json"));
        assert!(store.remove_many(&["token", "user"]).is_err());

        assert!(path.join("keep").exists());
        let siblings: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(siblings.len(), 1, "no temp file was written");
    }

    #[test]
    fn file_storage_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("session.json");
        let store = FileStorage::new(&path);
        store.set("k", "v").unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }
}
