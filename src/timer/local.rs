// src/timer/local.rs — Durable local key/value storage for the in-flight timer
//
// A flat string-to-string map, the same shape as browser local storage.
// `FileStorage` keeps it in one JSON file and rewrites it atomically
// (temp file + rename) on every change.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Apply several sets (`Some`) and removals (`None`) as one write.
    fn write_batch(&self, changes: &[(&str, Option<String>)]) -> anyhow::Result<()>;

    fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        self.write_batch(&[(key, Some(value))])
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.write_batch(&[(key, None)])
    }
}

fn apply(map: &mut BTreeMap<String, String>, changes: &[(&str, Option<String>)]) {
    for (key, value) in changes {
        match value {
            Some(v) => {
                map.insert((*key).to_string(), v.clone());
            }
            None => {
                map.remove(*key);
            }
        }
    }
}

/// In-process storage. Survives engine rebuilds that share it, not process restarts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn write_batch(&self, changes: &[(&str, Option<String>)]) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("local storage lock poisoned"))?;
        apply(&mut entries, changes);
        Ok(())
    }
}

/// JSON-file storage at a fixed path.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the file, treating a missing or unreadable one as empty.
    pub fn open(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(
                    "Ignoring corrupt timer state at {}: {}",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(entries)?;
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("timer-state.json");
        let tmp = dir.join(format!(".{file_name}.tmp"));

        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.flush()?;
        f.sync_all()?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn write_batch(&self, changes: &[(&str, Option<String>)]) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("local storage lock poisoned"))?;
        apply(&mut entries, changes);
        self.persist(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_set_get_remove() {
        let storage = MemoryStorage::new();
        storage.set("a", "1".into()).unwrap();
        assert_eq!(storage.get("a").as_deref(), Some("1"));
        storage.remove("a").unwrap();
        assert!(storage.get("a").is_none());
    }

    #[test]
    fn test_file_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("timer-state.json");

        let storage = FileStorage::open(&path);
        storage
            .write_batch(&[
                ("selectedTaskId", Some("t1".into())),
                ("timerSeconds", Some("12".into())),
            ])
            .unwrap();

        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get("selectedTaskId").as_deref(), Some("t1"));
        assert_eq!(reopened.get("timerSeconds").as_deref(), Some("12"));
        assert!(!dir.path().join("state").join(".timer-state.json.tmp").exists());
    }

    #[test]
    fn test_file_corrupt_reads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timer-state.json");
        std::fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::open(&path);
        assert!(storage.get("selectedTaskId").is_none());

        storage.set("timerSeconds", "3".into()).unwrap();
        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get("timerSeconds").as_deref(), Some("3"));
    }
}
