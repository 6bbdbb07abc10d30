//! Storage persisted to a JSON file, for hosts that keep a session across
//! restarts.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use authlane_core::AuthStorage;
use authlane_domain::Result;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};

/// All slots live in one JSON object that is rewritten on every change.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash never leaves a half-written document behind. On Unix the file is
/// created with mode `0600` since it holds tokens.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    slots: Mutex<Map<String, Value>>,
}

impl JsonFileStorage {
    /// Open `path`, loading existing slots. A missing file starts empty.
    ///
    /// # Errors
    /// `AuthError::Storage` if the file cannot be read or is not a JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let slots = load(&path)?;
        debug!(path = %path.display(), slots = slots.len(), "opened storage file");
        Ok(Self { path, slots: Mutex::new(slots) })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, change: impl FnOnce(&mut Map<String, Value>) -> bool) -> Result<()> {
        let mut slots = self.slots.lock();
        let mut next = slots.clone();
        if !change(&mut next) {
            return Ok(());
        }
        persist(&self.path, &next).map_err(|err| {
            warn!(path = %self.path.display(), error = %err, "failed to persist storage");
            err
        })?;
        *slots = next;
        Ok(())
    }
}

impl AuthStorage for JsonFileStorage {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<()> {
        self.update(|slots| {
            slots.insert(key.to_string(), value);
            true
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|slots| slots.remove(key).is_some())
    }
}

fn load(path: &Path) -> StorageResult<Map<String, Value>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(source) => return Err(StorageError::Io { path: path.to_path_buf(), source }),
    };
    if contents.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str(&contents) {
        Ok(Value::Object(slots)) => Ok(slots),
        Ok(_) => Err(StorageError::Corrupt {
            path: path.to_path_buf(),
            reason: "not a JSON object".into(),
        }),
        Err(err) => {
            Err(StorageError::Corrupt { path: path.to_path_buf(), reason: err.to_string() })
        }
    }
}

fn persist(path: &Path, slots: &Map<String, Value>) -> StorageResult<()> {
    let io_err = |source| StorageError::Io { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let bytes = serde_json::to_vec_pretty(slots)?;
    let temp = path.with_extension("tmp");
    let mut file = open_private(&temp).map_err(io_err)?;
    file.write_all(&bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    fs::rename(&temp, path).map_err(io_err)
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

#[cfg(test)]
mod tests {
    use authlane_domain::AuthError;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn slots_survive_reopening() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session").join("authlane.json");

        let storage = JsonFileStorage::open(&path).unwrap();
        storage.write("authzData", json!("access-token")).unwrap();
        storage.write("authNonce", json!("n-1")).unwrap();
        storage.remove("authNonce").unwrap();
        drop(storage);

        let reopened = JsonFileStorage::open(&path).unwrap();
        assert_eq!(reopened.read("authzData").unwrap(), Some(json!("access-token")));
        assert!(reopened.read("authNonce").unwrap().is_none());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn removing_a_missing_key_does_not_touch_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("authlane.json");

        let storage = JsonFileStorage::open(&path).unwrap();
        storage.remove("authzData").unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("authlane.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let err = JsonFileStorage::open(&path).unwrap_err();
        assert!(matches!(err, AuthError::Storage(msg) if msg.contains("corrupt")));
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private_to_the_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("authlane.json");
        JsonFileStorage::open(&path).unwrap().write("authzData", json!("t")).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
