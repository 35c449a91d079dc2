//! Identity repository
//!
//! Persists the runner identity as a small JSON file so a restarted runner
//! keeps the id the queue service assigned to it.

use runpack_core::domain::runner::RunnerIdentity;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::IdentityError;

/// File-backed store for the runner identity
///
/// A store that exists but cannot be parsed is reported, never repaired:
/// replacing it would orphan jobs tied to the previous runner id.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored identity, `None` when no identity was saved yet
    pub fn load(&self) -> Result<Option<RunnerIdentity>, IdentityError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No identity file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(IdentityError::io(&self.path, e)),
        };

        let identity: RunnerIdentity =
            serde_json::from_str(&contents).map_err(|e| IdentityError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if identity.runner_id.trim().is_empty() {
            return Err(IdentityError::Corrupt {
                path: self.path.clone(),
                reason: "runner_id is empty".to_string(),
            });
        }

        Ok(Some(identity))
    }

    /// Replaces the stored identity
    ///
    /// The file is written next to its final location and renamed into
    /// place, so a crash never leaves a half-written identity behind.
    pub fn save(&self, identity: &RunnerIdentity) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| IdentityError::io(parent, e))?;
        }

        let contents = serde_json::to_string_pretty(identity).map_err(|e| IdentityError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        write_owner_only(&tmp_path, contents.as_bytes())?;
        fs::rename(&tmp_path, &self.path).map_err(|e| IdentityError::io(&self.path, e))?;

        debug!("Saved runner identity to {}", self.path.display());
        Ok(())
    }

    /// Removes the stored identity; returns whether one existed
    pub fn clear(&self) -> Result<bool, IdentityError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(IdentityError::io(&self.path, e)),
        }
    }
}

/// Writes `contents` to a new file only the owner can read
///
/// A leftover file from an interrupted save is removed first, since the
/// creation mode only applies to files that do not exist yet.
fn write_owner_only(path: &Path, contents: &[u8]) -> Result<(), IdentityError> {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed stale {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(IdentityError::io(path, e)),
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| IdentityError::io(path, e))?;
    file.write_all(contents)
        .and_then(|()| file.sync_all())
        .map_err(|e| IdentityError::io(path, e))
}

/// Generates a fresh runner name
///
/// Names only need to be readable; collisions are the service's concern.
pub fn generate_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("runner-{}", &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("runner.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("nested").join("runner.json"));

        let identity = RunnerIdentity::new("R123", "worker-7");
        store.save(&identity).unwrap();

        assert_eq!(store.load().unwrap(), Some(identity));
        assert!(!dir.path().join("nested").join("runner.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("runner.json"));
        store.save(&RunnerIdentity::new("R1", "n")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_temp_file_does_not_leak_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("runner.json"));
        let tmp_path = dir.path().join("runner.json.tmp");
        fs::write(&tmp_path, "partial").unwrap();
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o644)).unwrap();

        let identity = RunnerIdentity::new("R1", "n");
        store.save(&identity).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.load().unwrap(), Some(identity));
        assert!(!tmp_path.exists());
    }

    #[test]
    fn test_corrupt_file_is_not_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileIdentityStore::new(&path);
        let err = store.load().unwrap_err();
        assert!(matches!(err, IdentityError::Corrupt { .. }));
        assert!(err.to_string().contains("Delete it manually"));

        // The broken file is left for the operator
        assert_eq!(fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[test]
    fn test_empty_runner_id_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.json");
        fs::write(&path, r#"{"runner_id": " ", "runner_name": "x"}"#).unwrap();

        let err = FileIdentityStore::new(&path).load().unwrap_err();
        assert!(matches!(err, IdentityError::Corrupt { .. }));
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("runner.json"));

        assert!(!store.clear().unwrap());
        store.save(&RunnerIdentity::new("R1", "n")).unwrap();
        assert!(store.clear().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_generate_name() {
        let name = generate_name();
        assert!(name.starts_with("runner-"));
        assert_eq!(name.len(), "runner-".len() + 8);
        assert_ne!(name, generate_name());
    }
}
