use crate::config::Config;
use crate::constants::SESSION_FILE_NAME;
use crate::models::Principal;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Persists the signed-in session between runs, the way the hosted SDK keeps
/// its current user in device storage.
#[derive(Clone, Debug)]
pub struct Storage {
    config_dir: PathBuf,
}

impl Storage {
    pub fn new() -> Self {
        Self::at(Config::default_dir())
    }

    pub fn at(config_dir: impl Into<PathBuf>) -> Self {
        Storage {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn session_path(&self) -> PathBuf {
        self.config_dir.join(SESSION_FILE_NAME)
    }

    /// Ensure config directory exists
    fn ensure_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir)
                .with_context(|| format!("creating {}", self.config_dir.display()))?;
        }
        Ok(())
    }

    /// Save the session; the file is private to the current user
    pub fn save_session(&self, principal: &Principal) -> Result<()> {
        self.ensure_dir()?;
        let path = self.session_path();
        let content = serde_yaml::to_string(principal)?;
        let mut file =
            open_private(&path).with_context(|| format!("opening {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Load the saved session, if any
    pub fn load_session(&self) -> Result<Option<Principal>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let principal = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(principal))
    }

    pub fn clear_session(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        }
        Ok(())
    }
}

/// Open for writing, truncated, readable by the owner only. The token is
/// never on disk under looser permissions.
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode only applies on create
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use tempfile::tempdir;

    fn principal() -> Principal {
        Principal::new(
            User {
                id: "u1".into(),
                username: "ana".into(),
                email: Some("ana@example.com".into()),
            },
            "r:token",
        )
    }

    #[test]
    fn test_session_survives_reload() {
        let dir = tempdir().unwrap();
        let storage = Storage::at(dir.path().join("nested"));
        assert_eq!(storage.load_session().unwrap(), None);

        storage.save_session(&principal()).unwrap();
        assert_eq!(storage.load_session().unwrap(), Some(principal()));
    }

    #[test]
    fn test_clear_session_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = Storage::at(dir.path());
        storage.save_session(&principal()).unwrap();
        storage.clear_session().unwrap();
        storage.clear_session().unwrap();
        assert_eq!(storage.load_session().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let storage = Storage::at(dir.path());
        storage.save_session(&principal()).unwrap();
        let mode = fs::metadata(dir.path().join(SESSION_FILE_NAME))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_session_file_is_tightened() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE_NAME);
        fs::write(&path, "stale contents that are longer than the new session").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let storage = Storage::at(dir.path());
        storage.save_session(&principal()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(storage.load_session().unwrap(), Some(principal()));
    }
}
