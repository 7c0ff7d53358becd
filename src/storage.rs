use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::DashboardConfig;
use crate::session::Session;

const SESSION_FILE: &str = "session.json";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Files kept in the app data dir. The credential lives in `session.json`.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn load_session(&self) -> Result<Option<Session>, StorageError> {
        self.load_optional(self.root.join(SESSION_FILE))
    }

    pub fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        self.ensure_dirs()?;
        self.write_atomic(self.root.join(SESSION_FILE), session)
    }

    /// Removing a credential that is already gone is not an error.
    pub fn clear_session(&self) -> Result<(), StorageError> {
        match fs::remove_file(self.root.join(SESSION_FILE)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn load_config(&self) -> Result<DashboardConfig, StorageError> {
        Ok(self
            .load_optional(self.root.join(CONFIG_FILE))?
            .unwrap_or_default())
    }

    fn load_optional<T: DeserializeOwned>(&self, path: PathBuf) -> Result<Option<T>, StorageError> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        Ok(Some(serde_json::from_str(&buf)?))
    }

    fn write_atomic<T: Serialize>(&self, path: PathBuf, data: &T) -> Result<(), StorageError> {
        let temp_path = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(data)?;
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(temp_path, path)?;
        Ok(())
    }
}
