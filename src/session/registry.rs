//! Registry of logged-in accounts.
//!
//! Each account owns its own grammers session file and a small
//! JSON index maps phone numbers onto those files. Records are created
//! on first login, read on lookup and deleted on logout; the registry
//! is explicit state passed into commands, never a process-wide
//! singleton. The API hash is supplied via environment each run and is
//! not persisted.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the registry index inside the sessions directory.
const REGISTRY_FILE: &str = "registry.json";

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No session registered for phone {0}")]
    NotFound(String),

    #[error("A session for phone {0} already exists")]
    AlreadyExists(String),

    #[error("Failed to access registry file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse registry file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One logged-in account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    /// Phone number the account was registered under.
    pub phone: String,

    /// API ID the session was created with.
    pub api_id: i32,

    /// Session database file, relative to the sessions directory.
    pub session_file: PathBuf,

    /// When the account was first logged in.
    pub created_at: DateTime<Utc>,
}

/// Phone-keyed store of account sessions.
#[derive(Debug)]
pub struct SessionRegistry {
    /// Directory holding the index and the per-account session files.
    dir: PathBuf,

    /// Registered accounts, in insertion order.
    records: Vec<SessionRecord>,
}

impl SessionRegistry {
    /// Opens the registry in the given directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the index
    /// cannot be parsed.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let index = dir.join(REGISTRY_FILE);
        let records = if index.exists() {
            serde_json::from_str(&std::fs::read_to_string(&index)?)?
        } else {
            Vec::new()
        };

        Ok(Self { dir, records })
    }

    /// Registers a new account and persists the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the phone is already registered or the index
    /// cannot be written.
    pub fn add(&mut self, phone: &str, api_id: i32) -> Result<SessionRecord, RegistryError> {
        if self.get(phone).is_some() {
            return Err(RegistryError::AlreadyExists(phone.to_owned()));
        }

        let record = SessionRecord {
            phone: phone.to_owned(),
            api_id,
            session_file: PathBuf::from(format!("{}.session.db", sanitize_phone(phone))),
            created_at: Utc::now(),
        };

        self.records.push(record.clone());
        self.save()?;
        Ok(record)
    }

    /// Looks up the account registered under a phone number.
    #[must_use]
    pub fn get(&self, phone: &str) -> Option<&SessionRecord> {
        self.records.iter().find(|r| r.phone == phone)
    }

    /// Removes an account and its session file.
    ///
    /// # Errors
    ///
    /// Returns an error if the phone is not registered or the index
    /// cannot be written.
    pub fn remove(&mut self, phone: &str) -> Result<SessionRecord, RegistryError> {
        let pos = self
            .records
            .iter()
            .position(|r| r.phone == phone)
            .ok_or_else(|| RegistryError::NotFound(phone.to_owned()))?;

        let record = self.records.remove(pos);
        self.save()?;

        let session_path = self.dir.join(&record.session_file);
        if session_path.exists() {
            std::fs::remove_file(session_path)?;
        }

        Ok(record)
    }

    /// Lists all registered accounts.
    #[must_use]
    pub fn list(&self) -> &[SessionRecord] {
        &self.records
    }

    /// Absolute path of an account's session file.
    #[must_use]
    pub fn session_path(&self, record: &SessionRecord) -> PathBuf {
        self.dir.join(&record.session_file)
    }

    /// Writes the index back to disk.
    fn save(&self) -> Result<(), RegistryError> {
        let json = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(self.dir.join(REGISTRY_FILE), json)?;
        Ok(())
    }
}

/// Reduces a phone number to a filesystem-safe name.
fn sanitize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        "unknown".to_owned()
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_registry() -> (tempfile::TempDir, SessionRegistry) {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = SessionRegistry::load(dir.path()).expect("load");
        (dir, registry)
    }

    #[test]
    fn test_add_and_get() {
        let (_dir, mut registry) = temp_registry();

        let record = registry.add("+1 (234) 567-890", 12345).expect("add");
        assert_eq!(record.session_file, PathBuf::from("1234567890.session.db"));

        let found = registry.get("+1 (234) 567-890").expect("get");
        assert_eq!(found.api_id, 12345);
    }

    #[test]
    fn test_duplicate_phone_rejected() {
        let (_dir, mut registry) = temp_registry();

        registry.add("+111", 1).expect("add");
        assert!(matches!(
            registry.add("+111", 1),
            Err(RegistryError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_remove_unknown_phone() {
        let (_dir, mut registry) = temp_registry();
        assert!(matches!(
            registry.remove("+999"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_roundtrip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");

        {
            let mut registry = SessionRegistry::load(dir.path()).expect("load");
            registry.add("+111", 1).expect("add");
            registry.add("+222", 2).expect("add");
        }

        let registry = SessionRegistry::load(dir.path()).expect("reload");
        assert_eq!(registry.list().len(), 2);
        assert!(registry.get("+222").is_some());
    }

    #[test]
    fn test_remove_persists() {
        let dir = tempfile::tempdir().expect("tempdir");

        {
            let mut registry = SessionRegistry::load(dir.path()).expect("load");
            registry.add("+111", 1).expect("add");
            registry.remove("+111").expect("remove");
        }

        let registry = SessionRegistry::load(dir.path()).expect("reload");
        assert!(registry.get("+111").is_none());
    }

    #[test]
    fn test_sanitize_phone() {
        assert_eq!(sanitize_phone("+7 (999) 123-45-67"), "79991234567");
        assert_eq!(sanitize_phone("abc"), "unknown");
    }
}
