// Credential acquisition and session-scoped persistence.
//
// Exactly one acquisition mode is active per process: either the user enters
// the credential through the API and it is persisted in the session store, or
// the host environment grants it at startup and the API surface never sees
// the value. The orchestrator works against the trait and does not care
// which mode is active.

use std::path::PathBuf;
use thiserror::Error;

// Fixed key under which the credential is stored in the session file.
const SESSION_KEY: &str = "credential";

#[derive(Debug, Error)]
pub enum StorageError {
    /// The persistence medium rejected a read or write.
    #[error("session storage unavailable: {0}")]
    Unavailable(String),

    /// Manual credential entry is not offered in the active mode.
    #[error("credential entry is disabled; the credential is granted by the host environment")]
    Unsupported,
}

pub trait CredentialStore: Send + Sync {
    // Acquisition mode identifier, reported in session snapshots.
    fn source(&self) -> &'static str;

    /// Retrieves the persisted credential. Absence is not an error; an
    /// unusable storage medium is.
    fn load(&self) -> Result<Option<String>, StorageError>;

    /// Persists the credential for the session.
    fn save(&self, credential: &str) -> Result<(), StorageError>;

    /// Removes any persisted credential. Idempotent.
    fn clear(&self) -> Result<(), StorageError>;

    // Read-side degradation: a broken store reads as "no credential", logged.
    fn present(&self) -> bool {
        match self.load() {
            Ok(credential) => credential.is_some(),
            Err(err) => {
                tracing::warn!("Failed to read credential from session storage: {}", err);
                false
            }
        }
    }
}

/// Manual mode: the credential is entered by the user and persisted in a
/// JSON session file under a fixed key.
pub struct SessionFileCredentials {
    path: PathBuf,
}

impl SessionFileCredentials {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_record(&self) -> Result<serde_json::Map<String, serde_json::Value>, StorageError> {
        if !self.path.exists() {
            return Ok(serde_json::Map::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|err| StorageError::Unavailable(format!("failed to read session file: {}", err)))?;
        serde_json::from_str(&content)
            .map_err(|err| StorageError::Unavailable(format!("failed to parse session file: {}", err)))
    }

    fn write_record(
        &self,
        record: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    StorageError::Unavailable(format!(
                        "failed to create session directory: {}",
                        err
                    ))
                })?;
            }
        }
        let content = serde_json::to_string_pretty(record)
            .map_err(|err| StorageError::Unavailable(format!("failed to serialize session: {}", err)))?;
        std::fs::write(&self.path, content)
            .map_err(|err| StorageError::Unavailable(format!("failed to write session file: {}", err)))
    }
}

impl CredentialStore for SessionFileCredentials {
    fn source(&self) -> &'static str {
        "manual"
    }

    fn load(&self) -> Result<Option<String>, StorageError> {
        let record = self.read_record()?;
        Ok(record
            .get(SESSION_KEY)
            .and_then(|value| value.as_str())
            .map(str::to_string))
    }

    fn save(&self, credential: &str) -> Result<(), StorageError> {
        let mut record = self.read_record().unwrap_or_default();
        record.insert(
            SESSION_KEY.to_string(),
            serde_json::Value::String(credential.to_string()),
        );
        self.write_record(&record)?;
        tracing::info!("Credential saved to session storage");
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut record = self.read_record()?;
        if record.remove(SESSION_KEY).is_some() {
            self.write_record(&record)?;
            tracing::info!("Credential removed from session storage");
        }
        Ok(())
    }
}

/// Host mode: the credential was granted through startup configuration and is
/// never entered or shown through the API surface.
pub struct HostGrantedCredentials {
    credential: String,
}

impl HostGrantedCredentials {
    pub fn new(credential: String) -> Self {
        Self { credential }
    }
}

impl CredentialStore for HostGrantedCredentials {
    fn source(&self) -> &'static str {
        "host"
    }

    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(Some(self.credential.clone()))
    }

    fn save(&self, _credential: &str) -> Result<(), StorageError> {
        Err(StorageError::Unsupported)
    }

    // The host grant cannot be revoked from inside the service.
    fn clear(&self) -> Result<(), StorageError> {
        tracing::info!("Ignoring request to clear a host-granted credential");
        Ok(())
    }
}
