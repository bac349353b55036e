//! Persistence backends for the configuration store.
//!
//! # Responsibilities
//! - Read and write the configuration document for one host context
//! - Treat a missing document as "nothing persisted yet"
//! - Keep writes whole: a document is replaced, never patched in place
//!
//! # Design Decisions
//! - One backend per process, chosen from [`HostContext`] at construction
//! - Server hosts keep a plain JSON file
//! - Client hosts keep a key/value storage document that mirrors browser
//!   local storage: every value is a JSON string stored under a key

use std::collections::BTreeMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::StoreSettings;
use crate::error::PersistenceError;
use crate::store::model::Configuration;

/// Where the process runs, which decides how configuration persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostContext {
    /// Server-side host: durable file on disk.
    #[default]
    Server,
    /// Client-side host: keyed local storage.
    Client,
}

impl HostContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostContext::Server => "server",
            HostContext::Client => "client",
        }
    }
}

/// Durable JSON file at a fixed path.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<Configuration>, PersistenceError> {
        let Some(content) = read_optional(&self.path).await? else {
            return Ok(None);
        };
        let config = serde_json::from_str(&content).map_err(|source| PersistenceError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(config))
    }

    pub async fn save(&self, config: &Configuration) -> Result<(), PersistenceError> {
        let content = serde_json::to_string_pretty(config).map_err(|source| {
            PersistenceError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        write_replace(&self.path, content.as_bytes()).await
    }
}

/// Keyed entry inside a local storage document.
///
/// The document is a JSON object of string values, so other keys written by
/// the same host survive our saves.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    path: PathBuf,
    key: String,
}

impl LocalBackend {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn load(&self) -> Result<Option<Configuration>, PersistenceError> {
        let entries = self.read_entries().await?;
        let Some(raw) = entries.get(&self.key) else {
            return Ok(None);
        };
        let config = serde_json::from_str(raw).map_err(|source| PersistenceError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(config))
    }

    pub async fn save(&self, config: &Configuration) -> Result<(), PersistenceError> {
        // A corrupt storage document is replaced rather than blocking every write.
        let mut entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(PersistenceError::Malformed { .. }) => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        let value = serde_json::to_string(config).map_err(|source| PersistenceError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        entries.insert(self.key.clone(), value);

        let content = serde_json::to_string_pretty(&entries).map_err(|source| {
            PersistenceError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        write_replace(&self.path, content.as_bytes()).await
    }

    /// Total length of every key and value held in the storage document.
    pub async fn stored_size(&self) -> Result<usize, PersistenceError> {
        let entries = self.read_entries().await?;
        Ok(entries.iter().map(|(k, v)| k.len() + v.len()).sum())
    }

    async fn read_entries(&self) -> Result<BTreeMap<String, String>, PersistenceError> {
        let Some(content) = read_optional(&self.path).await? else {
            return Ok(BTreeMap::new());
        };
        serde_json::from_str(&content).map_err(|source| PersistenceError::Malformed {
            path: self.path.clone(),
            source,
        })
    }
}

/// The single backend active in this process.
#[derive(Debug, Clone)]
pub enum PersistenceBackend {
    File(FileBackend),
    Local(LocalBackend),
}

impl PersistenceBackend {
    /// Select the backend for a host context.
    pub fn for_host(host: HostContext, settings: &StoreSettings) -> Self {
        match host {
            HostContext::Server => PersistenceBackend::File(FileBackend::new(&settings.config_path)),
            HostContext::Client => PersistenceBackend::Local(LocalBackend::new(
                &settings.local_storage_path,
                settings.storage_key.clone(),
            )),
        }
    }

    pub async fn load(&self) -> Result<Option<Configuration>, PersistenceError> {
        match self {
            PersistenceBackend::File(backend) => backend.load().await,
            PersistenceBackend::Local(backend) => backend.load().await,
        }
    }

    pub async fn save(&self, config: &Configuration) -> Result<(), PersistenceError> {
        match self {
            PersistenceBackend::File(backend) => backend.save(config).await,
            PersistenceBackend::Local(backend) => backend.save(config).await,
        }
    }

    pub fn host(&self) -> HostContext {
        match self {
            PersistenceBackend::File(_) => HostContext::Server,
            PersistenceBackend::Local(_) => HostContext::Client,
        }
    }

    /// Path of the document backing this store.
    pub fn path(&self) -> &Path {
        match self {
            PersistenceBackend::File(backend) => backend.path(),
            PersistenceBackend::Local(backend) => backend.path(),
        }
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, PersistenceError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
        Err(source) => Err(PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write to a sibling temp file, then rename over the target.
async fn write_replace(path: &Path, content: &[u8]) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, content).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}
