//! Backing stores for the endpoint catalog.
//!
//! The registry treats the store as the source of truth on startup and writes the
//! whole catalog through it after every mutation.

use super::types::{Endpoint, StoreError};
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Backend-agnostic persistence for the catalog document.
///
/// Synchronous: registry writes are serialized and callers expect the document to
/// be durable when an operation returns.
pub trait CatalogStore: Send + Sync {
    /// Load the full catalog.
    fn load(&self) -> Result<Vec<Endpoint>, StoreError>;

    /// Replace the stored catalog with `endpoints`.
    fn save(&self, endpoints: &[Endpoint]) -> Result<(), StoreError>;

    /// Snapshot the catalog before a destructive change. Returns where it went.
    fn backup(&self, endpoints: &[Endpoint]) -> Result<String, StoreError>;
}

// ============================================================================
// JSON file store
// ============================================================================

/// Catalog persisted as a single pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    backup_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn io_error(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn encode(&self, endpoints: &[Endpoint]) -> Result<String, StoreError> {
        serde_json::to_string_pretty(endpoints).map_err(|source| StoreError::Format {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Write to a sibling temp file and rename it into place.
    fn write_atomic(&self, contents: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Self::io_error(parent, e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(|e| Self::io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| Self::io_error(&self.path, e))
    }

    fn backup_path(&self) -> PathBuf {
        let timestamp = Utc::now()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        let mut candidate = self.backup_dir.join(format!("backup-{timestamp}.json"));
        let mut n = 1;
        while candidate.exists() {
            candidate = self.backup_dir.join(format!("backup-{timestamp}-{n}.json"));
            n += 1;
        }
        candidate
    }
}

impl CatalogStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Endpoint>, StoreError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "Catalog file missing, creating an empty one");
            self.write_atomic("[]")?;
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| Self::io_error(&self.path, e))?;
        let endpoints: Vec<Endpoint> =
            serde_json::from_str(&contents).map_err(|source| StoreError::Format {
                path: self.path.display().to_string(),
                source,
            })?;
        info!(
            path = %self.path.display(),
            count = endpoints.len(),
            "Loaded mock endpoints"
        );
        for endpoint in &endpoints {
            debug!(
                project = %endpoint.project,
                method = %endpoint.method,
                path = %endpoint.path,
                "Loaded endpoint"
            );
        }
        Ok(endpoints)
    }

    fn save(&self, endpoints: &[Endpoint]) -> Result<(), StoreError> {
        let json = self.encode(endpoints)?;
        self.write_atomic(&json)?;
        debug!(path = %self.path.display(), count = endpoints.len(), "Saved mock endpoints");
        Ok(())
    }

    fn backup(&self, endpoints: &[Endpoint]) -> Result<String, StoreError> {
        fs::create_dir_all(&self.backup_dir).map_err(|e| Self::io_error(&self.backup_dir, e))?;
        let target = self.backup_path();

        if self.path.exists() {
            fs::copy(&self.path, &target).map_err(|e| Self::io_error(&target, e))?;
        } else {
            let json = self.encode(endpoints)?;
            fs::write(&target, json).map_err(|e| Self::io_error(&target, e))?;
        }

        info!(backup = %target.display(), "Backup created");
        Ok(target.display().to_string())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Volatile store for tests and throwaway servers. Keeps every backup it is handed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Vec<Endpoint>>,
    backups: Mutex<Vec<Vec<Endpoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, as if a document already existed.
    pub fn with_endpoints(endpoints: Vec<Endpoint>) -> Self {
        Self {
            saved: Mutex::new(endpoints),
            backups: Mutex::new(Vec::new()),
        }
    }

    pub fn saved(&self) -> Vec<Endpoint> {
        self.saved.lock().clone()
    }

    pub fn backups(&self) -> Vec<Vec<Endpoint>> {
        self.backups.lock().clone()
    }
}

impl CatalogStore for MemoryStore {
    fn load(&self) -> Result<Vec<Endpoint>, StoreError> {
        Ok(self.saved.lock().clone())
    }

    fn save(&self, endpoints: &[Endpoint]) -> Result<(), StoreError> {
        *self.saved.lock() = endpoints.to_vec();
        Ok(())
    }

    fn backup(&self, endpoints: &[Endpoint]) -> Result<String, StoreError> {
        let mut backups = self.backups.lock();
        backups.push(endpoints.to_vec());
        Ok(format!("memory:{}", backups.len()))
    }
}
