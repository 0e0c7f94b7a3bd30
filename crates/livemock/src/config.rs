//! Configuration for the livemock server.
//!
//! Values come from an optional YAML file and are then overridden by command-line
//! flags or environment variables (see `main.rs`). Every key has a default, so an
//! empty file is a valid configuration.

use crate::live::DEFAULT_INTERCEPT_TIMEOUT;
use crate::registry::DEFAULT_PROJECT;
use crate::request::NormalizeOptions;
use hyper::header::HeaderName;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listener serving mocked endpoints.
    pub mock_addr: SocketAddr,
    /// Listener for the management API.
    pub admin_addr: SocketAddr,
    /// Listener for live operator sessions.
    pub live_addr: SocketAddr,

    /// Persisted endpoint catalog.
    pub data_file: PathBuf,
    /// Where catalog backups are written before deletions.
    pub backup_dir: PathBuf,

    // ===== Request identity =====
    pub default_project: String,
    pub project_header: String,
    pub client_id_header: String,

    /// How long an intercepted request waits for an override, in milliseconds.
    pub intercept_timeout_ms: u64,

    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mock_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            admin_addr: SocketAddr::from(([0, 0, 0, 0], 2525)),
            live_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            data_file: PathBuf::from("./data/mocks.json"),
            backup_dir: PathBuf::from("./data/backups"),
            default_project: DEFAULT_PROJECT.to_string(),
            project_header: "project-name".to_string(),
            client_id_header: "x-client-id".to_string(),
            intercept_timeout_ms: DEFAULT_INTERCEPT_TIMEOUT.as_millis() as u64,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, anyhow::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ServerConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.intercept_timeout_ms == 0 {
            anyhow::bail!("interceptTimeoutMs must be greater than zero");
        }

        if self.default_project.trim().is_empty() {
            anyhow::bail!("defaultProject must not be empty");
        }

        for (key, name) in [
            ("projectHeader", &self.project_header),
            ("clientIdHeader", &self.client_id_header),
        ] {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                anyhow::bail!("{} '{}' is not a valid HTTP header name", key, name);
            }
        }
        if self.project_header.eq_ignore_ascii_case(&self.client_id_header) {
            anyhow::bail!("projectHeader and clientIdHeader must differ");
        }

        let listeners = [
            ("mockAddr", self.mock_addr),
            ("adminAddr", self.admin_addr),
            ("liveAddr", self.live_addr),
        ];
        for (i, (key, addr)) in listeners.iter().enumerate() {
            for (other_key, other) in &listeners[i + 1..] {
                // Port 0 asks the OS for a fresh port, so it never collides.
                if addr.port() != 0 && addr == other {
                    anyhow::bail!("{} and {} both use {}", key, other_key, addr);
                }
            }
        }

        if self.data_file.as_os_str().is_empty() {
            anyhow::bail!("dataFile must not be empty");
        }

        Ok(())
    }

    pub fn intercept_timeout(&self) -> Duration {
        Duration::from_millis(self.intercept_timeout_ms)
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            project_header: self.project_header.to_ascii_lowercase(),
            client_id_header: self.client_id_header.to_ascii_lowercase(),
            default_project: self.default_project.trim().to_string(),
        }
    }
}
