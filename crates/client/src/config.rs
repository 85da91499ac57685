//! Client configuration.
//!
//! Read from a JSON file where every field is optional:
//!
//! ```json
//! {
//!   "base_url": "https://localhost:9200",
//!   "api_path": "/remote.php/dav/spaces/some-space",
//!   "checksum_algorithm": "sha1",
//!   "cache_ttl_secs": 3600,
//!   "cache_file": "/tmp/tus-sessions.json",
//!   "headers": { "Authorization": "Basic YWRtaW46YWRtaW4=" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tuskit_protocol::ChecksumAlgorithm;
use tuskit_protocol::constants::DEFAULT_API_PATH;
use tuskit_session_store::{FileStore, MemoryStore, SessionStore};

use crate::TusError;

/// Default chunk size for [`TusClient::upload_all`](crate::TusClient::upload_all): 4 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server root, e.g. `http://localhost:1080`.
    pub base_url: String,
    /// Collection endpoint uploads are created against.
    pub api_path: String,
    pub checksum_algorithm: ChecksumAlgorithm,
    /// Session time-to-live applied by the session store.
    pub cache_ttl_secs: u64,
    /// When set, sessions persist to this JSON file instead of memory.
    pub cache_file: Option<PathBuf>,
    /// Per-request timeout. `None` leaves it to the HTTP client.
    pub timeout_secs: Option<u64>,
    /// Bytes per PATCH when uploading in chunks.
    pub chunk_size: u64,
    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_path: DEFAULT_API_PATH.to_string(),
            checksum_algorithm: ChecksumAlgorithm::default(),
            cache_ttl_secs: tuskit_session_store::DEFAULT_TTL.as_secs(),
            cache_file: None,
            timeout_secs: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// Config for `base_url` with every other field defaulted.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Loads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, TusError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TusError::Config(format!("{}: {e}", path.display())))?;
        let config: ClientConfig = serde_json::from_str(&content)
            .map_err(|e| TusError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TusError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(TusError::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.chunk_size == 0 {
            return Err(TusError::Config("chunk_size must be positive".into()));
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Builds the configured session store.
    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        match &self.cache_file {
            Some(path) => Arc::new(FileStore::new(path.clone(), self.ttl())),
            None => Arc::new(MemoryStore::new(self.ttl())),
        }
    }
}
