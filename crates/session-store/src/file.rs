//! JSON file-backed session store.
//!
//! The file holds one object keyed by upload key:
//!
//! ```json
//! { "abc123": { "key": "abc123", "location": "/files/abc123",
//!               "expires_at": "Sat, 17 Oct 2026 09:00:00 GMT" } }
//! ```
//!
//! Every operation re-reads the file under an OS lock on a sibling
//! `<file>.lock`, so several stores and processes may share one path.
//! Writes go to a temporary file that is renamed over the original.
//! Expired entries are dropped whenever the file is rewritten.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{Clock, SessionRecord, SessionStore, StoreError, SystemClock, ttl_delta};

type Records = BTreeMap<String, SessionRecord>;

/// Session store persisted as a JSON document on disk.
pub struct FileStore {
    path: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

/// Held OS lock; released when the file handle closes.
struct LockGuard(File);

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self::with_clock(path, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            ttl,
            clock,
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn lock(&self, exclusive: bool) -> Result<LockGuard, StoreError> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        if exclusive {
            FileExt::lock_exclusive(&file)?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(LockGuard(file))
    }

    fn load(&self) -> Result<Records, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Records::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Records::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, records: &Records) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, records)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn prune(&self, records: &mut Records) {
        let now = self.clock.now();
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        let pruned = before - records.len();
        if pruned > 0 {
            debug!(path = %self.path.display(), pruned, "dropped expired sessions");
        }
    }
}

impl SessionStore for FileStore {
    fn put(&self, key: &str, location: &str) -> Result<SessionRecord, StoreError> {
        let _guard = self.lock(true)?;
        let mut records = self.load()?;
        self.prune(&mut records);

        let expires_at = self
            .clock
            .now()
            .checked_add_signed(ttl_delta(self.ttl))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);
        // Round-trip through the on-disk format so the returned record
        // matches what a later `get` reads back.
        let expires_at = crate::parse_rfc7231(&crate::format_rfc7231(expires_at))?;

        let record = SessionRecord {
            key: key.to_string(),
            location: location.to_string(),
            expires_at,
        };
        records.insert(key.to_string(), record.clone());
        self.save(&records)?;

        debug!(key, location, path = %self.path.display(), "session stored");
        Ok(record)
    }

    fn get(&self, key: &str) -> Result<Option<SessionRecord>, StoreError> {
        let _guard = self.lock(false)?;
        let now = self.clock.now();
        let records = self.load()?;
        Ok(records.get(key).filter(|r| !r.is_expired(now)).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let _guard = self.lock(true)?;
        let mut records = self.load()?;
        let removed = records.remove(key).is_some();
        if removed {
            self.prune(&mut records);
            self.save(&records)?;
        }
        Ok(removed)
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
