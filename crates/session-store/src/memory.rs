use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::debug;

use crate::{Clock, SessionRecord, SessionStore, StoreError, SystemClock, ttl_delta};

/// Process-local session store (thread-safe).
pub struct MemoryStore {
    records: RwLock<HashMap<String, SessionRecord>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Creates an empty store using the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Number of records held, expired ones included.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(crate::DEFAULT_TTL)
    }
}

impl SessionStore for MemoryStore {
    fn put(&self, key: &str, location: &str) -> Result<SessionRecord, StoreError> {
        let now = self.clock.now();
        let record = SessionRecord {
            key: key.to_string(),
            location: location.to_string(),
            expires_at: now
                .checked_add_signed(ttl_delta(self.ttl))
                .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC),
        };
        self.records
            .write()
            .unwrap()
            .insert(key.to_string(), record.clone());
        debug!(key, location, "session stored");
        Ok(record)
    }

    fn get(&self, key: &str) -> Result<Option<SessionRecord>, StoreError> {
        let now = self.clock.now();
        let records = self.records.read().unwrap();
        Ok(records
            .get(key)
            .filter(|r| !r.is_expired(now))
            .cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().unwrap().remove(key).is_some())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
