//! Upload session records keyed by upload key, with a store-wide TTL.
//!
//! A [`SessionRecord`] remembers where the server put an upload and until
//! when that location may be reused. Stores filter expired records
//! themselves; callers never see a stale location.

mod clock;
mod file;
mod memory;
mod record;

use std::time::Duration;

pub use clock::{Clock, ManualClock, SystemClock};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::{SessionRecord, format_rfc7231, parse_rfc7231};

/// Default session time-to-live: one day.
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// Errors produced by session stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid timestamp: {0}")]
    Timestamp(String),
}

/// Mapping from upload key to [`SessionRecord`].
///
/// Implementations must tolerate concurrent writes to different keys.
pub trait SessionStore: Send + Sync {
    /// Stores `location` under `key`, expiring `ttl()` from now.
    ///
    /// Any existing record for `key` is overwritten.
    fn put(&self, key: &str, location: &str) -> Result<SessionRecord, StoreError>;

    /// Returns the record for `key`, or `None` if missing or expired.
    fn get(&self, key: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Removes the record for `key`. Returns `true` if one was present.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Time-to-live applied by [`put`](Self::put).
    fn ttl(&self) -> Duration;
}

/// Converts a TTL into a chrono delta, saturating on overflow.
pub(crate) fn ttl_delta(ttl: Duration) -> chrono::TimeDelta {
    chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX)
}
