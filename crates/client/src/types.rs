//! Result and state types returned by the client.

use serde::{Deserialize, Serialize};

/// Outcome of a create call that may have carried upload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedUpload {
    /// Server-assigned resource URL.
    pub location: String,
    /// Bytes the server holds after the call; 0 when none were sent.
    pub offset: u64,
}

/// Where an upload stands, as far as the client can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadState {
    /// No live session for the key.
    NotCreated,
    /// Created on the server, no bytes received yet.
    Created,
    /// Partially received; holds the server's offset.
    InProgress(u64),
    /// Offset reached the file size.
    Completed,
    /// The session this client created has outlived its TTL.
    Expired,
}
