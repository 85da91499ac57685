//! Client error types.

use tuskit_protocol::ProtocolError;
use tuskit_session_store::StoreError;

/// Errors produced by the upload client.
///
/// HTTP error statuses never surface from the transport itself; the client
/// inspects the returned response and maps it to one of these.
#[derive(Debug, thiserror::Error)]
pub enum TusError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("Unable to create resource.")]
    UploadCreation { status: u16 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("requested {len} bytes at offset {offset}, file has {size}")]
    InvalidByteRange { offset: u64, len: u64, size: u64 },

    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("invalid {name} header: {value}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("no upload key set")]
    MissingKey,

    #[error("no file registered")]
    NoFile,

    #[error("upload already started")]
    UploadStarted,

    #[error("The uploaded file is corrupt.")]
    CorruptUpload,

    #[error("Unsupported media types.")]
    UnsupportedMediaType,

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("upload stalled at offset {0}")]
    Stalled(u64),

    #[error("server returned {status}: {body}")]
    Protocol { status: u16, body: String },

    #[error("session store error: {0}")]
    Store(#[from] StoreError),

    #[error("protocol error: {0}")]
    Value(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
