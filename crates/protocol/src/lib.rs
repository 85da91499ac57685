//! Wire vocabulary of the TUS 1.0.0 resumable upload protocol.
//!
//! Header names, protocol constants, the `Upload-Metadata` codec and the
//! `Upload-Checksum` algorithms shared by the client and session crates.

pub mod checksum;
pub mod constants;
pub mod metadata;

pub use checksum::{ChecksumAlgorithm, checksum_header, hex_digest};
pub use metadata::{Metadata, decode_metadata, encode_metadata};

/// Errors produced while encoding or decoding protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unsupported checksum algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("malformed metadata pair: {0}")]
    MalformedMetadata(String),

    #[error("metadata value for {key} is not valid base64: {source}")]
    MetadataBase64 {
        key: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("metadata value for {0} is not valid UTF-8")]
    MetadataUtf8(String),
}
