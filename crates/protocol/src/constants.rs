//! Header names and fixed protocol values.

/// Protocol version sent in `Tus-Resumable` on every request.
pub const TUS_VERSION: &str = "1.0.0";

/// Content type required for request bodies carrying upload bytes.
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Default collection endpoint uploads are created against.
pub const DEFAULT_API_PATH: &str = "/files";

pub const TUS_RESUMABLE: &str = "Tus-Resumable";
pub const UPLOAD_LENGTH: &str = "Upload-Length";
pub const UPLOAD_OFFSET: &str = "Upload-Offset";
pub const UPLOAD_KEY: &str = "Upload-Key";
pub const UPLOAD_CHECKSUM: &str = "Upload-Checksum";
pub const UPLOAD_METADATA: &str = "Upload-Metadata";
pub const UPLOAD_CONCAT: &str = "Upload-Concat";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const LOCATION: &str = "Location";

/// `Upload-Concat` value marking one part of a concatenated upload.
pub const CONCAT_PARTIAL: &str = "partial";

/// Prefix of the `Upload-Concat` value for the final concatenation request.
pub const CONCAT_FINAL: &str = "final";

/// Status returned by servers that reject an `Upload-Checksum`.
pub const STATUS_CHECKSUM_MISMATCH: u16 = 460;

/// Builds the `Upload-Concat` value that joins previously uploaded partials.
pub fn concat_final_value<S: AsRef<str>>(partials: &[S]) -> String {
    let joined = partials
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(" ");
    format!("{CONCAT_FINAL};{joined}")
}
