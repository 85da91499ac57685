//! Builders for the protocol's requests.
//!
//! Each builder starts from the client's default headers and then sets the
//! protocol headers, so a default never shadows a protocol value.

use reqwest::Method;
use tuskit_protocol::constants::{
    CONCAT_PARTIAL, CONTENT_LENGTH, CONTENT_TYPE, OFFSET_OCTET_STREAM, UPLOAD_CHECKSUM,
    UPLOAD_CONCAT, UPLOAD_KEY, UPLOAD_LENGTH, UPLOAD_METADATA, UPLOAD_OFFSET, concat_final_value,
};

use crate::transport::TusRequest;

/// Per-file header values shared by create and concat requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeaders {
    pub length: u64,
    pub checksum: String,
    pub metadata: String,
}

fn with_defaults(method: Method, target: &str, defaults: &[(String, String)]) -> TusRequest {
    let mut req = TusRequest::new(method, target);
    for (name, value) in defaults {
        req.set_header(name.clone(), value.clone());
    }
    req
}

fn attach_payload(req: &mut TusRequest, payload: Vec<u8>) {
    if payload.is_empty() {
        return;
    }
    req.set_header(CONTENT_TYPE, OFFSET_OCTET_STREAM);
    req.set_header(CONTENT_LENGTH, payload.len().to_string());
    req.body = payload;
}

/// POST creating an upload, optionally carrying its first bytes.
///
/// An empty `payload` produces a header-only request without
/// `Content-Type`/`Content-Length`.
pub fn create_request(
    defaults: &[(String, String)],
    api_path: &str,
    key: &str,
    file: &FileHeaders,
    partial: bool,
    payload: Vec<u8>,
) -> TusRequest {
    let mut req = with_defaults(Method::POST, api_path, defaults);
    req.set_header(UPLOAD_LENGTH, file.length.to_string());
    req.set_header(UPLOAD_KEY, key);
    req.set_header(UPLOAD_CHECKSUM, file.checksum.clone());
    req.set_header(UPLOAD_METADATA, file.metadata.clone());
    attach_payload(&mut req, payload);
    if partial {
        req.set_header(UPLOAD_CONCAT, CONCAT_PARTIAL);
    }
    req
}

/// PATCH sending `payload` at `offset`.
pub fn patch_request(
    defaults: &[(String, String)],
    location: &str,
    offset: u64,
    checksum: &str,
    partial: bool,
    payload: Vec<u8>,
) -> TusRequest {
    let mut req = with_defaults(Method::PATCH, location, defaults);
    req.set_header(CONTENT_TYPE, OFFSET_OCTET_STREAM);
    req.set_header(CONTENT_LENGTH, payload.len().to_string());
    req.set_header(UPLOAD_CHECKSUM, checksum);
    req.set_header(UPLOAD_OFFSET, offset.to_string());
    if partial {
        req.set_header(UPLOAD_CONCAT, CONCAT_PARTIAL);
    }
    req.body = payload;
    req
}

/// HEAD querying the current offset.
pub fn head_request(defaults: &[(String, String)], location: &str) -> TusRequest {
    with_defaults(Method::HEAD, location, defaults)
}

/// DELETE terminating an upload.
pub fn delete_request(defaults: &[(String, String)], location: &str) -> TusRequest {
    with_defaults(Method::DELETE, location, defaults)
}

/// POST concatenating previously uploaded partials into a final upload.
///
/// The final upload's length is implied by its partials, so no
/// `Upload-Length` is sent.
pub fn concat_request<S: AsRef<str>>(
    defaults: &[(String, String)],
    api_path: &str,
    key: &str,
    file: Option<&FileHeaders>,
    partials: &[S],
) -> TusRequest {
    let mut req = with_defaults(Method::POST, api_path, defaults);
    req.set_header(UPLOAD_KEY, key);
    if let Some(file) = file {
        req.set_header(UPLOAD_CHECKSUM, file.checksum.clone());
        req.set_header(UPLOAD_METADATA, file.metadata.clone());
    }
    req.set_header(UPLOAD_CONCAT, concat_final_value(partials));
    req
}
