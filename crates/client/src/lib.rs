//! Resumable upload client speaking TUS 1.0.0.
//!
//! A [`TusClient`] registers one local file, creates the upload on the
//! server, sends it in one or more PATCH requests and remembers the
//! upload location in a [`SessionStore`](tuskit_session_store::SessionStore)
//! so a later run can resume where the server left off.

mod client;
mod config;
mod descriptor;
mod error;
mod request;
mod transport;
mod types;

#[cfg(test)]
mod testing;

pub use client::TusClient;
pub use config::{ClientConfig, DEFAULT_CHUNK_SIZE};
pub use descriptor::{FILENAME_KEY, UploadDescriptor};
pub use error::TusError;
pub use request::FileHeaders;
pub use transport::{HttpTransport, RawResponse, Transport, TusRequest};
pub use types::{CreatedUpload, UploadState};
