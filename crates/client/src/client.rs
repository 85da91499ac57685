//! Upload orchestrator.
//!
//! Sequences descriptor preparation, transport calls and session-store
//! updates for a single logical upload. Every call performs its HTTP
//! exchanges in order and returns or fails; nothing is retried.

use std::sync::Arc;

use reqwest::StatusCode;
use tracing::{debug, info, warn};
use tuskit_protocol::constants::{LOCATION, STATUS_CHECKSUM_MISMATCH, TUS_RESUMABLE, TUS_VERSION};
use tuskit_protocol::{ChecksumAlgorithm, checksum_header};
use tuskit_session_store::{Clock, SessionRecord, SessionStore, SystemClock};

use crate::config::ClientConfig;
use crate::descriptor::UploadDescriptor;
use crate::request::{
    FileHeaders, concat_request, create_request, delete_request, head_request, patch_request,
};
use crate::transport::{HttpTransport, RawResponse, Transport};
use crate::types::{CreatedUpload, UploadState};
use crate::TusError;

/// Client for one resumable upload.
pub struct TusClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    api_path: String,
    headers: Vec<(String, String)>,
    checksum_algorithm: ChecksumAlgorithm,
    chunk_size: u64,
    key: Option<String>,
    descriptor: Option<UploadDescriptor>,
    partial: bool,
    started: bool,
    last_session: Option<SessionRecord>,
}

impl TusClient {
    /// Creates a client over an explicit transport and session store.
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let mut headers = vec![(TUS_RESUMABLE.to_string(), TUS_VERSION.to_string())];
        for (name, value) in &config.headers {
            set_header(&mut headers, name, value);
        }

        Self {
            transport,
            store,
            clock: Arc::new(SystemClock),
            api_path: config.api_path.clone(),
            headers,
            checksum_algorithm: config.checksum_algorithm,
            chunk_size: config.chunk_size,
            key: None,
            descriptor: None,
            partial: false,
            started: false,
            last_session: None,
        }
    }

    /// Creates a client with an HTTP transport and the configured store.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TusError> {
        config.validate()?;
        let transport = HttpTransport::with_timeout(&config.base_url, config.timeout())?;
        Ok(Self::new(config, Arc::new(transport), config.session_store()))
    }

    /// Replaces the clock used to detect expired sessions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    /// Registers the file to upload. Starts a fresh upload.
    pub fn file(
        &mut self,
        path: impl AsRef<std::path::Path>,
        name: Option<&str>,
    ) -> Result<&mut Self, TusError> {
        self.descriptor = Some(UploadDescriptor::register(path, name)?);
        self.started = false;
        Ok(self)
    }

    pub fn set_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.key = Some(key.into());
        self
    }

    pub fn set_api_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.api_path = path.into();
        self
    }

    pub fn set_checksum_algorithm(&mut self, algorithm: ChecksumAlgorithm) -> &mut Self {
        self.checksum_algorithm = algorithm;
        self
    }

    pub fn set_chunk_size(&mut self, bytes: u64) -> &mut Self {
        self.chunk_size = bytes.max(1);
        self
    }

    /// Marks uploads from this client as partials of a concatenation.
    pub fn partial(&mut self, state: bool) -> &mut Self {
        self.partial = state;
        self
    }

    /// Adds a header sent with every request.
    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        set_header(&mut self.headers, name, value);
        self
    }

    /// Adds an `Upload-Metadata` entry. Refused once the upload has started.
    pub fn add_metadata(&mut self, key: &str, value: &str) -> Result<&mut Self, TusError> {
        if self.started {
            return Err(TusError::UploadStarted);
        }
        let descriptor = self.descriptor.as_mut().ok_or(TusError::NoFile)?;
        descriptor.add_metadata(key, value);
        Ok(self)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn api_path(&self) -> &str {
        &self.api_path
    }

    /// Key the session is cached under, if set.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn checksum_algorithm(&self) -> ChecksumAlgorithm {
        self.checksum_algorithm
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Headers sent with every request.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn descriptor(&self) -> Option<&UploadDescriptor> {
        self.descriptor.as_ref()
    }

    /// `Upload-Checksum` value of the registered file.
    pub fn checksum_header(&self) -> Result<String, TusError> {
        self.require_descriptor()?
            .checksum_header(self.checksum_algorithm)
    }

    /// `Upload-Metadata` value of the registered file.
    pub fn metadata_header(&self) -> Result<String, TusError> {
        Ok(self.require_descriptor()?.metadata_header())
    }

    /// Cached upload location, if a live session exists.
    pub fn url(&self) -> Result<Option<String>, TusError> {
        let Some(key) = self.key.as_deref() else {
            return Ok(None);
        };
        Ok(self.store.get(key)?.map(|r| r.location))
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Creates the upload and returns the server's raw response.
    ///
    /// `bytes` is how much of the file to send with the request; `None`
    /// sends the whole file, `Some(0)` sends headers only. Anything but
    /// `201 Created` fails with [`TusError::UploadCreation`] and leaves the
    /// session store untouched.
    ///
    /// The location is cached under the client's key. Without a prior
    /// [`set_key`](Self::set_key), the first create call's `key` becomes the
    /// client's key and stays so: later creates with another `key` still
    /// overwrite that first record.
    pub async fn create_upload_with_response(
        &mut self,
        key: &str,
        bytes: Option<u64>,
    ) -> Result<RawResponse, TusError> {
        let (response, _) = self.create_inner(key, bytes).await?;
        Ok(response)
    }

    /// Creates the upload and reports where it lives and how much arrived.
    ///
    /// A 201 without a usable `Upload-Offset` reports offset 0; a later
    /// [`upload`](Self::upload) asks the server where to resume.
    pub async fn create_with_upload(
        &mut self,
        key: &str,
        bytes: Option<u64>,
    ) -> Result<CreatedUpload, TusError> {
        let (response, location) = self.create_inner(key, bytes).await?;
        let sent = bytes.unwrap_or(self.require_descriptor()?.size());
        let offset = if sent == 0 {
            0
        } else {
            match response.upload_offset() {
                Ok(offset) => offset,
                Err(e) => {
                    warn!(key, location = %location, error = %e, "creation response reports no offset");
                    0
                }
            }
        };
        Ok(CreatedUpload { location, offset })
    }

    /// Creates the upload without sending any bytes and returns its location.
    pub async fn create(&mut self, key: &str) -> Result<String, TusError> {
        Ok(self.create_with_upload(key, Some(0)).await?.location)
    }

    async fn create_inner(
        &mut self,
        key: &str,
        bytes: Option<u64>,
    ) -> Result<(RawResponse, String), TusError> {
        let descriptor = self.require_descriptor()?.clone();
        let size = descriptor.size();
        let bytes = bytes.unwrap_or(size);
        if bytes > size {
            return Err(TusError::InvalidByteRange {
                offset: 0,
                len: bytes,
                size,
            });
        }

        let (file, payload) = self.prepare(descriptor, 0, bytes).await?;
        let request = create_request(
            &self.headers,
            &self.api_path,
            key,
            &file,
            self.partial,
            payload,
        );

        let response = self.transport.send(request).await?;
        if response.status != StatusCode::CREATED {
            warn!(key, status = response.status.as_u16(), "upload creation rejected");
            return Err(TusError::UploadCreation {
                status: response.status.as_u16(),
            });
        }

        let location = response
            .header(LOCATION)
            .ok_or(TusError::MissingHeader(LOCATION))?
            .to_string();

        let session_key = self.key.get_or_insert_with(|| key.to_string()).clone();
        let record = self.store.put(&session_key, &location)?;
        self.last_session = Some(record);
        self.started = true;

        info!(key = %session_key, location = %location, bytes, "upload created");
        Ok((response, location))
    }

    /// Builds the per-file headers and reads `len` bytes at `offset`.
    async fn prepare(
        &self,
        descriptor: UploadDescriptor,
        offset: u64,
        len: u64,
    ) -> Result<(FileHeaders, Vec<u8>), TusError> {
        let algorithm = self.checksum_algorithm;
        tokio::task::spawn_blocking(move || -> Result<_, TusError> {
            let file = FileHeaders {
                length: descriptor.size(),
                checksum: descriptor.checksum_header(algorithm)?,
                metadata: descriptor.metadata_header(),
            };
            let payload = descriptor.read_range(offset, len)?;
            Ok((file, payload))
        })
        .await?
    }

    // -----------------------------------------------------------------------
    // Transfer
    // -----------------------------------------------------------------------

    /// Sends the next `bytes` of the file (`None`: everything left).
    ///
    /// Resumes from the server's offset when a live session exists and
    /// creates the upload otherwise, including after the session expired.
    /// Returns the server's new offset.
    pub async fn upload(&mut self, bytes: Option<u64>) -> Result<u64, TusError> {
        let key = self.key.clone().ok_or(TusError::MissingKey)?;
        let size = self.require_descriptor()?.size();

        let offset = match self.head_offset(&key).await {
            Ok(offset) => offset,
            Err(TusError::FileNotFound(_)) => {
                if self.session_expired(&key) {
                    warn!(key = %key, "session expired, creating a new upload");
                }
                self.create(&key).await?;
                0
            }
            Err(e) => return Err(e),
        };

        if offset >= size {
            self.started = true;
            return Ok(offset);
        }

        let remaining = size - offset;
        let len = bytes.map_or(remaining, |b| b.min(remaining));
        let location = self
            .store
            .get(&key)?
            .map(|r| r.location)
            .ok_or_else(|| TusError::FileNotFound(key.clone()))?;

        self.patch_chunk(&location, offset, len).await
    }

    /// Uploads the rest of the file in `chunk_size` pieces.
    pub async fn upload_all(&mut self) -> Result<u64, TusError> {
        let size = self.require_descriptor()?.size();
        let chunk_size = self.chunk_size;
        let mut last = None;
        loop {
            let offset = self.upload(Some(chunk_size)).await?;
            if offset >= size {
                info!(key = ?self.key, size, "upload complete");
                return Ok(offset);
            }
            if last.is_some_and(|prev| offset <= prev) {
                return Err(TusError::Stalled(offset));
            }
            last = Some(offset);
        }
    }

    async fn patch_chunk(
        &mut self,
        location: &str,
        offset: u64,
        len: u64,
    ) -> Result<u64, TusError> {
        let descriptor = self.require_descriptor()?.clone();
        let algorithm = self.checksum_algorithm;
        let (payload, checksum) = tokio::task::spawn_blocking(move || -> Result<_, TusError> {
            let payload = descriptor.read_range(offset, len)?;
            let checksum = checksum_header(algorithm, &algorithm.digest_bytes(&payload));
            Ok((payload, checksum))
        })
        .await??;

        let request = patch_request(
            &self.headers,
            location,
            offset,
            &checksum,
            self.partial,
            payload,
        );
        let response = self.transport.send(request).await?;

        match response.status.as_u16() {
            200 | 204 => {
                let new_offset = response.upload_offset()?;
                self.started = true;
                debug!(location, offset, new_offset, "chunk accepted");
                Ok(new_offset)
            }
            404 | 410 => Err(TusError::FileNotFound(location.to_string())),
            415 => Err(TusError::UnsupportedMediaType),
            416 => Err(TusError::CorruptUpload),
            STATUS_CHECKSUM_MISMATCH => Err(TusError::ChecksumMismatch),
            status => Err(TusError::Protocol {
                status,
                body: response.body_text(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Status and termination
    // -----------------------------------------------------------------------

    /// Server-side offset, or `None` if there is no live upload.
    pub async fn offset(&self) -> Result<Option<u64>, TusError> {
        let Some(key) = self.key.as_deref() else {
            return Ok(None);
        };
        match self.head_offset(key).await {
            Ok(offset) => Ok(Some(offset)),
            Err(TusError::FileNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn head_offset(&self, key: &str) -> Result<u64, TusError> {
        let record = self
            .store
            .get(key)?
            .ok_or_else(|| TusError::FileNotFound(key.to_string()))?;

        let response = self
            .transport
            .send(head_request(&self.headers, &record.location))
            .await?;

        if response.status == StatusCode::OK {
            response.upload_offset()
        } else if response.status.is_client_error() {
            Err(TusError::FileNotFound(record.location))
        } else {
            Err(TusError::Protocol {
                status: response.status.as_u16(),
                body: response.body_text(),
            })
        }
    }

    /// Terminates the upload on the server and forgets the session.
    pub async fn delete(&mut self) -> Result<(), TusError> {
        let key = self.key.clone().ok_or(TusError::MissingKey)?;
        let record = self
            .store
            .get(&key)?
            .ok_or_else(|| TusError::FileNotFound(key.clone()))?;

        let response = self
            .transport
            .send(delete_request(&self.headers, &record.location))
            .await?;

        match response.status.as_u16() {
            200 | 204 => {
                self.store.delete(&key)?;
                self.started = false;
                info!(key = %key, location = %record.location, "upload terminated");
                Ok(())
            }
            404 | 410 => {
                self.store.delete(&key)?;
                Err(TusError::FileNotFound(record.location))
            }
            status => Err(TusError::Protocol {
                status,
                body: response.body_text(),
            }),
        }
    }

    /// Concatenates uploaded partials into a final upload. Returns its location.
    pub async fn concat<S: AsRef<str>>(
        &self,
        key: &str,
        partials: &[S],
    ) -> Result<String, TusError> {
        let file = match self.descriptor.clone() {
            Some(descriptor) => Some(self.prepare(descriptor, 0, 0).await?.0),
            None => None,
        };

        let request = concat_request(&self.headers, &self.api_path, key, file.as_ref(), partials);
        let response = self.transport.send(request).await?;
        if response.status != StatusCode::CREATED {
            warn!(key, status = response.status.as_u16(), "concatenation rejected");
            return Err(TusError::UploadCreation {
                status: response.status.as_u16(),
            });
        }

        let location = response
            .header(LOCATION)
            .ok_or(TusError::MissingHeader(LOCATION))?
            .to_string();
        info!(key, location = %location, partials = partials.len(), "uploads concatenated");
        Ok(location)
    }

    /// Works out where the upload stands, asking the server when a session exists.
    pub async fn state(&self) -> Result<UploadState, TusError> {
        let Some(key) = self.key.as_deref() else {
            return Ok(UploadState::NotCreated);
        };

        if self.store.get(key)?.is_none() {
            return Ok(if self.session_expired(key) {
                UploadState::Expired
            } else {
                UploadState::NotCreated
            });
        }

        let offset = match self.head_offset(key).await {
            Ok(offset) => offset,
            Err(TusError::FileNotFound(_)) => return Ok(UploadState::NotCreated),
            Err(e) => return Err(e),
        };

        let size = self.descriptor.as_ref().map(UploadDescriptor::size);
        Ok(match size {
            Some(size) if offset >= size => UploadState::Completed,
            _ if offset == 0 => UploadState::Created,
            _ => UploadState::InProgress(offset),
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn require_descriptor(&self) -> Result<&UploadDescriptor, TusError> {
        self.descriptor.as_ref().ok_or(TusError::NoFile)
    }

    /// `true` if the last session this client created for `key` has expired.
    fn session_expired(&self, key: &str) -> bool {
        self.last_session
            .as_ref()
            .is_some_and(|r| r.key == key && r.is_expired(self.clock.now()))
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers
        .iter_mut()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
    {
        Some(entry) => entry.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}
