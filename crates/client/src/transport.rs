//! Transport seam between the client and the wire.
//!
//! `Transport` is implemented over `reqwest` by [`HttpTransport`]; tests
//! swap in a recording mock. Every HTTP status comes back as a
//! [`RawResponse`] so callers can inspect 4xx/5xx replies. Only failures
//! below HTTP (connect, timeout, body read) are errors.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use tracing::debug;
use tuskit_protocol::constants;

use crate::TusError;

/// A protocol request, independent of the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TusRequest {
    pub method: Method,
    /// Absolute URL or a path resolved against the transport's base URL.
    pub target: String,
    /// Headers in the order they were set. Names are unique, case-insensitively.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TusRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Sets a header, replacing any existing value for the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The server's reply, whatever its status.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// First value of `name` as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parses `Upload-Offset`.
    pub fn upload_offset(&self) -> Result<u64, TusError> {
        let raw = self
            .header(constants::UPLOAD_OFFSET)
            .ok_or(TusError::MissingHeader(constants::UPLOAD_OFFSET))?;
        raw.trim().parse().map_err(|_| TusError::InvalidHeader {
            name: constants::UPLOAD_OFFSET,
            value: raw.to_string(),
        })
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs protocol requests.
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the response for any HTTP status.
    fn send(
        &self,
        request: TusRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, TusError>> + Send + '_>>;
}

/// `reqwest`-backed transport rooted at a server base URL.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport with no request timeout.
    pub fn new(base_url: &str) -> Result<Self, TusError> {
        Self::with_timeout(base_url, None)
    }

    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self, TusError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves a request target against the base URL.
    pub fn resolve(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else if target.starts_with('/') {
            format!("{}{}", self.base_url, target)
        } else {
            format!("{}/{}", self.base_url, target)
        }
    }

    async fn execute(&self, request: TusRequest) -> Result<RawResponse, TusError> {
        let url = self.resolve(&request.target);
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            // reqwest derives Content-Length from the body, which always
            // matches the header the request builders set.
            if name.eq_ignore_ascii_case(constants::CONTENT_LENGTH) {
                continue;
            }
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                TusError::Config(format!("invalid header name: {name}"))
            })?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| TusError::Config(format!("invalid value for header {name}")))?;
            headers.insert(name, value);
        }

        debug!(method = %request.method, url = %url, bytes = request.body.len(), "sending request");

        let resp = self
            .http
            .request(request.method, &url)
            .headers(headers)
            .body(request.body)
            .send()
            .await?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?.to_vec();

        debug!(url = %url, status = status.as_u16(), "received response");

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: TusRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, TusError>> + Send + '_>> {
        Box::pin(self.execute(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Starts a one-shot HTTP server replying with `response` verbatim.
    ///
    /// The raw request text is returned through the join handle.
    async fn mock_server(response: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let response = response.to_string();

        let handle = tokio::spawn(async move {
            let mut request = String::new();
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 65536];
                let mut total = Vec::new();
                // Read until the headers and the declared body have arrived.
                loop {
                    let n = stream.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    total.extend_from_slice(&buf[..n]);
                    if request_complete(&total) {
                        break;
                    }
                }
                request = String::from_utf8_lossy(&total).into_owned();

                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
            request
        });

        (url, handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..head_end]
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= head_end + 4 + content_length
    }

    #[tokio::test]
    async fn post_returns_created_response() {
        let (url, handle) = mock_server(
            "HTTP/1.1 201 Created\r\nLocation: /files/abc123\r\nUpload-Offset: 5\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let transport = HttpTransport::new(&url).unwrap();
        let mut req = TusRequest::new(Method::POST, "/files");
        req.set_header("Upload-Length", "5");
        req.set_header("Upload-Key", "abc123");
        req.set_header("Content-Length", "5");
        req.body = b"hello".to_vec();

        let resp = transport.send(req).await.unwrap();
        assert_eq!(resp.status, StatusCode::CREATED);
        assert_eq!(resp.header("location"), Some("/files/abc123"));
        assert_eq!(resp.upload_offset().unwrap(), 5);

        let raw = handle.await.unwrap();
        let lower = raw.to_ascii_lowercase();
        assert!(raw.starts_with("POST /files HTTP/1.1"));
        assert!(lower.contains("upload-length: 5"));
        assert!(lower.contains("upload-key: abc123"));
        assert!(lower.contains("content-length: 5"));
        assert!(raw.ends_with("hello"));
    }

    #[tokio::test]
    async fn client_error_is_returned_not_raised() {
        let (url, handle) = mock_server(
            "HTTP/1.1 412 Precondition Failed\r\nContent-Length: 7\r\nConnection: close\r\n\r\nno tus!",
        )
        .await;

        let transport = HttpTransport::new(&url).unwrap();
        let resp = transport
            .send(TusRequest::new(Method::POST, "/files"))
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(resp.body_text(), "no tus!");

        handle.abort();
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = HttpTransport::new(&format!("http://127.0.0.1:{port}")).unwrap();
        let err = transport
            .send(TusRequest::new(Method::HEAD, "/files/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TusError::Transport(_)));
    }

    #[test]
    fn resolve_targets() {
        let transport = HttpTransport::new("http://localhost:9200/").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:9200");
        assert_eq!(
            transport.resolve("/files/abc"),
            "http://localhost:9200/files/abc"
        );
        assert_eq!(transport.resolve("files"), "http://localhost:9200/files");
        assert_eq!(
            transport.resolve("https://other.host/files/1"),
            "https://other.host/files/1"
        );
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut req = TusRequest::new(Method::PATCH, "/files/1");
        req.set_header("Tus-Resumable", "0.2.2");
        req.set_header("tus-resumable", "1.0.0");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("TUS-RESUMABLE"), Some("1.0.0"));
    }

    #[test]
    fn upload_offset_parsing() {
        let resp = RawResponse::new(StatusCode::NO_CONTENT).with_header("Upload-Offset", "512");
        assert_eq!(resp.upload_offset().unwrap(), 512);

        let missing = RawResponse::new(StatusCode::NO_CONTENT);
        assert!(matches!(
            missing.upload_offset(),
            Err(TusError::MissingHeader("Upload-Offset"))
        ));

        let bad = RawResponse::new(StatusCode::NO_CONTENT).with_header("Upload-Offset", "-1");
        assert!(matches!(
            bad.upload_offset(),
            Err(TusError::InvalidHeader { .. })
        ));
    }
}
