//! HTTP transport seam used by the REST client.
//!
//! The client composes each request as plain data and hands it to a
//! [`Transport`] implementation. Production code uses [`HttpTransport`],
//! which drives `reqwest`; tests substitute a scripted transport so no
//! network is involved.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

/// Default timeout applied to every HTTP request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP methods used by the service operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    /// HTTP GET.
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP DELETE.
    Delete,
}

impl Method {
    /// Canonical wire spelling of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully composed HTTP request, ready for a [`Transport`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WireRequest {
    /// HTTP method to use.
    pub method: Method,
    /// Absolute URL including any query string.
    pub url: String,
    /// Headers to attach, in order.
    pub headers: Vec<(String, String)>,
    /// Request body, when the operation carries one.
    pub body: Option<Vec<u8>>,
}

impl WireRequest {
    /// Returns the first header whose name matches case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

/// A raw HTTP response as seen on the wire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WireResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, in arrival order.
    pub headers: Vec<(String, String)>,
    /// Response body decoded as text.
    pub body: String,
}

impl WireResponse {
    /// Creates a response with the given status and body and no headers.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

/// Errors raised while moving bytes, before any HTTP status is available.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    /// Raised when the request exceeds the configured timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// URL of the request that timed out.
        url: String,
    },
    /// Raised when a connection cannot be established.
    #[error("failed to connect to {url}: {message}")]
    Connection {
        /// URL of the request that failed.
        url: String,
        /// Underlying failure reported by the HTTP stack.
        message: String,
    },
    /// Raised for any other transport level failure.
    #[error("request to {url} failed: {message}")]
    Request {
        /// URL of the request that failed.
        url: String,
        /// Underlying failure reported by the HTTP stack.
        message: String,
    },
}

/// Future returned by transport operations.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Minimal interface for executing composed HTTP requests.
pub trait Transport: Send + Sync {
    /// Executes the request and returns the raw response.
    ///
    /// Implementations report failures to move bytes as [`TransportError`].
    /// A response that arrived with a non-success status is still a
    /// successful execution; status policy belongs to the caller.
    fn execute(&self, request: WireRequest) -> TransportFuture<'_, WireResponse>;
}

/// Transport that performs real HTTP requests through `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with the given per-request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    fn classify(url: &str, error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                url: url.to_owned(),
            }
        } else if error.is_connect() {
            TransportError::Connection {
                url: url.to_owned(),
                message: error.to_string(),
            }
        } else {
            TransportError::Request {
                url: url.to_owned(),
                message: error.to_string(),
            }
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_TIMEOUT)
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: WireRequest) -> TransportFuture<'_, WireResponse> {
        Box::pin(async move {
            let mut builder = match request.method {
                Method::Get => self.client.get(&request.url),
                Method::Post => self.client.post(&request.url),
                Method::Put => self.client.put(&request.url),
                Method::Delete => self.client.delete(&request.url),
            };
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(bytes) = request.body {
                builder = builder.body(bytes);
            }
            let response = builder
                .send()
                .await
                .map_err(|error| Self::classify(&request.url, &error))?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_owned(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect();
            let body = response
                .text()
                .await
                .map_err(|error| Self::classify(&request.url, &error))?;
            Ok(WireResponse {
                status,
                headers,
                body,
            })
        })
    }
}
