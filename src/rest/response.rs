//! Typed response wrappers returned by REST operations.

use std::ops::Deref;

use serde::de::DeserializeOwned;

use super::error::RestError;
use super::transport::{Method, WireResponse};

/// A service response prior to payload decoding.
///
/// Carries the method and path of the originating request so that status
/// failures can report where they came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    /// Method of the originating request.
    pub method: Method,
    /// Path of the originating request, relative to the service endpoint.
    pub path: String,
    /// HTTP status returned by the service.
    pub status: u16,
    /// Response headers, in arrival order.
    pub headers: Vec<(String, String)>,
    /// Raw response body.
    pub body: String,
}

impl Response {
    pub(crate) fn from_wire(method: Method, path: String, wire: WireResponse) -> Self {
        Self {
            method,
            path,
            status: wire.status,
            headers: wire.headers,
            body: wire.body,
        }
    }

    /// Returns the first header whose name matches case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Checks the response status against the set the caller expects.
    ///
    /// Every operation calls this exactly once before touching the payload;
    /// no other code path inspects statuses. A 404 outside the expected set
    /// is reported as [`RestError::NotFound`] so callers can distinguish a
    /// missing resource from other failures. A 404 inside the expected set
    /// is a success like any other listed status.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] for a 404 outside the expected set and
    /// [`RestError::UnexpectedStatus`] for any other status outside it.
    pub fn expected_success(&self, expected: &[u16]) -> Result<(), RestError> {
        if expected.contains(&self.status) {
            return Ok(());
        }
        if self.status == 404 {
            return Err(RestError::NotFound {
                method: self.method,
                path: self.path.clone(),
            });
        }
        Err(RestError::UnexpectedStatus {
            method: self.method,
            path: self.path.clone(),
            status: self.status,
            expected: expected.to_vec(),
            body: self.body.clone(),
        })
    }

    /// Decodes the body as JSON into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Payload`] when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<ResponseBody<T>, RestError> {
        let payload = serde_json::from_str(&self.body).map_err(|error| RestError::Payload {
            path: self.path.clone(),
            message: format!("could not decode response body: {error}"),
        })?;
        Ok(ResponseBody {
            status: self.status,
            headers: self.headers,
            body: payload,
        })
    }
}

/// A decoded payload that still exposes its HTTP status and headers.
///
/// Dereferences to the payload so call sites read naturally, for example
/// `body.snapshot.id` rather than `body.body.snapshot.id`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResponseBody<T> {
    /// HTTP status returned by the service.
    pub status: u16,
    /// Response headers, in arrival order.
    pub headers: Vec<(String, String)>,
    /// Decoded payload.
    pub body: T,
}

impl<T> Deref for ResponseBody<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.body
    }
}

impl<T> ResponseBody<T> {
    /// Consumes the wrapper and returns the payload.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.body
    }
}
