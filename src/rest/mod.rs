//! Typed REST client shared by every service binding.
//!
//! A [`RestClient`] is bound to one [`ServiceEndpoint`] and one
//! pre-issued authentication token. It composes URLs, attaches the token,
//! serialises JSON bodies and hands the finished request to a [`Transport`].
//! Status policy lives in [`Response::expected_success`]: callers state the
//! statuses they accept and everything else becomes a typed error.
//!
//! The client holds no mutable state. Per-request variation, including
//! whether the endpoint's path prefix applies, travels as parameters, so one
//! client can serve concurrent callers.

mod error;
pub mod probe;
mod response;
mod transport;


use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use url::form_urlencoded;

pub use error::RestError;
pub use response::{Response, ResponseBody};
pub use transport::{
    DEFAULT_HTTP_TIMEOUT, HttpTransport, Method, Transport, TransportError, TransportFuture,
    WireRequest, WireResponse,
};

/// Future returned by boxed REST operations.
pub type RestFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RestError>> + Send + 'a>>;

const HEADER_AUTH_TOKEN: &str = "X-Auth-Token";
const CONTENT_TYPE_JSON: &str = "application/json";

/// Where a service API is rooted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceEndpoint {
    base_url: String,
    path_prefix: String,
}

impl ServiceEndpoint {
    /// Creates an endpoint from a base URL and a service path prefix.
    ///
    /// The prefix usually carries the API version and tenant scoping, for
    /// example `v3/{project_id}` for block storage or `v1/AUTH_{project_id}`
    /// for object storage. An empty prefix roots requests at the base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, path_prefix: impl Into<String>) -> Self {
        let base = base_url.into();
        let prefix = path_prefix.into();
        Self {
            base_url: base.trim_end_matches('/').to_owned(),
            path_prefix: prefix.trim_matches('/').to_owned(),
        }
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Path prefix without surrounding slashes; empty when unset.
    #[must_use]
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }
}

/// Whether a request URL includes the endpoint's path prefix.
///
/// Almost every operation addresses resources under the service prefix.
/// Discovery documents are the exception: object storage publishes its
/// capability listing at the root of the endpoint, outside any account
/// scoping. The scope is chosen per request rather than by mutating the
/// client, so concurrent callers never observe each other's choice.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum UrlPrefix {
    /// Address the path under the endpoint's prefix.
    #[default]
    Service,
    /// Address the path directly under the base URL.
    Root,
}

/// Typed REST client bound to one service endpoint and auth token.
#[derive(Clone, Debug)]
pub struct RestClient<T> {
    endpoint: ServiceEndpoint,
    auth_token: String,
    transport: T,
}

impl<T: Transport> RestClient<T> {
    /// Creates a client for `endpoint` that authenticates with `auth_token`.
    #[must_use]
    pub fn new(endpoint: ServiceEndpoint, auth_token: impl Into<String>, transport: T) -> Self {
        Self {
            endpoint,
            auth_token: auth_token.into(),
            transport,
        }
    }

    /// Endpoint this client addresses.
    #[must_use]
    pub const fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    fn build_url(&self, prefix: UrlPrefix, path: &str, query: &[(&str, String)]) -> String {
        let relative = path.trim_start_matches('/');
        let mut url = match prefix {
            UrlPrefix::Service if !self.endpoint.path_prefix.is_empty() => format!(
                "{}/{}/{relative}",
                self.endpoint.base_url, self.endpoint.path_prefix
            ),
            UrlPrefix::Service | UrlPrefix::Root => {
                format!("{}/{relative}", self.endpoint.base_url)
            }
        };
        if !query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())))
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
        url
    }

    fn request_headers(&self, content_type: Option<&str>) -> Vec<(String, String)> {
        let mut headers = vec![
            (HEADER_AUTH_TOKEN.to_owned(), self.auth_token.clone()),
            (String::from("Accept"), CONTENT_TYPE_JSON.to_owned()),
        ];
        if let Some(value) = content_type {
            headers.push((String::from("Content-Type"), value.to_owned()));
        }
        headers
    }

    fn encode_body<B>(path: &str, body: &B) -> Result<Vec<u8>, RestError>
    where
        B: Serialize + ?Sized,
    {
        serde_json::to_vec(body).map_err(|error| RestError::Payload {
            path: path.to_owned(),
            message: format!("could not encode request body: {error}"),
        })
    }

    async fn send(
        &self,
        method: Method,
        prefix: UrlPrefix,
        path: &str,
        query: &[(&str, String)],
        content_type: Option<&str>,
        body: Option<Vec<u8>>,
    ) -> Result<Response, RestError> {
        let request = WireRequest {
            method,
            url: self.build_url(prefix, path, query),
            headers: self.request_headers(content_type),
            body,
        };
        let wire = self.transport.execute(request).await?;
        Ok(Response::from_wire(method, path.to_owned(), wire))
    }

    /// Issues a GET under the service prefix.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Transport`] when the request never completed.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response, RestError> {
        self.get_scoped(UrlPrefix::Service, path, query).await
    }

    /// Issues a GET with an explicit prefix scope.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Transport`] when the request never completed.
    pub async fn get_scoped(
        &self,
        prefix: UrlPrefix,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Response, RestError> {
        self.send(Method::Get, prefix, path, query, None, None).await
    }

    /// Issues a POST with a JSON body under the service prefix.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Payload`] when the body cannot be serialised and
    /// [`RestError::Transport`] when the request never completed.
    pub async fn post<B>(&self, path: &str, body: &B) -> Result<Response, RestError>
    where
        B: Serialize + ?Sized,
    {
        let bytes = Self::encode_body(path, body)?;
        self.send(
            Method::Post,
            UrlPrefix::Service,
            path,
            &[],
            Some(CONTENT_TYPE_JSON),
            Some(bytes),
        )
        .await
    }

    /// Issues a PUT with a JSON body under the service prefix.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Payload`] when the body cannot be serialised and
    /// [`RestError::Transport`] when the request never completed.
    pub async fn put<B>(&self, path: &str, body: &B) -> Result<Response, RestError>
    where
        B: Serialize + ?Sized,
    {
        let bytes = Self::encode_body(path, body)?;
        self.send(
            Method::Put,
            UrlPrefix::Service,
            path,
            &[],
            Some(CONTENT_TYPE_JSON),
            Some(bytes),
        )
        .await
    }

    /// Issues a PUT with a raw body and caller supplied content type.
    ///
    /// Image uploads push octet streams rather than JSON documents.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Transport`] when the request never completed.
    pub async fn put_octets(
        &self,
        path: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<Response, RestError> {
        self.send(
            Method::Put,
            UrlPrefix::Service,
            path,
            &[],
            Some(content_type),
            Some(data),
        )
        .await
    }

    /// Issues a DELETE under the service prefix.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Transport`] when the request never completed.
    pub async fn delete(&self, path: &str) -> Result<Response, RestError> {
        self.send(Method::Delete, UrlPrefix::Service, path, &[], None, None)
            .await
    }

    /// Issues a DELETE carrying a JSON body.
    ///
    /// A few bulk endpoints take a document describing what to remove.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Payload`] when the body cannot be serialised and
    /// [`RestError::Transport`] when the request never completed.
    pub async fn delete_with_body<B>(&self, path: &str, body: &B) -> Result<Response, RestError>
    where
        B: Serialize + ?Sized,
    {
        let bytes = Self::encode_body(path, body)?;
        self.send(
            Method::Delete,
            UrlPrefix::Service,
            path,
            &[],
            Some(CONTENT_TYPE_JSON),
            Some(bytes),
        )
        .await
    }
}
