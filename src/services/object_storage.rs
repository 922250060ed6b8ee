//! Object storage discovery bindings.

use std::collections::BTreeMap;

use crate::rest::{RestClient, RestError, ResponseBody, Transport, UrlPrefix};

/// Capability discovery document: feature name to its settings.
pub type CapabilityMap = BTreeMap<String, serde_json::Value>;

/// Client for object storage discovery.
///
/// The capability listing is the one operation in the suite that lives
/// outside the account scoped prefix, so it requests [`UrlPrefix::Root`]
/// explicitly.
#[derive(Clone, Debug)]
pub struct CapabilitiesClient<T> {
    rest: RestClient<T>,
}

impl<T: Transport> CapabilitiesClient<T> {
    /// Creates a capabilities client over an existing REST client.
    #[must_use]
    pub const fn new(rest: RestClient<T>) -> Self {
        Self { rest }
    }

    /// Fetches the capability listing published at `<api_prefix>info` under
    /// the endpoint root. Pass an empty prefix for the conventional `/info`.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or the document does not
    /// decode.
    pub async fn list_capabilities(
        &self,
        api_prefix: &str,
    ) -> Result<ResponseBody<CapabilityMap>, RestError> {
        let path = format!("{api_prefix}info");
        let resp = self.rest.get_scoped(UrlPrefix::Root, &path, &[]).await?;
        resp.expected_success(&[200])?;
        resp.json()
    }
}
