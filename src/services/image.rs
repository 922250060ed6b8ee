//! Image registry bindings.
//!
//! The image API differs from the others in two ways: documents come back
//! bare rather than wrapped in an envelope, and the payload of an upload is
//! an octet stream rather than JSON.

use serde::{Deserialize, Serialize};

use crate::rest::probe::ResourceClient;
use crate::rest::{RestClient, RestError, RestFuture, Response, ResponseBody, Transport};

const OCTET_STREAM: &str = "application/octet-stream";

/// An image document.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Image {
    /// Unique identifier.
    pub id: String,
    /// Lifecycle status, `queued` until data is uploaded, then `active`.
    pub status: String,
    /// Display name, when one was set.
    #[serde(default)]
    pub name: Option<String>,
    /// Visibility, for example `private` or `public`.
    #[serde(default)]
    pub visibility: Option<String>,
    /// Container format, for example `bare`.
    #[serde(default)]
    pub container_format: Option<String>,
    /// Disk format, for example `raw` or `qcow2`.
    #[serde(default)]
    pub disk_format: Option<String>,
}

/// Parameters accepted by [`ImagesClient::create_image`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CreateImageParams {
    /// Display name of the image.
    pub name: String,
    /// Container format, for example `bare`.
    pub container_format: String,
    /// Disk format, for example `raw` or `qcow2`.
    pub disk_format: String,
    /// Visibility; the service defaults to `private` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
}

/// Client for the image registry API.
#[derive(Clone, Debug)]
pub struct ImagesClient<T> {
    rest: RestClient<T>,
}

impl<T: Transport> ImagesClient<T> {
    /// Creates an image client over an existing REST client.
    #[must_use]
    pub const fn new(rest: RestClient<T>) -> Self {
        Self { rest }
    }

    /// Registers a new image record. Answers 201 with the bare document;
    /// the image stays `queued` until data is uploaded.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn create_image(
        &self,
        params: &CreateImageParams,
    ) -> Result<ResponseBody<Image>, RestError> {
        let resp = self.rest.post("images", params).await?;
        resp.expected_success(&[201])?;
        resp.json()
    }

    /// Shows a single image.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the image does not exist.
    pub async fn show_image(&self, image_id: &str) -> Result<ResponseBody<Image>, RestError> {
        let resp = self.rest.get(&format!("images/{image_id}"), &[]).await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Uploads the image data as an octet stream. Answers 204 with no body.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the upload fails or is rejected.
    pub async fn store_image_file(
        &self,
        image_id: &str,
        data: Vec<u8>,
    ) -> Result<Response, RestError> {
        let resp = self
            .rest
            .put_octets(&format!("images/{image_id}/file"), OCTET_STREAM, data)
            .await?;
        resp.expected_success(&[204])?;
        Ok(resp)
    }

    /// Deletes an image. Answers 204 with no body.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the image is already gone.
    pub async fn delete_image(&self, image_id: &str) -> Result<Response, RestError> {
        let resp = self.rest.delete(&format!("images/{image_id}")).await?;
        resp.expected_success(&[204])?;
        Ok(resp)
    }
}

impl<T: Transport> ResourceClient for ImagesClient<T> {
    fn resource_type(&self) -> &'static str {
        "image"
    }

    fn is_resource_deleted<'a>(&'a self, resource_id: &'a str) -> RestFuture<'a, bool> {
        Box::pin(async move {
            let presence = self.rest.probe(&format!("images/{resource_id}")).await?;
            Ok(presence.is_deleted())
        })
    }
}
