//! Block storage volume type and encryption type operations.
//!
//! A volume type names a class of storage; an encryption type attached to it
//! tells the compute service how to encrypt volumes of that class. Both are
//! administrative resources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rest::probe::ResourceClient;
use crate::rest::{RestClient, RestError, RestFuture, Response, ResponseBody, Transport};

/// A volume type document.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct VolumeType {
    /// Unique identifier.
    pub id: String,
    /// Unique display name.
    pub name: String,
    /// Human readable description, when one was set.
    #[serde(default)]
    pub description: Option<String>,
    /// Backend selection hints.
    #[serde(default)]
    pub extra_specs: BTreeMap<String, String>,
}

/// Payload wrapper for single volume type responses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct VolumeTypeEnvelope {
    /// The volume type document.
    pub volume_type: VolumeType,
}

/// Payload wrapper for volume type listings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct VolumeTypeListEnvelope {
    /// The listed volume types.
    pub volume_types: Vec<VolumeType>,
}

/// An encryption type document.
///
/// Shown bare by the API; only creation wraps it in an envelope.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct EncryptionType {
    /// Volume type the encryption settings belong to.
    #[serde(default)]
    pub volume_type_id: Option<String>,
    /// Encryption provider class understood by the compute service.
    #[serde(default)]
    pub provider: Option<String>,
    /// Key size in bits.
    #[serde(default)]
    pub key_size: Option<u32>,
    /// Cipher specification, for example `aes-xts-plain64`.
    #[serde(default)]
    pub cipher: Option<String>,
    /// Where encryption happens, `front-end` or `back-end`.
    #[serde(default)]
    pub control_location: Option<String>,
}

/// Payload wrapper for encryption type creation responses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct EncryptionTypeEnvelope {
    /// The created encryption type.
    pub encryption: EncryptionType,
}

/// Parameters accepted by [`VolumeTypesClient::create_volume_type`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CreateVolumeTypeParams {
    /// Unique display name.
    pub name: String,
    /// Human readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Backend selection hints.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_specs: BTreeMap<String, String>,
}

/// Parameters accepted by [`VolumeTypesClient::create_encryption_type`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CreateEncryptionTypeParams {
    /// Encryption provider class understood by the compute service.
    pub provider: String,
    /// Key size in bits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_size: Option<u32>,
    /// Cipher specification, for example `aes-xts-plain64`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    /// Where encryption happens, `front-end` or `back-end`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_location: Option<String>,
}

#[derive(Serialize)]
struct VolumeTypeBody<'a, B> {
    volume_type: &'a B,
}

#[derive(Serialize)]
struct EncryptionBody<'a, B> {
    encryption: &'a B,
}

/// Client for volume types and their encryption settings.
#[derive(Clone, Debug)]
pub struct VolumeTypesClient<T> {
    rest: RestClient<T>,
}

impl<T: Transport> VolumeTypesClient<T> {
    /// Creates a volume type client over an existing REST client.
    #[must_use]
    pub const fn new(rest: RestClient<T>) -> Self {
        Self { rest }
    }

    /// Creates a volume type. Unlike volumes this completes synchronously
    /// and answers 200.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn create_volume_type(
        &self,
        params: &CreateVolumeTypeParams,
    ) -> Result<ResponseBody<VolumeTypeEnvelope>, RestError> {
        let resp = self
            .rest
            .post("types", &VolumeTypeBody { volume_type: params })
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Lists all volume types visible to the project.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or the listing does not
    /// decode.
    pub async fn list_volume_types(
        &self,
    ) -> Result<ResponseBody<VolumeTypeListEnvelope>, RestError> {
        let resp = self.rest.get("types", &[]).await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Shows a single volume type.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the volume type does not exist.
    pub async fn show_volume_type(
        &self,
        volume_type_id: &str,
    ) -> Result<ResponseBody<VolumeTypeEnvelope>, RestError> {
        let resp = self
            .rest
            .get(&format!("types/{volume_type_id}"), &[])
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Requests deletion of a volume type. Accepted with 202.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the volume type is already gone.
    pub async fn delete_volume_type(&self, volume_type_id: &str) -> Result<Response, RestError> {
        let resp = self
            .rest
            .delete(&format!("types/{volume_type_id}"))
            .await?;
        resp.expected_success(&[202])?;
        Ok(resp)
    }

    /// Attaches encryption settings to a volume type.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn create_encryption_type(
        &self,
        volume_type_id: &str,
        params: &CreateEncryptionTypeParams,
    ) -> Result<ResponseBody<EncryptionTypeEnvelope>, RestError> {
        let resp = self
            .rest
            .post(
                &format!("types/{volume_type_id}/encryption"),
                &EncryptionBody { encryption: params },
            )
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Shows the encryption settings of a volume type. The document comes
    /// back bare, without an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or the payload does not
    /// decode.
    pub async fn show_encryption_type(
        &self,
        volume_type_id: &str,
    ) -> Result<ResponseBody<EncryptionType>, RestError> {
        let resp = self
            .rest
            .get(&format!("types/{volume_type_id}/encryption"), &[])
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Removes the encryption settings from a volume type. The API addresses
    /// the settings through the fixed `provider` segment.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when no encryption type is attached.
    pub async fn delete_encryption_type(&self, volume_type_id: &str) -> Result<Response, RestError> {
        let resp = self
            .rest
            .delete(&format!("types/{volume_type_id}/encryption/provider"))
            .await?;
        resp.expected_success(&[202])?;
        Ok(resp)
    }
}

impl<T: Transport> ResourceClient for VolumeTypesClient<T> {
    fn resource_type(&self) -> &'static str {
        "volume-type"
    }

    fn is_resource_deleted<'a>(&'a self, resource_id: &'a str) -> RestFuture<'a, bool> {
        Box::pin(async move {
            let presence = self.rest.probe(&format!("types/{resource_id}")).await?;
            Ok(presence.is_deleted())
        })
    }
}
