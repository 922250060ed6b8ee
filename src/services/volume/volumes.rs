//! Block storage volume operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::VolumeApiVersion;
use crate::rest::probe::ResourceClient;
use crate::rest::{RestClient, RestError, RestFuture, Response, ResponseBody, Transport};

/// A volume document as returned by the block storage API.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Volume {
    /// Unique identifier.
    pub id: String,
    /// Lifecycle status, for example `available` or `in-use`.
    pub status: String,
    /// Display name, when one was set.
    #[serde(default)]
    pub name: Option<String>,
    /// Size in gibibytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Volume type the volume was created from.
    #[serde(default)]
    pub volume_type: Option<String>,
    /// Whether the volume is encrypted at rest.
    #[serde(default)]
    pub encrypted: Option<bool>,
    /// Attachments currently binding the volume to servers.
    #[serde(default)]
    pub attachments: Vec<VolumeAttachmentInfo>,
    /// Free-form metadata attached to the volume.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// One attachment entry inside a volume document.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct VolumeAttachmentInfo {
    /// Server the volume is attached to.
    #[serde(default)]
    pub server_id: Option<String>,
    /// Identifier of the attachment itself.
    #[serde(default)]
    pub attachment_id: Option<String>,
    /// Device node presented to the server, for example `/dev/vdb`.
    #[serde(default)]
    pub device: Option<String>,
}

/// Payload wrapper for single volume responses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct VolumeEnvelope {
    /// The volume document.
    pub volume: Volume,
}

/// Payload wrapper for volume listings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct VolumeListEnvelope {
    /// The listed volumes.
    pub volumes: Vec<Volume>,
}

/// Project wide usage totals returned by the summary operation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct VolumeSummary {
    /// Total size of all volumes, in gibibytes.
    pub total_size: u64,
    /// Number of volumes in the project.
    pub total_count: u64,
}

/// Payload wrapper for the volume summary response.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct VolumeSummaryEnvelope {
    /// Usage totals for the project.
    #[serde(rename = "volume-summary")]
    pub volume_summary: VolumeSummary,
}

/// Parameters accepted by [`VolumesClient::create_volume`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CreateVolumeParams {
    /// Size in gibibytes.
    pub size: u32,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Human readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Volume type to create from; governs encryption and placement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    /// Snapshot to restore into the new volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    /// Image to write onto the new volume, making it bootable.
    #[serde(rename = "imageRef", skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Availability zone to place the volume in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    /// Metadata to attach at creation time.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Parameters accepted by [`VolumesClient::update_volume`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UpdateVolumeParams {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Query filters accepted by [`VolumesClient::list_volumes`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeFilters {
    /// Return full documents rather than summaries.
    pub detail: bool,
    /// Only volumes in this status.
    pub status: Option<String>,
    /// Only volumes with this exact name.
    pub name: Option<String>,
    /// Page size limit.
    pub limit: Option<u32>,
    /// Pagination marker: the id of the last volume already seen.
    pub marker: Option<String>,
}

impl VolumeFilters {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = &self.status {
            pairs.push(("status", status.clone()));
        }
        if let Some(name) = &self.name {
            pairs.push(("name", name.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(marker) = &self.marker {
            pairs.push(("marker", marker.clone()));
        }
        pairs
    }
}

#[derive(Serialize)]
struct VolumeBody<'a, B> {
    volume: &'a B,
}

/// Client for the volume family of the block storage API.
///
/// Carries the selected API version; operations present in only one version
/// check it and refuse cleanly elsewhere.
#[derive(Clone, Debug)]
pub struct VolumesClient<T> {
    rest: RestClient<T>,
    version: VolumeApiVersion,
}

impl<T: Transport> VolumesClient<T> {
    /// Creates a volume client over an existing REST client.
    #[must_use]
    pub const fn new(rest: RestClient<T>, version: VolumeApiVersion) -> Self {
        Self { rest, version }
    }

    /// API version this client speaks.
    #[must_use]
    pub const fn version(&self) -> VolumeApiVersion {
        self.version
    }

    /// Creates a volume. Accepted with 202 and built in the background.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is not acknowledged.
    pub async fn create_volume(
        &self,
        params: &CreateVolumeParams,
    ) -> Result<ResponseBody<VolumeEnvelope>, RestError> {
        let resp = self
            .rest
            .post("volumes", &VolumeBody { volume: params })
            .await?;
        resp.expected_success(&[202])?;
        resp.json()
    }

    /// Lists volumes, optionally in detail and with server side filters.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or the listing does not
    /// decode.
    pub async fn list_volumes(
        &self,
        filters: &VolumeFilters,
    ) -> Result<ResponseBody<VolumeListEnvelope>, RestError> {
        let path = if filters.detail {
            "volumes/detail"
        } else {
            "volumes"
        };
        let resp = self.rest.get(path, &filters.query_pairs()).await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Shows a single volume.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the volume does not exist.
    pub async fn show_volume(
        &self,
        volume_id: &str,
    ) -> Result<ResponseBody<VolumeEnvelope>, RestError> {
        let resp = self.rest.get(&format!("volumes/{volume_id}"), &[]).await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Updates the name or description of a volume.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn update_volume(
        &self,
        volume_id: &str,
        params: &UpdateVolumeParams,
    ) -> Result<ResponseBody<VolumeEnvelope>, RestError> {
        let resp = self
            .rest
            .put(
                &format!("volumes/{volume_id}"),
                &VolumeBody { volume: params },
            )
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Requests deletion of a volume. Accepted with 202; poll
    /// [`VolumesClient::is_resource_deleted`] to observe completion.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the volume is already gone.
    pub async fn delete_volume(&self, volume_id: &str) -> Result<Response, RestError> {
        let resp = self.rest.delete(&format!("volumes/{volume_id}")).await?;
        resp.expected_success(&[202])?;
        Ok(resp)
    }

    /// Resets the volume status directly, bypassing state transitions.
    /// Requires administrative credentials.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn reset_volume_status(
        &self,
        volume_id: &str,
        status: &str,
    ) -> Result<Response, RestError> {
        let resp = self
            .rest
            .post(
                &format!("volumes/{volume_id}/action"),
                &json!({"os-reset_status": {"status": status}}),
            )
            .await?;
        resp.expected_success(&[202])?;
        Ok(resp)
    }

    /// Deletes a volume regardless of its state. Requires administrative
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn force_delete_volume(&self, volume_id: &str) -> Result<Response, RestError> {
        let resp = self
            .rest
            .post(
                &format!("volumes/{volume_id}/action"),
                &json!({"os-force_delete": {}}),
            )
            .await?;
        resp.expected_success(&[202])?;
        Ok(resp)
    }

    /// Shows project wide usage totals. Available from API v3 onwards.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::UnsupportedApiVersion`] when the client speaks
    /// v2, without issuing a request.
    pub async fn show_volume_summary(
        &self,
    ) -> Result<ResponseBody<VolumeSummaryEnvelope>, RestError> {
        if self.version < VolumeApiVersion::V3 {
            return Err(RestError::UnsupportedApiVersion {
                operation: String::from("show_volume_summary"),
                required: String::from("3"),
                selected: self.version.as_str().to_owned(),
            });
        }
        let resp = self.rest.get("volumes/summary", &[]).await?;
        resp.expected_success(&[200])?;
        resp.json()
    }
}

impl<T: Transport> ResourceClient for VolumesClient<T> {
    fn resource_type(&self) -> &'static str {
        "volume"
    }

    fn is_resource_deleted<'a>(&'a self, resource_id: &'a str) -> RestFuture<'a, bool> {
        Box::pin(async move {
            let presence = self.rest.probe(&format!("volumes/{resource_id}")).await?;
            Ok(presence.is_deleted())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::ServiceEndpoint;
    use crate::test_support::{StubTransport, json_volume, json_volume_summary};
    use rstest::rstest;

    fn client_with_version(
        stub: &StubTransport,
        version: VolumeApiVersion,
    ) -> VolumesClient<StubTransport> {
        VolumesClient::new(
            RestClient::new(
                ServiceEndpoint::new("https://volume.example.test", "v3/proj-1"),
                "token-1",
                stub.clone(),
            ),
            version,
        )
    }

    #[rstest]
    fn create_params_serialise_encryption_relevant_fields() {
        let params = CreateVolumeParams {
            size: 1,
            name: Some(String::from("enc-vol")),
            volume_type: Some(String::from("luks")),
            ..CreateVolumeParams::default()
        };
        let body =
            serde_json::to_string(&VolumeBody { volume: &params }).expect("params serialise");
        assert_eq!(
            body,
            "{\"volume\":{\"size\":1,\"name\":\"enc-vol\",\"volume_type\":\"luks\"}}"
        );
    }

    #[rstest]
    fn image_ref_serialises_in_camel_case() {
        let params = CreateVolumeParams {
            size: 1,
            image_ref: Some(String::from("img-1")),
            ..CreateVolumeParams::default()
        };
        let body = serde_json::to_value(&params).expect("params serialise");
        assert!(body.get("imageRef").is_some());
        assert!(body.get("image_ref").is_none());
    }

    #[tokio::test]
    async fn create_volume_accepts_202() {
        let stub = StubTransport::new();
        stub.push_response(202, json_volume("vol-1", "creating"));
        let params = CreateVolumeParams {
            size: 1,
            ..CreateVolumeParams::default()
        };

        let body = client_with_version(&stub, VolumeApiVersion::V3)
            .create_volume(&params)
            .await
            .expect("create succeeds");
        assert_eq!(body.volume.id, "vol-1");
        assert_eq!(body.volume.status, "creating");
    }

    #[tokio::test]
    async fn summary_is_refused_on_v2_without_a_request() {
        let stub = StubTransport::new();
        let volumes = client_with_version(&stub, VolumeApiVersion::V2);

        let err = volumes
            .show_volume_summary()
            .await
            .expect_err("v2 does not offer a summary");
        assert!(matches!(err, RestError::UnsupportedApiVersion { .. }));
        assert!(stub.requests().is_empty(), "no request should be issued");
    }

    #[tokio::test]
    async fn summary_decodes_hyphenated_envelope_on_v3() {
        let stub = StubTransport::new();
        stub.push_response(200, json_volume_summary(10, 2));
        let volumes = client_with_version(&stub, VolumeApiVersion::V3);

        let body = volumes
            .show_volume_summary()
            .await
            .expect("summary succeeds");
        assert_eq!(body.volume_summary.total_size, 10);
        assert_eq!(body.volume_summary.total_count, 2);

        let requests = stub.requests();
        let url = requests.first().map(|request| request.url.clone());
        assert_eq!(
            url.as_deref(),
            Some("https://volume.example.test/v3/proj-1/volumes/summary")
        );
    }

    #[tokio::test]
    async fn reset_status_posts_action_document() {
        let stub = StubTransport::new();
        stub.push_status(202);
        let volumes = client_with_version(&stub, VolumeApiVersion::V3);

        volumes
            .reset_volume_status("vol-1", "available")
            .await
            .expect("reset accepted");

        let requests = stub.requests();
        let request = requests.first().expect("one request");
        assert!(request.url.ends_with("volumes/vol-1/action"));
        assert_eq!(
            request.body_text().as_deref(),
            Some("{\"os-reset_status\":{\"status\":\"available\"}}")
        );
    }

    #[tokio::test]
    async fn volume_probe_reports_deletion() {
        let stub = StubTransport::new();
        stub.push_status(404);
        let volumes = client_with_version(&stub, VolumeApiVersion::V3);

        let deleted = volumes
            .is_resource_deleted("vol-1")
            .await
            .expect("probe succeeds");
        assert!(deleted);
        assert_eq!(volumes.resource_type(), "volume");
    }
}
