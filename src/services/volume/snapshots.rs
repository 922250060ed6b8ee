//! Block storage snapshot operations.
//!
//! Snapshots capture a volume at a point in time. Creation and deletion are
//! asynchronous: the service acknowledges with 202 and finishes in the
//! background, so callers pair these operations with the waiter helpers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::rest::probe::ResourceClient;
use crate::rest::{RestClient, RestError, RestFuture, Response, ResponseBody, Transport};

/// A snapshot document as returned by the block storage API.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Snapshot {
    /// Unique identifier.
    pub id: String,
    /// Lifecycle status, for example `creating` or `available`.
    pub status: String,
    /// Display name, when one was set.
    #[serde(default)]
    pub name: Option<String>,
    /// Volume the snapshot was taken from.
    #[serde(default)]
    pub volume_id: Option<String>,
    /// Size in gibibytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Free-form metadata attached to the snapshot.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Payload wrapper for single snapshot responses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct SnapshotEnvelope {
    /// The snapshot document.
    pub snapshot: Snapshot,
}

/// Payload wrapper for snapshot listings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct SnapshotListEnvelope {
    /// The listed snapshots.
    pub snapshots: Vec<Snapshot>,
}

/// Payload wrapper for whole-resource metadata responses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct MetadataEnvelope {
    /// All metadata entries on the resource.
    pub metadata: BTreeMap<String, String>,
}

/// Payload wrapper for single metadata item responses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct MetadataItemEnvelope {
    /// The single requested entry, keyed by its name.
    pub meta: BTreeMap<String, String>,
}

/// Parameters accepted by [`SnapshotsClient::create_snapshot`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CreateSnapshotParams {
    /// Volume to snapshot.
    pub volume_id: String,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Human readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Snapshot the volume even while it is attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
    /// Metadata to attach at creation time.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Parameters accepted by [`SnapshotsClient::update_snapshot`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UpdateSnapshotParams {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Parameters accepted by [`SnapshotsClient::update_snapshot_status`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct UpdateSnapshotStatusParams {
    /// Status to report.
    pub status: String,
    /// Completion percentage, for example `80%`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
}

/// Query filters accepted by [`SnapshotsClient::list_snapshots`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SnapshotFilters {
    /// Return full documents rather than summaries.
    pub detail: bool,
    /// Only snapshots taken from this volume.
    pub volume_id: Option<String>,
    /// Only snapshots in this status.
    pub status: Option<String>,
    /// Only snapshots with this exact name.
    pub name: Option<String>,
    /// Page size limit.
    pub limit: Option<u32>,
    /// Pagination marker: the id of the last snapshot already seen.
    pub marker: Option<String>,
}

impl SnapshotFilters {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(volume_id) = &self.volume_id {
            pairs.push(("volume_id", volume_id.clone()));
        }
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
struct SnapshotBody<'a, B> {
    snapshot: &'a B,
}

#[derive(Serialize)]
struct MetadataBody<'a> {
    metadata: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct MetadataItemBody<'a> {
    meta: &'a BTreeMap<String, String>,
}

/// Client for the snapshot family of the block storage API.
#[derive(Clone, Debug)]
pub struct SnapshotsClient<T> {
    rest: RestClient<T>,
}

impl<T: Transport> SnapshotsClient<T> {
    /// Creates a snapshot client over an existing REST client.
    #[must_use]
    pub const fn new(rest: RestClient<T>) -> Self {
        Self { rest }
    }

    /// Creates a snapshot of a volume. Accepted with 202 and completed in
    /// the background.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is not acknowledged.
    pub async fn create_snapshot(
        &self,
        params: &CreateSnapshotParams,
    ) -> Result<ResponseBody<SnapshotEnvelope>, RestError> {
        let resp = self
            .rest
            .post("snapshots", &SnapshotBody { snapshot: params })
            .await?;
        resp.expected_success(&[202])?;
        resp.json()
    }

    /// Lists snapshots, optionally in detail and with server side filters.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or the listing does not
    /// decode.
    pub async fn list_snapshots(
        &self,
        filters: &SnapshotFilters,
    ) -> Result<ResponseBody<SnapshotListEnvelope>, RestError> {
        let path = if filters.detail {
            "snapshots/detail"
        } else {
            "snapshots"
        };
        let resp = self.rest.get(path, &filters.query_pairs()).await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Shows a single snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the snapshot does not exist.
    pub async fn show_snapshot(
        &self,
        snapshot_id: &str,
    ) -> Result<ResponseBody<SnapshotEnvelope>, RestError> {
        let resp = self
            .rest
            .get(&format!("snapshots/{snapshot_id}"), &[])
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Updates the name or description of a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn update_snapshot(
        &self,
        snapshot_id: &str,
        params: &UpdateSnapshotParams,
    ) -> Result<ResponseBody<SnapshotEnvelope>, RestError> {
        let resp = self
            .rest
            .put(
                &format!("snapshots/{snapshot_id}"),
                &SnapshotBody { snapshot: params },
            )
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Requests deletion of a snapshot. Accepted with 202; poll
    /// [`SnapshotsClient::is_resource_deleted`] to observe completion.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the snapshot is already gone.
    pub async fn delete_snapshot(&self, snapshot_id: &str) -> Result<Response, RestError> {
        let resp = self
            .rest
            .delete(&format!("snapshots/{snapshot_id}"))
            .await?;
        resp.expected_success(&[202])?;
        Ok(resp)
    }

    /// Replaces the creation-time metadata wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn create_snapshot_metadata(
        &self,
        snapshot_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<ResponseBody<MetadataEnvelope>, RestError> {
        let resp = self
            .rest
            .post(
                &format!("snapshots/{snapshot_id}/metadata"),
                &MetadataBody { metadata },
            )
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Shows all metadata on a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or the payload does not
    /// decode.
    pub async fn show_snapshot_metadata(
        &self,
        snapshot_id: &str,
    ) -> Result<ResponseBody<MetadataEnvelope>, RestError> {
        let resp = self
            .rest
            .get(&format!("snapshots/{snapshot_id}/metadata"), &[])
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Merges metadata entries into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn update_snapshot_metadata(
        &self,
        snapshot_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<ResponseBody<MetadataEnvelope>, RestError> {
        let resp = self
            .rest
            .put(
                &format!("snapshots/{snapshot_id}/metadata"),
                &MetadataBody { metadata },
            )
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Shows one metadata entry by key.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the key is not present.
    pub async fn show_snapshot_metadata_item(
        &self,
        snapshot_id: &str,
        key: &str,
    ) -> Result<ResponseBody<MetadataItemEnvelope>, RestError> {
        let resp = self
            .rest
            .get(&format!("snapshots/{snapshot_id}/metadata/{key}"), &[])
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Sets one metadata entry by key.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn update_snapshot_metadata_item(
        &self,
        snapshot_id: &str,
        key: &str,
        value: &str,
    ) -> Result<ResponseBody<MetadataItemEnvelope>, RestError> {
        let meta = BTreeMap::from([(key.to_owned(), value.to_owned())]);
        let resp = self
            .rest
            .put(
                &format!("snapshots/{snapshot_id}/metadata/{key}"),
                &MetadataItemBody { meta: &meta },
            )
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Removes one metadata entry by key.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the key is not present.
    pub async fn delete_snapshot_metadata_item(
        &self,
        snapshot_id: &str,
        key: &str,
    ) -> Result<Response, RestError> {
        let resp = self
            .rest
            .delete(&format!("snapshots/{snapshot_id}/metadata/{key}"))
            .await?;
        resp.expected_success(&[200])?;
        Ok(resp)
    }

    /// Resets the snapshot status directly, bypassing state transitions.
    /// Requires administrative credentials.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn reset_snapshot_status(
        &self,
        snapshot_id: &str,
        status: &str,
    ) -> Result<Response, RestError> {
        let resp = self
            .rest
            .post(
                &format!("snapshots/{snapshot_id}/action"),
                &json!({"os-reset_status": {"status": status}}),
            )
            .await?;
        resp.expected_success(&[202])?;
        Ok(resp)
    }

    /// Reports status and progress on behalf of the backing driver.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn update_snapshot_status(
        &self,
        snapshot_id: &str,
        params: &UpdateSnapshotStatusParams,
    ) -> Result<Response, RestError> {
        let resp = self
            .rest
            .post(
                &format!("snapshots/{snapshot_id}/action"),
                &json!({"os-update_snapshot_status": params}),
            )
            .await?;
        resp.expected_success(&[202])?;
        Ok(resp)
    }

    /// Deletes a snapshot regardless of its state. Requires administrative
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn force_delete_snapshot(&self, snapshot_id: &str) -> Result<Response, RestError> {
        let resp = self
            .rest
            .post(
                &format!("snapshots/{snapshot_id}/action"),
                &json!({"os-force_delete": {}}),
            )
            .await?;
        resp.expected_success(&[202])?;
        Ok(resp)
    }

    /// Removes the snapshot from management without deleting the backing
    /// storage.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn unmanage_snapshot(&self, snapshot_id: &str) -> Result<Response, RestError> {
        let resp = self
            .rest
            .post(
                &format!("snapshots/{snapshot_id}/action"),
                &json!({"os-unmanage": {}}),
            )
            .await?;
        resp.expected_success(&[202])?;
        Ok(resp)
    }
}

impl<T: Transport> ResourceClient for SnapshotsClient<T> {
    fn resource_type(&self) -> &'static str {
        "volume-snapshot"
    }

    fn is_resource_deleted<'a>(&'a self, resource_id: &'a str) -> RestFuture<'a, bool> {
        Box::pin(async move {
            let presence = self.rest.probe(&format!("snapshots/{resource_id}")).await?;
            Ok(presence.is_deleted())
        })
    }
}
