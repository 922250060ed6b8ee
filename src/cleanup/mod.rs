//! Test-resource sweeper.
//!
//! The sweeper is designed for test harnesses that provision real cloud
//! resources. It identifies volumes, snapshots, servers and volume types
//! belonging to a specific test run via a metadata tag (`zond-test-run-<id>`)
//! and deletes them, failing if anything remains afterwards.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::config::{CloudConfig, ConfigError};
use crate::rest::{HttpTransport, RestError, Transport};
use crate::services::ServiceClients;
use crate::services::compute::{ServerFilters, ServersClient};
use crate::services::volume::{
    SnapshotFilters, SnapshotsClient, VolumeFilters, VolumeTypesClient, VolumesClient,
};
use crate::waiter::{WaitError, WaitPolicy, wait_for_resource_deletion};

/// Environment variable used by test harnesses to identify a test run.
pub const TEST_RUN_ID_ENV: &str = "ZOND_TEST_RUN_ID";

/// Prefix used for test run tags applied to cloud resources.
pub const TEST_RUN_TAG_PREFIX: &str = "zond-test-run-";

/// Metadata key carrying the test run tag on volumes, snapshots and servers.
pub const TEST_RUN_METADATA_KEY: &str = "zond-test-run";

/// Name prefix shared by every resource the test tooling creates.
pub const RESOURCE_NAME_PREFIX: &str = "zond-";

/// Configuration for a cleanup sweep.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CleanupConfig {
    /// Test run identifier used to build the tag.
    pub test_run_id: String,
}

impl CleanupConfig {
    /// Constructs a config, trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::InvalidConfig`] when the run id is blank.
    pub fn new(test_run_id: impl Into<String>) -> Result<Self, CleanupError> {
        let trimmed_test_run_id = test_run_id.into().trim().to_owned();
        if trimmed_test_run_id.is_empty() {
            return Err(CleanupError::InvalidConfig {
                field: String::from("test_run_id"),
            });
        }
        Ok(Self {
            test_run_id: trimmed_test_run_id,
        })
    }

    /// Returns the full tag used for this test run.
    #[must_use]
    pub fn test_run_tag(&self) -> String {
        format!("{TEST_RUN_TAG_PREFIX}{}", self.test_run_id)
    }
}

/// Summary of sweeper work.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SweepSummary {
    /// Number of servers deleted during the sweep.
    pub deleted_servers: usize,
    /// Number of volumes deleted during the sweep.
    pub deleted_volumes: usize,
    /// Number of snapshots deleted during the sweep.
    pub deleted_snapshots: usize,
    /// Number of volume types deleted during the sweep.
    pub deleted_volume_types: usize,
}

/// Errors returned by the sweeper.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CleanupError {
    /// Raised when configuration is missing required values.
    #[error("missing {field}")]
    InvalidConfig {
        /// Name of the missing or invalid field.
        field: String,
    },
    /// Raised when resources remain after the sweep.
    #[error("resources remain after cleanup sweep: {message}")]
    NotClean {
        /// The resources that are still visible.
        message: String,
    },
    /// Raised when a listing or deletion request fails.
    #[error(transparent)]
    Rest(#[from] RestError),
    /// Raised when a deleted resource does not disappear in time.
    #[error(transparent)]
    Wait(#[from] WaitError),
}

/// Deletes test-run-tagged resources through the service clients.
///
/// The sweep is ordered so dependencies release first: snapshots before the
/// volumes they were taken from, servers before the volumes attached to
/// them, volume types last.
#[derive(Debug)]
pub struct Sweeper<T: Transport + Clone> {
    snapshots: SnapshotsClient<T>,
    volumes: VolumesClient<T>,
    servers: ServersClient<T>,
    volume_types: VolumeTypesClient<T>,
    config: CleanupConfig,
    wait_policy: WaitPolicy,
}

impl Sweeper<HttpTransport> {
    /// Creates a sweeper wired to the real HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the cloud configuration is incomplete.
    pub fn from_config(config: &CloudConfig, cleanup: CleanupConfig) -> Result<Self, ConfigError> {
        let clients = ServiceClients::from_config(config)?;
        Ok(Self::new(&clients, cleanup))
    }
}

impl<T: Transport + Clone> Sweeper<T> {
    /// Creates a sweeper over existing service clients.
    #[must_use]
    pub fn new(clients: &ServiceClients<T>, config: CleanupConfig) -> Self {
        Self {
            snapshots: clients.snapshots.clone(),
            volumes: clients.volumes.clone(),
            servers: clients.servers.clone(),
            volume_types: clients.volume_types.clone(),
            config,
            wait_policy: WaitPolicy::default(),
        }
    }

    /// Overrides the wait policy used for deletion waits.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    /// Performs a sweep and returns how many resources were deleted.
    ///
    /// Deletion of asynchronous resources waits for the resource to
    /// disappear before moving on. The sweep fails if any tagged resources
    /// remain at the end.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError`] when a request fails, a deletion does not
    /// complete, or resources remain after deletion attempts.
    pub async fn sweep(&self) -> Result<SweepSummary, CleanupError> {
        let tag = self.config.test_run_tag();

        let deleted_snapshots = self.sweep_snapshots(&tag).await?;
        let deleted_servers = self.sweep_servers(&tag).await?;
        let deleted_volumes = self.sweep_volumes(&tag).await?;
        let deleted_volume_types = self.sweep_volume_types().await?;

        self.verify_clean(&tag).await?;

        Ok(SweepSummary {
            deleted_servers,
            deleted_volumes,
            deleted_snapshots,
            deleted_volume_types,
        })
    }

    async fn sweep_snapshots(&self, tag: &str) -> Result<usize, CleanupError> {
        let listing = self.snapshots.list_snapshots(&detail_snapshots()).await?;
        let mut deleted = 0;
        for snapshot in &listing.snapshots {
            if !matches_run(snapshot.name.as_deref(), &snapshot.metadata, tag) {
                continue;
            }
            self.snapshots.delete_snapshot(&snapshot.id).await?;
            wait_for_resource_deletion(&self.snapshots, &snapshot.id, &self.wait_policy).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn sweep_servers(&self, tag: &str) -> Result<usize, CleanupError> {
        let listing = self.servers.list_servers(&detail_servers()).await?;
        let mut deleted = 0;
        for server in &listing.servers {
            if !matches_run(server.name.as_deref(), &server.metadata, tag) {
                continue;
            }
            self.servers.delete_server(&server.id).await?;
            wait_for_resource_deletion(&self.servers, &server.id, &self.wait_policy).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn sweep_volumes(&self, tag: &str) -> Result<usize, CleanupError> {
        let listing = self.volumes.list_volumes(&detail_volumes()).await?;
        let mut deleted = 0;
        for volume in &listing.volumes {
            if !matches_run(volume.name.as_deref(), &volume.metadata, tag) {
                continue;
            }
            self.volumes.delete_volume(&volume.id).await?;
            wait_for_resource_deletion(&self.volumes, &volume.id, &self.wait_policy).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Volume types carry no metadata, so the name prefix alone decides.
    async fn sweep_volume_types(&self) -> Result<usize, CleanupError> {
        let listing = self.volume_types.list_volume_types().await?;
        let mut deleted = 0;
        for volume_type in &listing.volume_types {
            if !volume_type.name.starts_with(RESOURCE_NAME_PREFIX) {
                continue;
            }
            self.volume_types.delete_volume_type(&volume_type.id).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn verify_clean(&self, tag: &str) -> Result<(), CleanupError> {
        let mut remaining = Vec::new();

        let snapshots = self.snapshots.list_snapshots(&detail_snapshots()).await?;
        for snapshot in &snapshots.snapshots {
            if matches_run(snapshot.name.as_deref(), &snapshot.metadata, tag) {
                remaining.push(format!("snapshot {}", snapshot.id));
            }
        }
        let servers = self.servers.list_servers(&detail_servers()).await?;
        for server in &servers.servers {
            if matches_run(server.name.as_deref(), &server.metadata, tag) {
                remaining.push(format!("server {}", server.id));
            }
        }
        let volumes = self.volumes.list_volumes(&detail_volumes()).await?;
        for volume in &volumes.volumes {
            if matches_run(volume.name.as_deref(), &volume.metadata, tag) {
                remaining.push(format!("volume {}", volume.id));
            }
        }
        let volume_types = self.volume_types.list_volume_types().await?;
        for volume_type in &volume_types.volume_types {
            if volume_type.name.starts_with(RESOURCE_NAME_PREFIX) {
                remaining.push(format!("volume type {}", volume_type.id));
            }
        }

        if remaining.is_empty() {
            Ok(())
        } else {
            Err(CleanupError::NotClean {
                message: remaining.join(", "),
            })
        }
    }
}

/// True when the resource belongs to the given test run: named with the
/// tooling prefix and tagged with the run marker.
fn matches_run(name: Option<&str>, metadata: &BTreeMap<String, String>, tag: &str) -> bool {
    let named = name.is_some_and(|value| value.starts_with(RESOURCE_NAME_PREFIX));
    let tagged = metadata
        .get(TEST_RUN_METADATA_KEY)
        .is_some_and(|value| value == tag);
    named && tagged
}

fn detail_snapshots() -> SnapshotFilters {
    SnapshotFilters {
        detail: true,
        ..SnapshotFilters::default()
    }
}

fn detail_servers() -> ServerFilters {
    ServerFilters {
        detail: true,
        ..ServerFilters::default()
    }
}

fn detail_volumes() -> VolumeFilters {
    VolumeFilters {
        detail: true,
        ..VolumeFilters::default()
    }
}
