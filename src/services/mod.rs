//! Service bindings built on the REST core.
//!
//! Each submodule pairs one service API with a typed client: operations
//! take explicit parameter structures, state the statuses they accept and
//! decode payloads into typed envelopes. [`ServiceClients`] bundles one of
//! each, built from shared configuration and a shared transport.

pub mod compute;
pub mod image;
pub mod object_storage;
pub mod volume;

use crate::config::{CloudConfig, ConfigError};
use crate::rest::{HttpTransport, RestClient, Transport};
use compute::ServersClient;
use image::ImagesClient;
use object_storage::CapabilitiesClient;
use volume::{SnapshotsClient, VolumeTypesClient, VolumesClient};

/// One client per service API, sharing a transport and credentials.
#[derive(Clone, Debug)]
pub struct ServiceClients<T: Transport + Clone> {
    /// Block storage volume operations.
    pub volumes: VolumesClient<T>,
    /// Block storage snapshot operations.
    pub snapshots: SnapshotsClient<T>,
    /// Block storage volume type operations.
    pub volume_types: VolumeTypesClient<T>,
    /// Compute server, attachment and keypair operations.
    pub servers: ServersClient<T>,
    /// Image registry operations.
    pub images: ImagesClient<T>,
    /// Object storage discovery operations.
    pub capabilities: CapabilitiesClient<T>,
}

impl<T: Transport + Clone> ServiceClients<T> {
    /// Builds every service client from configuration over `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation.
    pub fn with_transport(config: &CloudConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;
        let version = config.volume_api_version()?;
        let token = config.auth_token()?;
        let volume_rest = RestClient::new(config.volume_endpoint()?, token, transport.clone());
        let compute_rest = RestClient::new(config.compute_endpoint()?, token, transport.clone());
        let image_rest = RestClient::new(config.image_endpoint()?, token, transport.clone());
        let storage_rest = RestClient::new(config.object_storage_endpoint()?, token, transport);
        Ok(Self {
            volumes: VolumesClient::new(volume_rest.clone(), version),
            snapshots: SnapshotsClient::new(volume_rest.clone()),
            volume_types: VolumeTypesClient::new(volume_rest),
            servers: ServersClient::new(compute_rest),
            images: ImagesClient::new(image_rest),
            capabilities: CapabilitiesClient::new(storage_rest),
        })
    }
}

impl ServiceClients<HttpTransport> {
    /// Builds clients that talk HTTP with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation.
    pub fn from_config(config: &CloudConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(config.http_timeout());
        Self::with_transport(config, transport)
    }
}
