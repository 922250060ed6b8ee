//! Orchestrates the encrypted volume attach scenario.
//!
//! The scenario provisions a keypair, a boot image and a server, creates a
//! volume type carrying encryption settings, creates a volume of that type,
//! attaches it to the server, detaches it again and tears everything down
//! in reverse order. Waits between stages use the status waiters, so each
//! stage observes the asynchronous outcome of the previous one.

use std::collections::BTreeMap;
use std::fmt::Display;

use thiserror::Error;
use uuid::Uuid;

use crate::cleanup::TEST_RUN_METADATA_KEY;
use crate::config::CloudConfig;
use crate::rest::Transport;
use crate::services::ServiceClients;
use crate::services::compute::{
    AttachVolumeParams, CreateKeypairParams, CreateServerParams, ServersClient,
};
use crate::services::image::{CreateImageParams, ImagesClient};
use crate::services::volume::{
    CreateEncryptionTypeParams, CreateVolumeParams, CreateVolumeTypeParams, Volume, VolumeType,
    VolumeTypesClient, VolumesClient,
};
use crate::waiter::{
    WaitError, WaitPolicy, wait_for_resource_deletion, wait_for_server_status,
    wait_for_volume_status,
};

const ENCRYPTION_KEY_SIZE_BITS: u32 = 256;
const ENCRYPTION_CIPHER: &str = "aes-xts-plain64";
const ENCRYPTION_CONTROL_LOCATION: &str = "front-end";

const STATUS_AVAILABLE: &str = "available";
const STATUS_IN_USE: &str = "in-use";
const STATUS_ACTIVE: &str = "ACTIVE";

/// Volume encryption providers the scenario can exercise.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CryptoProvider {
    /// LUKS encryption, decrypted by the hypervisor.
    Luks,
    /// Plain dm-crypt encryption, the legacy cryptsetup format.
    Plain,
}

impl CryptoProvider {
    /// Provider string sent in encryption type documents.
    #[must_use]
    pub const fn provider_name(self) -> &'static str {
        match self {
            Self::Luks => "luks",
            Self::Plain => "plain",
        }
    }

    /// Fully qualified encryptor class name, for deployments that predate
    /// the short provider strings.
    #[must_use]
    pub const fn encryptor_class(self) -> &'static str {
        match self {
            Self::Luks => "nova.volume.encryptors.luks.LuksEncryptor",
            Self::Plain => "nova.volume.encryptors.cryptsetup.CryptsetupEncryptor",
        }
    }

    /// Label used when naming the volume type created for the provider.
    #[must_use]
    pub const fn volume_type_label(self) -> &'static str {
        match self {
            Self::Luks => "luks",
            Self::Plain => "cryptsetup",
        }
    }
}

/// Reasons the scenario cannot run against the configured deployment.
///
/// A skip is an orderly refusal, not a failure; callers report the reason
/// and exit cleanly.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SkipReason {
    /// The deployment does not support attaching encrypted volumes.
    #[error("deployment does not support attaching encrypted volumes")]
    AttachEncryptedVolumeUnsupported,
    /// The requested provider is not in the supported set.
    #[error("crypto provider {provider} is not supported by the deployment")]
    ProviderUnsupported {
        /// Provider string that was requested.
        provider: String,
    },
    /// Key manager deployments enforce image signature verification, which
    /// rejects the scenario's unsigned boot image.
    #[error("image signature verification is enabled, which rejects the scenario boot image")]
    ImageSignatureVerificationEnabled,
}

/// Checks the configured deployment against the scenario's prerequisites.
///
/// # Errors
///
/// Returns the first [`SkipReason`] that rules the scenario out.
pub fn skip_checks(config: &CloudConfig, provider: CryptoProvider) -> Result<(), SkipReason> {
    if !config.attach_encrypted_volume() {
        return Err(SkipReason::AttachEncryptedVolumeUnsupported);
    }
    let supported = config.crypto_providers();
    if !supported.iter().any(|name| name == provider.provider_name()) {
        return Err(SkipReason::ProviderUnsupported {
            provider: provider.provider_name().to_owned(),
        });
    }
    if config.barbican_enabled() {
        return Err(SkipReason::ImageSignatureVerificationEnabled);
    }
    Ok(())
}

/// Errors surfaced while running the scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Raised when creating the scenario keypair fails.
    #[error("failed to create scenario keypair: {message}")]
    Keypair {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying REST or wait error.
        #[source]
        source: WaitError,
    },
    /// Raised when registering or uploading the boot image fails.
    #[error("failed to prepare boot image: {message}")]
    Image {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying REST or wait error.
        #[source]
        source: WaitError,
    },
    /// Raised when the server does not boot.
    #[error("server did not become active: {message}")]
    Server {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying REST or wait error.
        #[source]
        source: WaitError,
    },
    /// Raised when creating the encrypted volume type fails.
    #[error("failed to create encrypted volume type: {message}")]
    VolumeType {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying REST or wait error.
        #[source]
        source: WaitError,
    },
    /// Raised when the encrypted volume cannot be created or never becomes
    /// available.
    #[error("encrypted volume did not become available: {message}")]
    Volume {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying REST or wait error.
        #[source]
        source: WaitError,
    },
    /// Raised when attaching the volume to the server fails.
    #[error("failed to attach encrypted volume: {message}")]
    Attach {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying REST or wait error.
        #[source]
        source: WaitError,
    },
    /// Raised when detaching the volume fails.
    #[error("failed to detach encrypted volume: {message}")]
    Detach {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying REST or wait error.
        #[source]
        source: WaitError,
    },
    /// Raised when teardown fails after the stages themselves succeeded.
    #[error("scenario teardown failed: {message}")]
    Teardown {
        /// Which deletions failed and why.
        message: String,
    },
}

/// Outcome of a successful scenario run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScenarioReport {
    /// Provider that was exercised.
    pub provider: CryptoProvider,
    /// Identifier of the encrypted volume.
    pub volume_id: String,
    /// Identifier of the server the volume was attached to.
    pub server_id: String,
    /// Device node the attachment reported, when the service named one.
    pub device: Option<String>,
    /// Whether the service reported the volume as encrypted at rest.
    pub encrypted: Option<bool>,
}

/// Resources created so far, recorded as stages succeed so teardown knows
/// what to delete.
#[derive(Debug, Default)]
struct ProvisionedResources {
    keypair_name: Option<String>,
    image_id: Option<String>,
    server_id: Option<String>,
    volume_type_id: Option<String>,
    volume_id: Option<String>,
    /// Server and volume pair while the volume is attached.
    attachment: Option<(String, String)>,
}

/// Runs the encrypted volume scenario using the provided service clients.
#[derive(Debug)]
pub struct EncryptedVolumeScenario<T: Transport + Clone> {
    servers: ServersClient<T>,
    images: ImagesClient<T>,
    volumes: VolumesClient<T>,
    volume_types: VolumeTypesClient<T>,
    wait_policy: WaitPolicy,
    image_data: Option<Vec<u8>>,
    run_tag: Option<String>,
    flavor_ref: String,
    volume_size_gb: u32,
}

impl<T: Transport + Clone> EncryptedVolumeScenario<T> {
    /// Creates a scenario over existing service clients and configuration.
    #[must_use]
    pub fn new(clients: &ServiceClients<T>, config: &CloudConfig) -> Self {
        Self {
            servers: clients.servers.clone(),
            images: clients.images.clone(),
            volumes: clients.volumes.clone(),
            volume_types: clients.volume_types.clone(),
            wait_policy: WaitPolicy::default(),
            image_data: None,
            run_tag: None,
            flavor_ref: config.flavor_ref.clone(),
            volume_size_gb: config.volume_size_gb(),
        }
    }

    /// Overrides the wait policy.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    /// Supplies raw image bytes to upload after registering the boot image.
    /// Without data the image stays `queued`, which some deployments refuse
    /// to boot from.
    #[must_use]
    pub fn with_image_data(mut self, data: Vec<u8>) -> Self {
        self.image_data = Some(data);
        self
    }

    /// Tags created volumes and servers with a test-run marker so the
    /// cleanup sweeper can find them later.
    #[must_use]
    pub fn with_run_tag(mut self, tag: impl Into<String>) -> Self {
        self.run_tag = Some(tag.into());
        self
    }

    /// Runs the scenario end to end and returns a report of what happened.
    ///
    /// Teardown is always attempted. When a stage fails, the resources
    /// created so far are deleted and any teardown failure is appended to
    /// the stage error's message. When every stage succeeds but teardown
    /// does not, the teardown error is surfaced on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] naming the stage that failed.
    pub async fn run(&self, provider: CryptoProvider) -> Result<ScenarioReport, ScenarioError> {
        let mut resources = ProvisionedResources::default();

        let keypair_name = self.create_keypair_or_teardown(&mut resources).await?;
        let image_id = self.prepare_image_or_teardown(&mut resources).await?;
        let server_id = self
            .boot_server_or_teardown(&mut resources, &image_id, &keypair_name)
            .await?;
        let volume_type = self
            .create_encrypted_type_or_teardown(&mut resources, provider)
            .await?;
        let volume = self
            .create_volume_or_teardown(&mut resources, &volume_type)
            .await?;
        let device = self
            .attach_volume_or_teardown(&mut resources, &server_id, &volume.id)
            .await?;
        self.detach_volume_or_teardown(&mut resources, &server_id, &volume.id)
            .await?;

        self.teardown(&resources).await?;
        Ok(ScenarioReport {
            provider,
            volume_id: volume.id,
            server_id,
            device,
            encrypted: volume.encrypted,
        })
    }

    async fn create_keypair_or_teardown(
        &self,
        resources: &mut ProvisionedResources,
    ) -> Result<String, ScenarioError> {
        let params = CreateKeypairParams {
            name: scenario_name(),
            public_key: None,
        };
        match self.servers.create_keypair(&params).await {
            Ok(body) => {
                let name = body.into_inner().keypair.name;
                resources.keypair_name = Some(name.clone());
                Ok(name)
            }
            Err(err) => {
                let source = WaitError::from(err);
                let message = self.teardown_with_note(resources, &source).await;
                Err(ScenarioError::Keypair { message, source })
            }
        }
    }

    async fn prepare_image_or_teardown(
        &self,
        resources: &mut ProvisionedResources,
    ) -> Result<String, ScenarioError> {
        let params = CreateImageParams {
            name: scenario_name(),
            container_format: String::from("bare"),
            disk_format: String::from("raw"),
            visibility: None,
        };
        let image_id = match self.images.create_image(&params).await {
            Ok(body) => body.into_inner().id,
            Err(err) => {
                let source = WaitError::from(err);
                let message = self.teardown_with_note(resources, &source).await;
                return Err(ScenarioError::Image { message, source });
            }
        };
        resources.image_id = Some(image_id.clone());

        if let Some(data) = &self.image_data {
            if let Err(err) = self.images.store_image_file(&image_id, data.clone()).await {
                let source = WaitError::from(err);
                let message = self.teardown_with_note(resources, &source).await;
                return Err(ScenarioError::Image { message, source });
            }
        }
        Ok(image_id)
    }

    async fn boot_server_or_teardown(
        &self,
        resources: &mut ProvisionedResources,
        image_id: &str,
        keypair_name: &str,
    ) -> Result<String, ScenarioError> {
        let params = CreateServerParams {
            name: scenario_name(),
            image_ref: image_id.to_owned(),
            flavor_ref: self.flavor_ref.clone(),
            key_name: Some(keypair_name.to_owned()),
            metadata: self.tag_metadata(),
        };
        let server_id = match self.servers.create_server(&params).await {
            Ok(body) => body.into_inner().server.id,
            Err(err) => {
                let source = WaitError::from(err);
                let message = self.teardown_with_note(resources, &source).await;
                return Err(ScenarioError::Server { message, source });
            }
        };
        resources.server_id = Some(server_id.clone());

        if let Err(source) =
            wait_for_server_status(&self.servers, &server_id, STATUS_ACTIVE, &self.wait_policy)
                .await
        {
            let message = self.teardown_with_note(resources, &source).await;
            return Err(ScenarioError::Server { message, source });
        }
        Ok(server_id)
    }

    async fn create_encrypted_type_or_teardown(
        &self,
        resources: &mut ProvisionedResources,
        provider: CryptoProvider,
    ) -> Result<VolumeType, ScenarioError> {
        let params = CreateVolumeTypeParams {
            name: format!(
                "zond-{}-{}",
                provider.volume_type_label(),
                Uuid::new_v4().simple()
            ),
            description: None,
            extra_specs: BTreeMap::new(),
        };
        let volume_type = match self.volume_types.create_volume_type(&params).await {
            Ok(body) => body.into_inner().volume_type,
            Err(err) => {
                let source = WaitError::from(err);
                let message = self.teardown_with_note(resources, &source).await;
                return Err(ScenarioError::VolumeType { message, source });
            }
        };
        resources.volume_type_id = Some(volume_type.id.clone());

        let encryption = CreateEncryptionTypeParams {
            provider: provider.provider_name().to_owned(),
            key_size: Some(ENCRYPTION_KEY_SIZE_BITS),
            cipher: Some(ENCRYPTION_CIPHER.to_owned()),
            control_location: Some(ENCRYPTION_CONTROL_LOCATION.to_owned()),
        };
        if let Err(err) = self
            .volume_types
            .create_encryption_type(&volume_type.id, &encryption)
            .await
        {
            let source = WaitError::from(err);
            let message = self.teardown_with_note(resources, &source).await;
            return Err(ScenarioError::VolumeType { message, source });
        }
        Ok(volume_type)
    }

    async fn create_volume_or_teardown(
        &self,
        resources: &mut ProvisionedResources,
        volume_type: &VolumeType,
    ) -> Result<Volume, ScenarioError> {
        let params = CreateVolumeParams {
            size: self.volume_size_gb,
            name: Some(scenario_name()),
            volume_type: Some(volume_type.name.clone()),
            metadata: self.tag_metadata(),
            ..CreateVolumeParams::default()
        };
        let volume_id = match self.volumes.create_volume(&params).await {
            Ok(body) => body.into_inner().volume.id,
            Err(err) => {
                let source = WaitError::from(err);
                let message = self.teardown_with_note(resources, &source).await;
                return Err(ScenarioError::Volume { message, source });
            }
        };
        resources.volume_id = Some(volume_id.clone());

        if let Err(source) =
            wait_for_volume_status(&self.volumes, &volume_id, STATUS_AVAILABLE, &self.wait_policy)
                .await
        {
            let message = self.teardown_with_note(resources, &source).await;
            return Err(ScenarioError::Volume { message, source });
        }

        match self.volumes.show_volume(&volume_id).await {
            Ok(body) => Ok(body.into_inner().volume),
            Err(err) => {
                let source = WaitError::from(err);
                let message = self.teardown_with_note(resources, &source).await;
                Err(ScenarioError::Volume { message, source })
            }
        }
    }

    async fn attach_volume_or_teardown(
        &self,
        resources: &mut ProvisionedResources,
        server_id: &str,
        volume_id: &str,
    ) -> Result<Option<String>, ScenarioError> {
        let params = AttachVolumeParams {
            volume_id: volume_id.to_owned(),
            device: None,
        };
        let device = match self.servers.attach_volume(server_id, &params).await {
            Ok(body) => body.into_inner().volume_attachment.device,
            Err(err) => {
                let source = WaitError::from(err);
                let message = self.teardown_with_note(resources, &source).await;
                return Err(ScenarioError::Attach { message, source });
            }
        };
        resources.attachment = Some((server_id.to_owned(), volume_id.to_owned()));

        if let Err(source) =
            wait_for_volume_status(&self.volumes, volume_id, STATUS_IN_USE, &self.wait_policy)
                .await
        {
            let message = self.teardown_with_note(resources, &source).await;
            return Err(ScenarioError::Attach { message, source });
        }
        Ok(device)
    }

    async fn detach_volume_or_teardown(
        &self,
        resources: &mut ProvisionedResources,
        server_id: &str,
        volume_id: &str,
    ) -> Result<(), ScenarioError> {
        if let Err(err) = self.servers.detach_volume(server_id, volume_id).await {
            let source = WaitError::from(err);
            let message = self.teardown_with_note(resources, &source).await;
            return Err(ScenarioError::Detach { message, source });
        }
        resources.attachment = None;

        if let Err(source) =
            wait_for_volume_status(&self.volumes, volume_id, STATUS_AVAILABLE, &self.wait_policy)
                .await
        {
            let message = self.teardown_with_note(resources, &source).await;
            return Err(ScenarioError::Detach { message, source });
        }
        Ok(())
    }

    /// Deletes everything the run created, in reverse creation order.
    /// Deletion failures are collected rather than aborting, so one stuck
    /// resource does not strand the rest.
    async fn teardown(&self, resources: &ProvisionedResources) -> Result<(), ScenarioError> {
        let mut failures = Vec::new();

        if let Some((server_id, volume_id)) = &resources.attachment {
            if let Err(err) = self.detach_and_wait(server_id, volume_id).await {
                failures.push(format!("detach volume {volume_id}: {err}"));
            }
        }
        if let Some(volume_id) = &resources.volume_id {
            if let Err(err) = self.delete_volume_and_wait(volume_id).await {
                failures.push(format!("volume {volume_id}: {err}"));
            }
        }
        if let Some(volume_type_id) = &resources.volume_type_id {
            if let Err(err) = self.delete_volume_type(volume_type_id).await {
                failures.push(format!("volume type {volume_type_id}: {err}"));
            }
        }
        if let Some(server_id) = &resources.server_id {
            if let Err(err) = self.delete_server_and_wait(server_id).await {
                failures.push(format!("server {server_id}: {err}"));
            }
        }
        if let Some(image_id) = &resources.image_id {
            if let Err(err) = self.delete_image(image_id).await {
                failures.push(format!("image {image_id}: {err}"));
            }
        }
        if let Some(keypair_name) = &resources.keypair_name {
            if let Err(err) = self.delete_keypair(keypair_name).await {
                failures.push(format!("keypair {keypair_name}: {err}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ScenarioError::Teardown {
                message: failures.join("; "),
            })
        }
    }

    async fn detach_and_wait(&self, server_id: &str, volume_id: &str) -> Result<(), WaitError> {
        match self.servers.detach_volume(server_id, volume_id).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        wait_for_volume_status(&self.volumes, volume_id, STATUS_AVAILABLE, &self.wait_policy).await
    }

    async fn delete_volume_and_wait(&self, volume_id: &str) -> Result<(), WaitError> {
        match self.volumes.delete_volume(volume_id).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        wait_for_resource_deletion(&self.volumes, volume_id, &self.wait_policy).await
    }

    async fn delete_volume_type(&self, volume_type_id: &str) -> Result<(), WaitError> {
        match self.volume_types.delete_volume_type(volume_type_id).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_server_and_wait(&self, server_id: &str) -> Result<(), WaitError> {
        match self.servers.delete_server(server_id).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        wait_for_resource_deletion(&self.servers, server_id, &self.wait_policy).await
    }

    async fn delete_image(&self, image_id: &str) -> Result<(), WaitError> {
        match self.images.delete_image(image_id).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_keypair(&self, keypair_name: &str) -> Result<(), WaitError> {
        match self.servers.delete_keypair(keypair_name).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn teardown_with_note<E: Display>(
        &self,
        resources: &ProvisionedResources,
        err: &E,
    ) -> String {
        let teardown_error = self.teardown(resources).await.err();
        append_teardown_note(err.to_string(), teardown_error.as_ref())
    }

    fn tag_metadata(&self) -> BTreeMap<String, String> {
        self.run_tag
            .as_ref()
            .map(|tag| {
                let mut metadata = BTreeMap::new();
                metadata.insert(TEST_RUN_METADATA_KEY.to_owned(), tag.clone());
                metadata
            })
            .unwrap_or_default()
    }
}

fn scenario_name() -> String {
    format!("zond-{}", Uuid::new_v4().simple())
}

fn append_teardown_note<E: Display>(message: String, teardown_error: Option<&E>) -> String {
    if let Some(teardown) = teardown_error {
        format!("{message} (teardown also failed: {teardown})")
    } else {
        message
    }
}
