//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::rest::ServiceEndpoint;
use crate::services::volume::VolumeApiVersion;

const DEFAULT_VOLUME_SIZE_GB: u32 = 1;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Deserialises a string-typed field from either a string or an integer
/// scalar, so numeric-looking environment values such as
/// `ZOND_VOLUME_API_VERSION=2` load into `String` fields.
fn string_from_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct ScalarVisitor;

    impl serde::de::Visitor<'_> for ScalarVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or integer")
        }

        fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_owned())
        }

        fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(ScalarVisitor)
}

/// Cloud endpoint and credential configuration derived from environment
/// variables, configuration files, and CLI flags.
///
/// Required values are declared optional so that loading always succeeds
/// and [`CloudConfig::validate`] can report what is missing with guidance,
/// rather than surfacing a raw merge failure. Service URLs point at the
/// root of each API; version and tenant scoping is derived here, so a
/// volume URL is `https://volume.example.net` rather than
/// `https://volume.example.net/v3/{project_id}`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "ZOND")]
pub struct CloudConfig {
    /// Pre-issued authentication token attached to every request. Token
    /// acquisition is out of scope; obtain one from the identity service.
    /// Required.
    pub auth_token: Option<String>,
    /// Project identifier used for tenant scoped URL prefixes. Required.
    pub project_id: Option<String>,
    /// Root URL of the block storage API. Required.
    pub volume_url: Option<String>,
    /// Root URL of the compute API. Required.
    pub compute_url: Option<String>,
    /// Root URL of the image API. Required.
    pub image_url: Option<String>,
    /// Root URL of the object storage API. Required.
    pub object_storage_url: Option<String>,
    /// Major version of the block storage API to speak. Defaults to `3`.
    ///
    /// The environment source parses bare digits (`ZOND_VOLUME_API_VERSION=3`)
    /// as integers, so deserialisation accepts integer scalars as well as
    /// strings.
    #[ortho_config(default = "3".to_owned())]
    #[serde(deserialize_with = "string_from_scalar")]
    pub volume_api_version: String,
    /// Flavor reference used when booting scenario servers.
    #[ortho_config(default = "1".to_owned())]
    pub flavor_ref: String,
    /// Size in gibibytes for volumes created by scenarios. Defaults to 1.
    pub volume_size_gb: Option<u32>,
    /// Whether the deployment supports attaching encrypted volumes.
    /// Defaults to true.
    ///
    /// `skip_cli` keeps the derived clap layer from registering a
    /// `SetTrue` flag, which would inject `false` whenever the flag is
    /// absent and override the environment and file sources.
    #[ortho_config(skip_cli)]
    pub attach_encrypted_volume: Option<bool>,
    /// Encryption providers the deployment supports. Defaults to `luks`.
    pub supported_crypto_providers: Option<Vec<String>>,
    /// Whether a key manager backs volume encryption. Defaults to false.
    ///
    /// `skip_cli` for the same reason as `attach_encrypted_volume`.
    #[ortho_config(skip_cli)]
    pub barbican_enabled: Option<bool>,
    /// Per-request HTTP timeout in seconds. Defaults to 30.
    pub http_timeout_secs: Option<u64>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }
}

impl CloudConfig {
    fn require_field<'a>(
        value: Option<&'a str>,
        metadata: &FieldMetadata,
    ) -> Result<&'a str, ConfigError> {
        match value {
            Some(present) if !present.trim().is_empty() => Ok(present),
            _ => Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to [{}] in zond.toml",
                metadata.description, metadata.env_var, metadata.toml_key, metadata.section
            ))),
        }
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("zond")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Authentication token, required for every request.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the token is unset or empty.
    pub fn auth_token(&self) -> Result<&str, ConfigError> {
        Self::require_field(
            self.auth_token.as_deref(),
            &FieldMetadata::new("authentication token", "ZOND_AUTH_TOKEN", "auth_token", "zond"),
        )
    }

    /// Project identifier, required for tenant scoped URLs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the value is unset or empty.
    pub fn project_id(&self) -> Result<&str, ConfigError> {
        Self::require_field(
            self.project_id.as_deref(),
            &FieldMetadata::new("project ID", "ZOND_PROJECT_ID", "project_id", "zond"),
        )
    }

    /// Root URL of the block storage API.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the value is unset or empty.
    pub fn volume_url(&self) -> Result<&str, ConfigError> {
        Self::require_field(
            self.volume_url.as_deref(),
            &FieldMetadata::new("block storage URL", "ZOND_VOLUME_URL", "volume_url", "zond"),
        )
    }

    /// Root URL of the compute API.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the value is unset or empty.
    pub fn compute_url(&self) -> Result<&str, ConfigError> {
        Self::require_field(
            self.compute_url.as_deref(),
            &FieldMetadata::new("compute URL", "ZOND_COMPUTE_URL", "compute_url", "zond"),
        )
    }

    /// Root URL of the image API.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the value is unset or empty.
    pub fn image_url(&self) -> Result<&str, ConfigError> {
        Self::require_field(
            self.image_url.as_deref(),
            &FieldMetadata::new("image URL", "ZOND_IMAGE_URL", "image_url", "zond"),
        )
    }

    /// Root URL of the object storage API.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the value is unset or empty.
    pub fn object_storage_url(&self) -> Result<&str, ConfigError> {
        Self::require_field(
            self.object_storage_url.as_deref(),
            &FieldMetadata::new(
                "object storage URL",
                "ZOND_OBJECT_STORAGE_URL",
                "object_storage_url",
                "zond",
            ),
        )
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is unset
    /// or empty and [`ConfigError::InvalidField`] when a value is out of
    /// range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth_token()?;
        self.project_id()?;
        self.volume_url()?;
        self.compute_url()?;
        self.image_url()?;
        self.object_storage_url()?;
        self.volume_api_version()?;
        if self.volume_size_gb() == 0 {
            return Err(ConfigError::InvalidField {
                field: "volume_size_gb".to_owned(),
                message: "scenario volume size must be at least 1 GiB".to_owned(),
            });
        }
        Ok(())
    }

    /// Parses the configured block storage API version.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for versions other than 2 and 3.
    pub fn volume_api_version(&self) -> Result<VolumeApiVersion, ConfigError> {
        VolumeApiVersion::parse(&self.volume_api_version).ok_or_else(|| {
            ConfigError::InvalidField {
                field: "volume_api_version".to_owned(),
                message: format!(
                    "unsupported volume API version '{}': expected 2 or 3",
                    self.volume_api_version
                ),
            }
        })
    }

    /// Endpoint of the block storage API, scoped by version and project.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the URL or project is missing, or when
    /// the configured version does not parse.
    pub fn volume_endpoint(&self) -> Result<ServiceEndpoint, ConfigError> {
        let version = self.volume_api_version()?;
        Ok(ServiceEndpoint::new(
            self.volume_url()?,
            format!("{}/{}", version.path_segment(), self.project_id()?),
        ))
    }

    /// Endpoint of the compute API.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the compute URL is missing.
    pub fn compute_endpoint(&self) -> Result<ServiceEndpoint, ConfigError> {
        Ok(ServiceEndpoint::new(self.compute_url()?, "v2.1"))
    }

    /// Endpoint of the image API.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the image URL is missing.
    pub fn image_endpoint(&self) -> Result<ServiceEndpoint, ConfigError> {
        Ok(ServiceEndpoint::new(self.image_url()?, "v2"))
    }

    /// Endpoint of the object storage API, scoped to the project account.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the URL or project is
    /// missing.
    pub fn object_storage_endpoint(&self) -> Result<ServiceEndpoint, ConfigError> {
        Ok(ServiceEndpoint::new(
            self.object_storage_url()?,
            format!("v1/AUTH_{}", self.project_id()?),
        ))
    }

    /// Size in gibibytes for volumes created by scenarios.
    #[must_use]
    pub const fn volume_size_gb(&self) -> u32 {
        match self.volume_size_gb {
            Some(size) => size,
            None => DEFAULT_VOLUME_SIZE_GB,
        }
    }

    /// Whether the deployment supports attaching encrypted volumes.
    #[must_use]
    pub const fn attach_encrypted_volume(&self) -> bool {
        match self.attach_encrypted_volume {
            Some(value) => value,
            None => true,
        }
    }

    /// Whether a key manager backs volume encryption.
    #[must_use]
    pub const fn barbican_enabled(&self) -> bool {
        match self.barbican_enabled {
            Some(value) => value,
            None => false,
        }
    }

    /// Per-request HTTP timeout as a [`Duration`].
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        match self.http_timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Encryption providers the deployment supports.
    #[must_use]
    pub fn crypto_providers(&self) -> Vec<String> {
        self.supported_crypto_providers
            .clone()
            .unwrap_or_else(|| vec![String::from("luks")])
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value that parsed but is not usable.
    #[error("invalid configuration field {field}: {message}")]
    InvalidField {
        /// Name of the offending field.
        field: String,
        /// Why the value was rejected.
        message: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
