//! Block storage service bindings.

pub mod snapshots;
pub mod types;
pub mod volumes;

pub use snapshots::{SnapshotFilters, SnapshotsClient};
pub use types::{
    CreateEncryptionTypeParams, CreateVolumeTypeParams, VolumeType, VolumeTypesClient,
};
pub use volumes::{CreateVolumeParams, Volume, VolumeFilters, VolumesClient};

/// Block storage API major versions the clients can speak.
///
/// Version differences are handled by composition: one client type carries
/// the selected version as a value and gates version specific operations,
/// rather than one client type per version.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub enum VolumeApiVersion {
    /// The legacy v2 API.
    V2,
    /// The current v3 API.
    #[default]
    V3,
}

impl VolumeApiVersion {
    /// Parses a configuration value such as `"3"`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "2" => Some(Self::V2),
            "3" => Some(Self::V3),
            _ => None,
        }
    }

    /// Major version number as written in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V2 => "2",
            Self::V3 => "3",
        }
    }

    /// URL path segment for the version, for example `v3`.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V3 => "v3",
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("2", Some(VolumeApiVersion::V2))]
    #[case("3", Some(VolumeApiVersion::V3))]
    #[case(" 3 ", Some(VolumeApiVersion::V3))]
    #[case("1", None)]
    #[case("v3", None)]
    #[case("", None)]
    fn versions_parse_from_configuration_values(
        #[case] raw: &str,
        #[case] expected: Option<VolumeApiVersion>,
    ) {
        assert_eq!(VolumeApiVersion::parse(raw), expected);
    }

    #[rstest]
    #[case(VolumeApiVersion::V2, "2", "v2")]
    #[case(VolumeApiVersion::V3, "3", "v3")]
    fn versions_render_their_configuration_and_url_forms(
        #[case] version: VolumeApiVersion,
        #[case] config_form: &str,
        #[case] url_form: &str,
    ) {
        assert_eq!(version.as_str(), config_form);
        assert_eq!(version.path_segment(), url_form);
    }

    /// The sweeper and the scenario import their filter and parameter types
    /// from this module root rather than the submodules.
    #[rstest]
    fn filters_and_params_are_exported_at_the_module_root() {
        use crate::services::volume::{
            CreateEncryptionTypeParams, CreateVolumeParams, SnapshotFilters, VolumeFilters,
        };

        let snapshots = SnapshotFilters {
            detail: true,
            ..SnapshotFilters::default()
        };
        assert!(snapshots.detail);
        assert!(VolumeFilters::default().status.is_none());
        assert_eq!(CreateVolumeParams::default().size, 0);

        let encryption = CreateEncryptionTypeParams {
            provider: String::from("luks"),
            key_size: None,
            cipher: None,
            control_location: None,
        };
        assert_eq!(encryption.provider, "luks");
    }
}
