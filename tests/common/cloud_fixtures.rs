//! Shared configuration fixtures for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file
//! in `tests/`). Placing shared fixtures under `tests/common/` avoids creating
//! an additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/cloud_fixtures.rs"]
//! mod cloud_fixtures;
//! ```

use zond::CloudConfig;

/// A complete configuration pointing at example endpoints.
///
/// Valid as written; tests override individual fields with struct update
/// syntax to provoke specific failures.
pub fn cloud_config() -> CloudConfig {
    CloudConfig {
        auth_token: Some(String::from("token-1")),
        project_id: Some(String::from("proj-1")),
        volume_url: Some(String::from("https://volume.example.test")),
        compute_url: Some(String::from("https://compute.example.test")),
        image_url: Some(String::from("https://image.example.test")),
        object_storage_url: Some(String::from("https://storage.example.test")),
        volume_api_version: String::from("3"),
        flavor_ref: String::from("1"),
        volume_size_gb: Some(1),
        attach_encrypted_volume: Some(true),
        supported_crypto_providers: None,
        barbican_enabled: Some(false),
        http_timeout_secs: Some(30),
    }
}
