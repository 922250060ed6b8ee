//! Typed REST clients and test scenarios for cloud platform APIs.
//!
//! The crate centres on a typed REST core: URL composition, token
//! authentication, explicit status acceptance and JSON decoding, with one
//! client per service API built on top. Around the clients sit the pieces a
//! test run needs: status waiters, an encrypted volume attach scenario, and
//! a sweeper that deletes whatever a tagged run left behind.

pub mod cleanup;
pub mod config;
pub mod rest;
pub mod scenario;
pub mod services;
pub mod test_support;
pub mod waiter;

pub use cleanup::{
    CleanupConfig, CleanupError, RESOURCE_NAME_PREFIX, SweepSummary, Sweeper, TEST_RUN_ID_ENV,
    TEST_RUN_METADATA_KEY, TEST_RUN_TAG_PREFIX,
};
pub use config::{CloudConfig, ConfigError};
pub use rest::probe::{ResourceClient, ResourcePresence};
pub use rest::{
    HttpTransport, Method, Response, ResponseBody, RestClient, RestError, RestFuture,
    ServiceEndpoint, Transport, TransportError, TransportFuture, UrlPrefix, WireRequest,
    WireResponse,
};
pub use scenario::{
    CryptoProvider, EncryptedVolumeScenario, ScenarioError, ScenarioReport, SkipReason,
    skip_checks,
};
pub use services::ServiceClients;
pub use waiter::{WaitError, WaitPolicy};
