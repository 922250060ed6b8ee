//! Polling helpers for asynchronous resource state.
//!
//! The storage and compute APIs acknowledge work before finishing it, so a
//! caller that needs an outcome polls the resource until it reaches the
//! target status, disappears, or lands in an error state. Each helper loops
//! on a [`WaitPolicy`] and converts the terminal conditions into typed
//! errors.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::sleep;

use crate::rest::probe::ResourceClient;
use crate::rest::{RestError, Transport};
use crate::services::compute::ServersClient;
use crate::services::volume::{SnapshotsClient, VolumesClient};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// How often and for how long to poll.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitPolicy {
    /// Delay between successive polls.
    pub poll_interval: Duration,
    /// Total time allowed before giving up.
    pub timeout: Duration,
}

impl WaitPolicy {
    /// Creates a policy from a poll interval and an overall timeout.
    #[must_use]
    pub const fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT)
    }
}

/// Errors raised while waiting on asynchronous resource state.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WaitError {
    /// Raised when the resource does not reach the target in time.
    #[error("timed out after {waited_secs}s waiting for {resource} {resource_id} to become {target}")]
    Timeout {
        /// Resource family being waited on.
        resource: &'static str,
        /// Identifier of the resource.
        resource_id: String,
        /// Status that was never reached.
        target: String,
        /// Seconds the waiter allowed.
        waited_secs: u64,
    },
    /// Raised when the resource lands in an error state instead.
    #[error("{resource} {resource_id} entered state {status} while waiting for {target}")]
    ErrorState {
        /// Resource family being waited on.
        resource: &'static str,
        /// Identifier of the resource.
        resource_id: String,
        /// Error status the service reported.
        status: String,
        /// Status that was being waited for.
        target: String,
    },
    /// Raised when a deleted resource is still visible after the timeout.
    #[error("{resource} {resource_id} still present after {waited_secs}s")]
    Residual {
        /// Resource family being waited on.
        resource: &'static str,
        /// Identifier of the resource.
        resource_id: String,
        /// Seconds the waiter allowed.
        waited_secs: u64,
    },
    /// Wrapper for REST failures observed mid-poll.
    #[error(transparent)]
    Rest(#[from] RestError),
}

fn timeout_error(resource: &'static str, resource_id: &str, target: &str, policy: &WaitPolicy) -> WaitError {
    WaitError::Timeout {
        resource,
        resource_id: resource_id.to_owned(),
        target: target.to_owned(),
        waited_secs: policy.timeout.as_secs(),
    }
}

fn error_state(
    resource: &'static str,
    resource_id: &str,
    status: &str,
    target: &str,
) -> WaitError {
    WaitError::ErrorState {
        resource,
        resource_id: resource_id.to_owned(),
        status: status.to_owned(),
        target: target.to_owned(),
    }
}

/// Polls a volume until it reaches `target`.
///
/// Reaching `target` wins even when the target itself is an error status,
/// so administrative resets can be awaited like any other transition.
///
/// # Errors
///
/// Returns [`WaitError::ErrorState`] when the volume reports an error
/// status other than the target and [`WaitError::Timeout`] when the policy
/// expires first.
pub async fn wait_for_volume_status<T: Transport>(
    volumes: &VolumesClient<T>,
    volume_id: &str,
    target: &str,
    policy: &WaitPolicy,
) -> Result<(), WaitError> {
    let deadline = Instant::now() + policy.timeout;
    while Instant::now() <= deadline {
        let body = volumes.show_volume(volume_id).await?;
        let status = body.volume.status.as_str();
        if status == target {
            return Ok(());
        }
        if status.starts_with("error") {
            return Err(error_state("volume", volume_id, status, target));
        }
        sleep(policy.poll_interval).await;
    }
    Err(timeout_error("volume", volume_id, target, policy))
}

/// Polls a snapshot until it reaches `target`.
///
/// # Errors
///
/// Returns [`WaitError::ErrorState`] when the snapshot reports an error
/// status other than the target and [`WaitError::Timeout`] when the policy
/// expires first.
pub async fn wait_for_snapshot_status<T: Transport>(
    snapshots: &SnapshotsClient<T>,
    snapshot_id: &str,
    target: &str,
    policy: &WaitPolicy,
) -> Result<(), WaitError> {
    let deadline = Instant::now() + policy.timeout;
    while Instant::now() <= deadline {
        let body = snapshots.show_snapshot(snapshot_id).await?;
        let status = body.snapshot.status.as_str();
        if status == target {
            return Ok(());
        }
        if status.starts_with("error") {
            return Err(error_state("volume-snapshot", snapshot_id, status, target));
        }
        sleep(policy.poll_interval).await;
    }
    Err(timeout_error("volume-snapshot", snapshot_id, target, policy))
}

/// Polls a server until it reaches `target`. Compute statuses are upper
/// case; an `ERROR` status fails the wait.
///
/// # Errors
///
/// Returns [`WaitError::ErrorState`] when the server reports `ERROR` and
/// [`WaitError::Timeout`] when the policy expires first.
pub async fn wait_for_server_status<T: Transport>(
    servers: &ServersClient<T>,
    server_id: &str,
    target: &str,
    policy: &WaitPolicy,
) -> Result<(), WaitError> {
    let deadline = Instant::now() + policy.timeout;
    while Instant::now() <= deadline {
        let body = servers.show_server(server_id).await?;
        let status = body.server.status.as_str();
        if status == target {
            return Ok(());
        }
        if status == "ERROR" {
            return Err(error_state("server", server_id, status, target));
        }
        sleep(policy.poll_interval).await;
    }
    Err(timeout_error("server", server_id, target, policy))
}

/// Polls until the resource disappears, as reported by its client's
/// deletion probe.
///
/// # Errors
///
/// Returns [`WaitError::Residual`] when the resource is still visible once
/// the policy expires.
pub async fn wait_for_resource_deletion<C>(
    client: &C,
    resource_id: &str,
    policy: &WaitPolicy,
) -> Result<(), WaitError>
where
    C: ResourceClient + ?Sized,
{
    let deadline = Instant::now() + policy.timeout;
    while Instant::now() <= deadline {
        if client.is_resource_deleted(resource_id).await? {
            return Ok(());
        }
        sleep(policy.poll_interval).await;
    }
    Err(WaitError::Residual {
        resource: client.resource_type(),
        resource_id: resource_id.to_owned(),
        waited_secs: policy.timeout.as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::{RestClient, ServiceEndpoint};
    use crate::services::volume::VolumeApiVersion;
    use crate::test_support::{StubTransport, json_server, json_snapshot, json_volume};

    const FAST_POLICY: WaitPolicy =
        WaitPolicy::new(Duration::from_millis(1), Duration::from_millis(200));

    fn volume_rest(stub: &StubTransport) -> RestClient<StubTransport> {
        RestClient::new(
            ServiceEndpoint::new("https://volume.example.test", "v3/proj-1"),
            "token-1",
            stub.clone(),
        )
    }

    fn volumes(stub: &StubTransport) -> VolumesClient<StubTransport> {
        VolumesClient::new(volume_rest(stub), VolumeApiVersion::V3)
    }

    fn servers(stub: &StubTransport) -> ServersClient<StubTransport> {
        ServersClient::new(RestClient::new(
            ServiceEndpoint::new("https://compute.example.test", "v2.1"),
            "token-1",
            stub.clone(),
        ))
    }

    #[tokio::test]
    async fn volume_wait_follows_transitions_to_target() {
        let stub = StubTransport::new();
        stub.push_response(200, json_volume("vol-1", "creating"));
        stub.push_response(200, json_volume("vol-1", "creating"));
        stub.push_response(200, json_volume("vol-1", "available"));

        wait_for_volume_status(&volumes(&stub), "vol-1", "available", &FAST_POLICY)
            .await
            .expect("volume becomes available");
        assert_eq!(stub.requests().len(), 3);
    }

    #[tokio::test]
    async fn volume_wait_surfaces_error_states() {
        let stub = StubTransport::new();
        stub.push_response(200, json_volume("vol-1", "creating"));
        stub.push_response(200, json_volume("vol-1", "error"));

        let err = wait_for_volume_status(&volumes(&stub), "vol-1", "available", &FAST_POLICY)
            .await
            .expect_err("error status should abort the wait");
        assert!(matches!(err, WaitError::ErrorState { .. }));
    }

    #[tokio::test]
    async fn volume_wait_accepts_an_error_target() {
        let stub = StubTransport::new();
        stub.push_response(200, json_volume("vol-1", "error"));

        wait_for_volume_status(&volumes(&stub), "vol-1", "error", &FAST_POLICY)
            .await
            .expect("reaching the requested error status is success");
    }

    #[tokio::test]
    async fn volume_wait_times_out_eventually() {
        let stub = StubTransport::new();
        let policy = WaitPolicy::new(Duration::from_millis(2), Duration::from_millis(6));
        for _ in 0..32 {
            stub.push_response(200, json_volume("vol-1", "creating"));
        }

        let err = wait_for_volume_status(&volumes(&stub), "vol-1", "available", &policy)
            .await
            .expect_err("status never changes");
        assert!(matches!(err, WaitError::Timeout { .. }));
    }

    #[tokio::test]
    async fn volume_wait_propagates_rest_failures() {
        let stub = StubTransport::new();
        stub.push_response(500, "boom");

        let err = wait_for_volume_status(&volumes(&stub), "vol-1", "available", &FAST_POLICY)
            .await
            .expect_err("500 should abort the wait");
        assert!(matches!(err, WaitError::Rest(_)));
    }

    #[tokio::test]
    async fn snapshot_wait_follows_transitions() {
        let stub = StubTransport::new();
        stub.push_response(200, json_snapshot("s1", "creating"));
        stub.push_response(200, json_snapshot("s1", "available"));
        let snapshots = SnapshotsClient::new(volume_rest(&stub));

        wait_for_snapshot_status(&snapshots, "s1", "available", &FAST_POLICY)
            .await
            .expect("snapshot becomes available");
    }

    #[tokio::test]
    async fn server_wait_reports_build_errors() {
        let stub = StubTransport::new();
        stub.push_response(200, json_server("srv-1", "BUILD"));
        stub.push_response(200, json_server("srv-1", "ERROR"));

        let err = wait_for_server_status(&servers(&stub), "srv-1", "ACTIVE", &FAST_POLICY)
            .await
            .expect_err("ERROR should abort the wait");
        assert!(matches!(
            err,
            WaitError::ErrorState { resource: "server", .. }
        ));
    }

    #[tokio::test]
    async fn deletion_wait_stops_once_gone() {
        let stub = StubTransport::new();
        stub.push_response(200, json_volume("vol-1", "deleting"));
        stub.push_response(200, json_volume("vol-1", "deleting"));
        stub.push_status(404);
        let client = volumes(&stub);

        wait_for_resource_deletion(&client, "vol-1", &FAST_POLICY)
            .await
            .expect("volume eventually disappears");
    }

    #[tokio::test]
    async fn deletion_wait_reports_residual_resources() {
        let stub = StubTransport::new();
        let policy = WaitPolicy::new(Duration::from_millis(2), Duration::from_millis(6));
        for _ in 0..32 {
            stub.push_response(200, json_volume("vol-1", "deleting"));
        }
        let client = volumes(&stub);

        let err = wait_for_resource_deletion(&client, "vol-1", &policy)
            .await
            .expect_err("volume never disappears");
        assert!(matches!(err, WaitError::Residual { .. }));
    }
}
