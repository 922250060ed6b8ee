//! Behavioural tests for the snapshot lifecycle.
//!
//! Drives a snapshot from creation through deletion with the same client and
//! waiter pairing a test harness would use, asserting the wire conversation
//! that results.

#[path = "common/cloud_fixtures.rs"]
mod cloud_fixtures;

use std::time::Duration;

use cloud_fixtures::cloud_config;
use zond::services::volume::snapshots::{CreateSnapshotParams, SnapshotsClient};
use zond::test_support::{StubTransport, json_snapshot};
use zond::waiter::{wait_for_resource_deletion, wait_for_snapshot_status};
use zond::{ServiceClients, WaitError, WaitPolicy};

const FAST_POLICY: WaitPolicy =
    WaitPolicy::new(Duration::from_millis(1), Duration::from_millis(200));

fn snapshots(stub: &StubTransport) -> SnapshotsClient<StubTransport> {
    let clients = ServiceClients::with_transport(&cloud_config(), stub.clone())
        .unwrap_or_else(|err| panic!("valid config builds clients: {err}"));
    clients.snapshots
}

#[tokio::test]
async fn lifecycle_runs_create_wait_delete_against_the_wire() {
    let stub = StubTransport::new();
    stub.push_response(202, json_snapshot("s1", "creating"));
    stub.push_response(200, json_snapshot("s1", "creating"));
    stub.push_response(200, json_snapshot("s1", "available"));
    stub.push_status(202);
    stub.push_response(200, json_snapshot("s1", "deleting"));
    stub.push_status(404);

    let client = snapshots(&stub);
    let params = CreateSnapshotParams {
        volume_id: String::from("vol-1"),
        name: Some(String::from("zond-snap")),
        ..CreateSnapshotParams::default()
    };
    let created = client
        .create_snapshot(&params)
        .await
        .expect("create accepted");
    assert_eq!(created.snapshot.id, "s1");
    assert_eq!(created.snapshot.status, "creating");

    wait_for_snapshot_status(&client, "s1", "available", &FAST_POLICY)
        .await
        .expect("snapshot becomes available");

    client.delete_snapshot("s1").await.expect("delete accepted");
    wait_for_resource_deletion(&client, "s1", &FAST_POLICY)
        .await
        .expect("snapshot disappears");

    let urls: Vec<String> = stub
        .requests()
        .into_iter()
        .map(|request| request.url)
        .collect();
    assert_eq!(
        urls,
        vec![
            String::from("https://volume.example.test/v3/proj-1/snapshots"),
            String::from("https://volume.example.test/v3/proj-1/snapshots/s1"),
            String::from("https://volume.example.test/v3/proj-1/snapshots/s1"),
            String::from("https://volume.example.test/v3/proj-1/snapshots/s1"),
            String::from("https://volume.example.test/v3/proj-1/snapshots/s1"),
            String::from("https://volume.example.test/v3/proj-1/snapshots/s1"),
        ]
    );
}

#[tokio::test]
async fn snapshot_stuck_in_error_aborts_the_wait() {
    let stub = StubTransport::new();
    stub.push_response(202, json_snapshot("s1", "creating"));
    stub.push_response(200, json_snapshot("s1", "error"));

    let client = snapshots(&stub);
    let params = CreateSnapshotParams {
        volume_id: String::from("vol-1"),
        ..CreateSnapshotParams::default()
    };
    client
        .create_snapshot(&params)
        .await
        .expect("create accepted");

    let err = wait_for_snapshot_status(&client, "s1", "available", &FAST_POLICY)
        .await
        .expect_err("error status should abort the wait");

    let WaitError::ErrorState {
        resource,
        ref status,
        ..
    } = err
    else {
        panic!("expected ErrorState, got {err:?}");
    };
    assert_eq!(resource, "volume-snapshot");
    assert_eq!(status, "error");
}

#[tokio::test]
async fn lingering_snapshot_is_reported_as_residual() {
    let stub = StubTransport::new();
    stub.push_status(202);
    for _ in 0..32 {
        stub.push_response(200, json_snapshot("s1", "deleting"));
    }

    let client = snapshots(&stub);
    client.delete_snapshot("s1").await.expect("delete accepted");

    let policy = WaitPolicy::new(Duration::from_millis(2), Duration::from_millis(6));
    let err = wait_for_resource_deletion(&client, "s1", &policy)
        .await
        .expect_err("snapshot never disappears");

    let WaitError::Residual {
        resource,
        ref resource_id,
        ..
    } = err
    else {
        panic!("expected Residual, got {err:?}");
    };
    assert_eq!(resource, "volume-snapshot");
    assert_eq!(resource_id, "s1");
}
