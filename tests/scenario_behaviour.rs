//! Behavioural tests for the encrypted volume scenario.
//!
//! The unit tests cover stage ordering and stage failures; these runs cover
//! the paths that only appear end to end: uploading image data during a
//! successful run, and a teardown that fails after every stage succeeded.

#[path = "common/cloud_fixtures.rs"]
mod cloud_fixtures;

use cloud_fixtures::cloud_config;
use zond::test_support::{
    StubTransport, json_attachment, json_encryption_type, json_image, json_keypair, json_server,
    json_volume, json_volume_type,
};
use zond::{
    CryptoProvider, EncryptedVolumeScenario, Method, ScenarioError, ServiceClients,
};

fn scenario(stub: &StubTransport) -> EncryptedVolumeScenario<StubTransport> {
    let config = cloud_config();
    let clients = ServiceClients::with_transport(&config, stub.clone())
        .unwrap_or_else(|err| panic!("valid config builds clients: {err}"));
    EncryptedVolumeScenario::new(&clients, &config)
}

fn script_through_detach(stub: &StubTransport, with_upload: bool) {
    stub.push_response(200, json_keypair("zond-key"));
    stub.push_response(201, json_image("img-1", "queued"));
    if with_upload {
        stub.push_status(204);
    }
    stub.push_response(202, "{\"server\":{\"id\":\"srv-1\"}}");
    stub.push_response(200, json_server("srv-1", "ACTIVE"));
    stub.push_response(200, json_volume_type("vt-1", "zond-luks-test"));
    stub.push_response(200, json_encryption_type("vt-1", "luks"));
    stub.push_response(202, json_volume("vol-1", "creating"));
    stub.push_response(200, json_volume("vol-1", "available"));
    stub.push_response(
        200,
        "{\"volume\":{\"id\":\"vol-1\",\"status\":\"available\",\"encrypted\":true,\
         \"attachments\":[],\"metadata\":{}}}",
    );
    stub.push_response(200, json_attachment("att-1", "srv-1", "vol-1"));
    stub.push_response(200, json_volume("vol-1", "in-use"));
    stub.push_status(202);
    stub.push_response(200, json_volume("vol-1", "available"));
}

#[tokio::test]
async fn image_data_is_uploaded_during_a_successful_run() {
    let stub = StubTransport::new();
    script_through_detach(&stub, true);
    stub.push_status(202);
    stub.push_status(404);
    stub.push_status(202);
    stub.push_status(204);
    stub.push_status(404);
    stub.push_status(204);
    stub.push_status(202);

    let report = scenario(&stub)
        .with_image_data(vec![0xAA, 0xBB, 0xCC])
        .run(CryptoProvider::Luks)
        .await
        .expect("scenario succeeds");

    assert_eq!(report.provider, CryptoProvider::Luks);
    assert_eq!(report.volume_id, "vol-1");
    assert_eq!(report.server_id, "srv-1");
    assert_eq!(report.device.as_deref(), Some("/dev/vdb"));
    assert_eq!(report.encrypted, Some(true));

    let requests = stub.requests();
    assert_eq!(requests.len(), 21);
    let upload = requests
        .iter()
        .find(|request| request.method == Method::Put)
        .expect("image upload request");
    assert!(upload.url.ends_with("v2/images/img-1/file"));
    assert_eq!(
        upload.header("Content-Type"),
        Some("application/octet-stream")
    );
    assert_eq!(upload.body.as_deref(), Some(&[0xAA_u8, 0xBB, 0xCC][..]));
}

#[tokio::test]
async fn teardown_failure_after_success_is_surfaced_on_its_own() {
    let stub = StubTransport::new();
    script_through_detach(&stub, false);
    stub.push_response(500, "storage exploded");
    stub.push_status(202);
    stub.push_status(204);
    stub.push_status(404);
    stub.push_status(204);
    stub.push_status(202);

    let err = scenario(&stub)
        .run(CryptoProvider::Luks)
        .await
        .expect_err("the volume deletion fails");

    let ScenarioError::Teardown { ref message } = err else {
        panic!("expected a teardown error, got {err:?}");
    };
    assert!(
        message.contains("volume vol-1"),
        "the failed deletion should be named: {message}"
    );
    assert!(
        message.contains("storage exploded"),
        "the service response should be kept: {message}"
    );

    let requests = stub.requests();
    assert_eq!(requests.len(), 19);
    let last = requests.last().expect("teardown continued to the end");
    assert!(
        last.url.ends_with("os-keypairs/zond-key"),
        "one stuck resource should not strand the rest: {}",
        last.url
    );
}
