//! Behavioural smoke tests for the CLI entrypoint.
//!
//! These spawn the real binary. Configuration is isolated per test: `HOME`
//! and `XDG_CONFIG_HOME` point at a fresh temporary directory so no user
//! `zond.toml` leaks in, and behavioural `ZOND_*` variables are cleared
//! before each run.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

const REQUIRED_VARS: [(&str, &str); 6] = [
    ("ZOND_AUTH_TOKEN", "token-1"),
    ("ZOND_PROJECT_ID", "proj-1"),
    ("ZOND_VOLUME_URL", "https://volume.example.test"),
    ("ZOND_COMPUTE_URL", "https://compute.example.test"),
    ("ZOND_IMAGE_URL", "https://image.example.test"),
    ("ZOND_OBJECT_STORAGE_URL", "https://storage.example.test"),
];

const OPTIONAL_VARS: [&str; 8] = [
    "ZOND_VOLUME_API_VERSION",
    "ZOND_FLAVOR_REF",
    "ZOND_VOLUME_SIZE_GB",
    "ZOND_ATTACH_ENCRYPTED_VOLUME",
    "ZOND_SUPPORTED_CRYPTO_PROVIDERS",
    "ZOND_BARBICAN_ENABLED",
    "ZOND_HTTP_TIMEOUT_SECS",
    "ZOND_TEST_RUN_ID",
];

fn isolate(cmd: &mut Command, home: &str) {
    cmd.env("HOME", home);
    cmd.env("XDG_CONFIG_HOME", home);
    for key in OPTIONAL_VARS {
        cmd.env_remove(key);
    }
}

fn configure(cmd: &mut Command) {
    for (key, value) in REQUIRED_VARS {
        cmd.env(key, value);
    }
}

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("zond");
    cmd.assert().code(2).stderr(contains("Usage"));
}

#[test]
fn cli_help_lists_the_subcommands() {
    let mut cmd = cargo_bin_cmd!("zond");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("capabilities"))
        .stdout(contains("scenario"))
        .stdout(contains("cleanup"));
}

#[test]
fn cleanup_requires_a_test_run_id() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = cargo_bin_cmd!("zond");
    isolate(&mut cmd, &tmp.path().to_string_lossy());
    cmd.arg("cleanup");

    cmd.assert().code(2).stderr(contains("--test-run-id"));
}

#[test]
fn capabilities_without_configuration_fails_cleanly() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = cargo_bin_cmd!("zond");
    isolate(&mut cmd, &tmp.path().to_string_lossy());
    for (key, _) in REQUIRED_VARS {
        cmd.env_remove(key);
    }
    cmd.arg("capabilities");

    cmd.assert()
        .code(1)
        .stderr(contains("configuration error"))
        .stderr(contains("ZOND_AUTH_TOKEN"));
}

#[test]
fn scenario_skips_when_a_key_manager_is_deployed() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = cargo_bin_cmd!("zond");
    isolate(&mut cmd, &tmp.path().to_string_lossy());
    configure(&mut cmd);
    cmd.env("ZOND_BARBICAN_ENABLED", "true");
    cmd.arg("scenario");

    cmd.assert()
        .success()
        .stdout(contains("scenario skipped: image signature verification is enabled"));
}

#[test]
fn scenario_skips_when_attach_support_is_disabled() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = cargo_bin_cmd!("zond");
    isolate(&mut cmd, &tmp.path().to_string_lossy());
    configure(&mut cmd);
    cmd.env("ZOND_ATTACH_ENCRYPTED_VOLUME", "false");
    cmd.arg("scenario");

    cmd.assert().success().stdout(contains(
        "scenario skipped: deployment does not support attaching encrypted volumes",
    ));
}

#[test]
fn scenario_reports_an_unreadable_image_file() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let missing = tmp.path().join("missing.img");
    let mut cmd = cargo_bin_cmd!("zond");
    isolate(&mut cmd, &tmp.path().to_string_lossy());
    configure(&mut cmd);
    cmd.args(["scenario", "--image-file"]);
    cmd.arg(&missing);

    cmd.assert().code(1).stderr(contains("image file error"));
}
