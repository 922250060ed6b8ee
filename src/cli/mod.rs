//! Command-line interface definitions for the `zond` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, ValueEnum};

/// Top-level CLI for the `zond` binary.
#[derive(Debug, Parser)]
#[command(
    name = "zond",
    about = "Drive a cloud's block storage, compute and image APIs through typed test scenarios",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Fetch the object storage capability listing.
    #[command(
        name = "capabilities",
        about = "Fetch the object storage capability listing"
    )]
    Capabilities(CapabilitiesCommand),
    /// Create, attach and detach an encrypted volume end to end.
    #[command(
        name = "scenario",
        about = "Create, attach and detach an encrypted volume end to end"
    )]
    Scenario(ScenarioCommand),
    /// Delete resources left behind by a tagged test run.
    #[command(
        name = "cleanup",
        about = "Delete resources left behind by a tagged test run"
    )]
    Cleanup(CleanupCommand),
}

/// Arguments for the `zond capabilities` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct CapabilitiesCommand {
    /// Path prefix inserted before `info` when composing the discovery URL.
    ///
    /// Most deployments publish the listing at `/info`; installations that
    /// mount the API under extra path segments spell them out here, trailing
    /// slash included.
    #[arg(long, value_name = "PREFIX", default_value = "")]
    pub(crate) api_prefix: String,
}

/// Arguments for the `zond scenario` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ScenarioCommand {
    /// Encryption provider the volume type is built around.
    #[arg(long, value_name = "PROVIDER", value_enum, default_value = "luks")]
    pub(crate) provider: ProviderArg,
    /// Test run id used to tag created resources (`zond-test-run-<id>`).
    ///
    /// Tagged resources can be swept afterwards by `zond cleanup` with the
    /// same id.
    #[arg(long, value_name = "ID", env = "ZOND_TEST_RUN_ID")]
    pub(crate) test_run_id: Option<String>,
    /// Local file uploaded as the image payload before the server boots.
    #[arg(long, value_name = "PATH")]
    pub(crate) image_file: Option<String>,
}

/// Encryption providers selectable on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum ProviderArg {
    /// LUKS full-disk encryption.
    Luks,
    /// Plain dm-crypt mapping.
    Plain,
}

/// Arguments for the `zond cleanup` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct CleanupCommand {
    /// Test run id used to compute the tag (`zond-test-run-<id>`).
    #[arg(long, value_name = "ID", env = "ZOND_TEST_RUN_ID")]
    pub(crate) test_run_id: String,
}
