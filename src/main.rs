//! Binary entry point for the Zond CLI.

use std::fs;
use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;

use zond::{
    CleanupConfig, CloudConfig, CryptoProvider, EncryptedVolumeScenario, HttpTransport,
    ScenarioReport, ServiceClients, SweepSummary, Sweeper, skip_checks,
};

mod cli;

use cli::{CapabilitiesCommand, CleanupCommand, Cli, ProviderArg, ScenarioCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("capability discovery failed: {0}")]
    Capabilities(String),
    #[error("scenario failed: {0}")]
    Scenario(String),
    #[error("cleanup failed: {0}")]
    Cleanup(String),
    #[error("image file error: {0}")]
    ImageFile(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Capabilities(command) => capabilities_command(&command).await,
        Cli::Scenario(command) => scenario_command(command).await,
        Cli::Cleanup(command) => cleanup_command(command).await,
    }
}

fn load_config() -> Result<CloudConfig, CliError> {
    CloudConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))
}

fn build_clients(config: &CloudConfig) -> Result<ServiceClients<HttpTransport>, CliError> {
    ServiceClients::from_config(config).map_err(|err| CliError::Config(err.to_string()))
}

async fn capabilities_command(args: &CapabilitiesCommand) -> Result<i32, CliError> {
    let config = load_config()?;
    let clients = build_clients(&config)?;
    let listing = clients
        .capabilities
        .list_capabilities(&args.api_prefix)
        .await
        .map_err(|err| CliError::Capabilities(err.to_string()))?;

    let mut stdout = io::stdout();
    for (feature, settings) in &listing.body {
        writeln!(stdout, "{feature}: {settings}").ok();
    }
    Ok(0)
}

async fn scenario_command(args: ScenarioCommand) -> Result<i32, CliError> {
    let config = load_config()?;
    let provider = provider_from_arg(args.provider);
    if let Err(reason) = skip_checks(&config, provider) {
        writeln!(io::stdout(), "scenario skipped: {reason}").ok();
        return Ok(0);
    }

    let clients = build_clients(&config)?;
    let mut scenario = EncryptedVolumeScenario::new(&clients, &config);
    if let Some(id) = args.test_run_id {
        let tag = CleanupConfig::new(id)
            .map_err(|err| CliError::Config(err.to_string()))?
            .test_run_tag();
        scenario = scenario.with_run_tag(tag);
    }
    if let Some(path) = args.image_file {
        let data = fs::read(&path).map_err(|err| CliError::ImageFile(format!("{path}: {err}")))?;
        scenario = scenario.with_image_data(data);
    }

    let report = scenario
        .run(provider)
        .await
        .map_err(|err| CliError::Scenario(err.to_string()))?;
    writeln!(io::stdout(), "{}", render_report(&report)).ok();
    Ok(0)
}

async fn cleanup_command(args: CleanupCommand) -> Result<i32, CliError> {
    let config = load_config()?;
    let cleanup = CleanupConfig::new(args.test_run_id)
        .map_err(|err| CliError::Cleanup(err.to_string()))?;
    let sweeper =
        Sweeper::from_config(&config, cleanup).map_err(|err| CliError::Config(err.to_string()))?;
    let summary = sweeper
        .sweep()
        .await
        .map_err(|err| CliError::Cleanup(err.to_string()))?;

    writeln!(io::stdout(), "{}", render_summary(&summary)).ok();
    Ok(0)
}

const fn provider_from_arg(provider: ProviderArg) -> CryptoProvider {
    match provider {
        ProviderArg::Luks => CryptoProvider::Luks,
        ProviderArg::Plain => CryptoProvider::Plain,
    }
}

fn render_report(report: &ScenarioReport) -> String {
    let device = report.device.as_deref().unwrap_or("unreported");
    let encrypted = match report.encrypted {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unreported",
    };
    format!(
        "scenario complete: provider={}, volume={}, server={}, device={device}, encrypted={encrypted}",
        report.provider.provider_name(),
        report.volume_id,
        report.server_id
    )
}

fn render_summary(summary: &SweepSummary) -> String {
    format!(
        "cleanup sweep complete: deleted_snapshots={}, deleted_servers={}, deleted_volumes={}, deleted_volume_types={}",
        summary.deleted_snapshots,
        summary.deleted_servers,
        summary.deleted_volumes,
        summary.deleted_volume_types
    )
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
