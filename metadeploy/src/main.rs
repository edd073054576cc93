//! metadeploy - Entry Point
//!
//! Command line front end for the deployment orchestrator.

use std::collections::HashMap;
use std::env;

use anyhow::{bail, Context};
use colored::Colorize;
use tracing::{error, info};

use metadeploy::app::options::AppOptions;
use metadeploy::app::state::AppState;
use metadeploy::deploy::fsm::{OrchestrationState, Phase};
use metadeploy::filesys::file::File;
use metadeploy::logs::init_logging;
use metadeploy::models::deployment::DeploymentRequest;
use metadeploy::models::result::DeployStatus;
use metadeploy::storage::layout::StorageLayout;
use metadeploy::storage::settings::Settings;
use metadeploy::utils::version_info;

const USAGE: &str = "\
usage: metadeploy [--settings=<file>] <command>

commands:
  --deploy=<request.json> [--package=<file.zip>]   run a deployment
  --history [--org=<org id>]                        list deployment history
  --artifact=<record key> --out=<file.zip>          save the package kept for a record
  --clear-history                                   remove all history
  --version                                         print version information";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{version}"),
            Err(e) => eprintln!("{e}"),
        }
        return;
    }

    if let Err(e) = run(cli_args).await {
        error!("{:#}", e);
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli_args: HashMap<String, String>) -> anyhow::Result<()> {
    let layout = StorageLayout::default();
    let settings_file = cli_args
        .get("settings")
        .map(File::new)
        .unwrap_or_else(|| layout.settings_file());
    let mut settings = Settings::load(&settings_file)
        .await
        .with_context(|| format!("Unable to read settings file {}", settings_file.path().display()))?;

    let options = AppOptions::from_settings(&settings, layout);
    let _log_guard = match init_logging(options.logging.clone()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let access_token = settings.remote.access_token.take();
    let state = AppState::init(&options, access_token)
        .await
        .context("Unable to initialize metadeploy")?;

    if let Some(request_path) = cli_args.get("deploy") {
        return deploy(&state, request_path, cli_args.get("package")).await;
    }
    if cli_args.contains_key("history") {
        return print_history(&state, cli_args.get("org")).await;
    }
    if let Some(record_key) = cli_args.get("artifact") {
        let Some(out) = cli_args.get("out") else {
            bail!("--artifact requires --out=<file.zip>");
        };
        return save_artifact(&state, record_key, out).await;
    }
    if cli_args.contains_key("clear-history") {
        state.history.clear().await;
        println!("History cleared");
        return Ok(());
    }

    println!("{USAGE}");
    Ok(())
}

async fn deploy(state: &AppState, request_path: &str, package_path: Option<&String>) -> anyhow::Result<()> {
    let mut request: DeploymentRequest = File::new(request_path)
        .read_json()
        .await
        .with_context(|| format!("Unable to read deployment request {request_path}"))?;

    if let Some(package_path) = package_path {
        let bytes = File::new(package_path)
            .read_bytes()
            .await
            .with_context(|| format!("Unable to read package {package_path}"))?;
        request.package = Some(bytes);
    }

    let handle = state.orchestrator.start(request)?;
    println!("Run {}", handle.id().dimmed());
    let printer = state.orchestrator.subscribe(&handle, print_state);

    let final_state = tokio::select! {
        final_state = async { handle.wait().await } => final_state,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, canceling run...");
            println!("{}", "Canceled locally; the remote job keeps running".yellow());
            return Ok(());
        }
    };
    let _ = printer.await;

    match final_state.phase {
        Phase::Done => Ok(()),
        _ => bail!(
            "{}",
            final_state
                .error
                .map(|error| error.message)
                .unwrap_or_else(|| "Run did not finish".to_string())
        ),
    }
}

fn print_state(state: &OrchestrationState) {
    let phase = format!("{:?}", state.phase);
    match state.phase {
        Phase::Done => {
            if let Some(result) = &state.last_result {
                let summary = result.summary();
                let line = match result.status {
                    DeployStatus::Succeeded => summary.green(),
                    DeployStatus::SucceededPartial => summary.yellow(),
                    _ => summary.red(),
                };
                println!("{} {}", phase.bold(), line);
            }
        }
        Phase::Error => {
            let message = state.error.as_ref().map(|e| e.message.as_str()).unwrap_or("");
            println!("{} {}", phase.bold(), message.red());
        }
        _ => {
            let job = state
                .remote_job_id
                .as_ref()
                .map(|id| format!(" (job {id})"))
                .unwrap_or_default();
            let checked = state
                .last_polled_at
                .map(|at| format!(", last checked {}", at.format("%H:%M:%S")))
                .unwrap_or_default();
            println!("{}{}{}", phase.bold(), job, checked);
        }
    }
}

async fn print_history(state: &AppState, org: Option<&String>) -> anyhow::Result<()> {
    let records = match org {
        Some(org) => state.history.list_for_org(org).await,
        None => state.history.list().await,
    };

    if records.is_empty() {
        println!("No deployment history");
        return Ok(());
    }

    for record in records {
        let status = format!("{:?}", record.status);
        let status = if record.status.is_success() {
            status.green()
        } else {
            status.red()
        };
        let artifact = if record.artifact_key.is_some() { " [package]" } else { "" };
        println!(
            "{}  {}  {} -> {}  {} items  {}{}",
            record.start.format("%Y-%m-%d %H:%M:%S"),
            status,
            record.mode,
            record.destination_org.label,
            record.metadata_summary.total_items,
            record.key.dimmed(),
            artifact
        );
    }
    Ok(())
}

async fn save_artifact(state: &AppState, record_key: &str, out: &str) -> anyhow::Result<()> {
    let Some(bytes) = state.history.get_artifact(record_key).await else {
        bail!("Package for {record_key} is unavailable");
    };
    File::new(out)
        .write_bytes(&bytes)
        .await
        .with_context(|| format!("Unable to write {out}"))?;
    println!("Saved {} bytes to {}", bytes.len(), out);
    Ok(())
}
