//! mcp-probe binary: runs the configured scenarios and prints a report.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use mcp_probe::harness::{config, report, Harness, ProbeConfig};
use mcp_probe::logging;

/// Probe a stdio JSON-RPC (MCP) server: one fresh process per scenario.
#[derive(Debug, Parser)]
#[command(name = "mcp-probe", version, about)]
struct Cli {
    /// Config file (default: $MCP_PROBE_CONFIG, then mcp-probe.yaml upward from cwd).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Per-exchange timeout in milliseconds; 0 waits forever.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Run only the scenarios with these labels (repeatable).
    #[arg(short, long = "scenario")]
    scenarios: Vec<String>,

    /// Working directory for the server process.
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,

    /// Print reports as JSON.
    #[arg(long)]
    json: bool,

    /// Server command and arguments, overriding the config (after `--`).
    #[arg(last = true)]
    server: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    logging::init_tracing(cli.log_file.as_deref(), cli.verbose)?;

    let config = resolve_config(&cli)?;
    let harness = Harness::from_config(&config);

    tracing::info!(
        command = %harness.server().command,
        args = ?harness.server().args,
        scenarios = config.scenarios.len(),
        timeout_ms = config.timeout_ms,
        "probing server"
    );

    let reports = harness.run_all(&config.scenarios).await;

    if cli.json {
        println!("{}", report::render_json(&reports)?);
    } else {
        for r in &reports {
            println!("{}", r.render_text());
        }
        println!("{}", report::render_summary(&reports));
    }

    let all_passed = reports.iter().all(|r| r.passed());
    Ok(if all_passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Load the config file (if any) and apply command-line overrides.
fn resolve_config(cli: &Cli) -> anyhow::Result<ProbeConfig> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;

    let mut config = match config::find_config_path(cli.config.as_deref(), &cwd)? {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            config::load_config(&path)?
        }
        None => {
            tracing::info!("no config file found, using defaults");
            ProbeConfig::default()
        }
    };

    if let Some((command, args)) = cli.server.split_first() {
        config.server.command = command.clone();
        config.server.args = args.to_vec();
    }
    if let Some(dir) = &cli.cwd {
        config.server.cwd = Some(dir.clone());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }

    config.select_scenarios(&cli.scenarios)?;
    Ok(config)
}
