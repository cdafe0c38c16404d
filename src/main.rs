//! Composition harness
//!
//! Boots a dynamically composed server and verifies it.
//!
//! # Architecture Overview
//!
//! ```text
//!   HarnessConfig ──▶ deployment ──▶ [DeployOption] ──▶ container ──▶ RunningContainer
//!                     (builder,                        (catalog,          │
//!                      presets)                         registry,         │
//!                                                       loader scopes,    │
//!                                                       http engine)      │
//!                                                                         ▼
//!                     VerificationReport ◀── verify ◀─────────────────────┘
//!                     (exit code)            (lifecycle, negotiation probe)
//! ```
//!
//! # Exit codes
//! - `0`: every check passed
//! - `1`: at least one check failed
//! - `2`: configuration or boot error

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use composition_harness::config::loader::load_config;
use composition_harness::config::validation::validate_config;
use composition_harness::observability::init_logging;
use composition_harness::{Checks, Harness, HarnessConfig};

const EXIT_ERROR: u8 = 2;

/// How long exit waits for blocking work a timed-out boot left behind.
const BLOCKING_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "composition-harness")]
#[command(about = "Boot a composed modular server and verify it", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Raise container and harness log levels
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, boot and run every check
    Run,
    /// Print the deployment option list as JSON without booting
    Plan,
    /// Boot and check module lifecycle states only
    CheckModules,
    /// Boot and run the boot isolation and live negotiation checks only
    CheckNegotiation,
}

fn load(cli: &Cli) -> Result<HarnessConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = HarnessConfig::default();
            validate_config(&config).map_err(composition_harness::config::loader::ConfigError::Validation)?;
            config
        }
    };
    if cli.verbose {
        config.observability.verbose = true;
    }
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let code = runtime.block_on(run(cli));
    runtime.shutdown_timeout(BLOCKING_GRACE);
    code
}

async fn run(cli: Cli) -> ExitCode {
    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.verbose);
            tracing::error!(error = %e, "Configuration rejected");
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    init_logging(config.observability.verbose);

    tracing::info!(
        protocol_port = config.protocol.port,
        expected_protocol = %config.protocol.expected_protocol,
        "composition-harness v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let harness = Harness::new(config);
    let checks = match cli.command {
        Commands::Plan => {
            return match harness.plan() {
                Ok(spec) => match serde_json::to_string_pretty(&spec) {
                    Ok(json) => {
                        println!("{}", json);
                        ExitCode::SUCCESS
                    }
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        ExitCode::from(EXIT_ERROR)
                    }
                },
                Err(e) => {
                    eprintln!("Error: {}", e);
                    ExitCode::from(EXIT_ERROR)
                }
            };
        }
        Commands::Run => Checks::All,
        Commands::CheckModules => Checks::Modules,
        Commands::CheckNegotiation => Checks::Negotiation,
    };

    match harness.run(checks).await {
        Ok(report) => {
            println!("{}", report);
            ExitCode::from(report.exit_code())
        }
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
