// loadcheck CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: LOAD_* environment variables (and .env) are the base config, flags override them.
// Design Decision: Logs go to stderr so `--output json` stays machine-readable on stdout.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use loadcheck_harness::report::ReportConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::commands::Overrides;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "loadcheck")]
#[command(about = "loadcheck - Load test a search endpoint and gate on failure rate and P95 latency")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, short, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the load test, write report artifacts and check the SLA
    Run {
        #[command(flatten)]
        overrides: Overrides,

        /// Directory for report artifacts (overrides LOAD_REPORT_DIR)
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Do not write report artifacts
        #[arg(long)]
        no_report: bool,
    },

    /// Print the resolved configuration without sending any request
    Config {
        #[command(flatten)]
        overrides: Overrides,
    },
}

fn env_filter(quiet: bool) -> EnvFilter {
    let default_filter = if quiet {
        "warn"
    } else {
        "loadcheck=info,loadcheck_harness=info"
    };

    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into())
}

fn init_tracing(quiet: bool) {
    tracing_subscriber::registry()
        .with(env_filter(quiet))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env has to be in the process environment before clap and EnvFilter read it
    let dotenv_path = dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.quiet);

    if let Some(path) = dotenv_path {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    match cli.command {
        Commands::Run {
            overrides,
            report_dir,
            no_report,
        } => {
            let config = overrides.resolve()?;
            let report_config = (!no_report).then(|| {
                let mut report_config = ReportConfig::from_env();
                if let Some(dir) = report_dir {
                    report_config.output_dir = dir;
                }
                report_config
            });

            commands::run::run(config, report_config, cli.output, cli.quiet).await
        }
        Commands::Config { overrides } => {
            let config = overrides.resolve()?;
            commands::config::run(&config, cli.output)
        }
    }
}
