//! Daily Bot Stats CLI - main entry point
//!
//! Runs either job on demand, both in sequence, or checks the configuration.

use anyhow::bail;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use daily_bot_stats::commands::{self, ExtractOptions, NotifyOptions};
use daily_bot_stats::{metrics, Config, Job};

#[derive(Parser)]
#[command(name = "daily_bot_stats")]
#[command(about = "Daily subscription stats extract and chat report", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.yml (defaults to ./config.yml, then ../config.yml, then environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the warehouse and hand the stats to the notifier
    Extract {
        /// Read warehouse tables from a YAML/JSON fixture instead of connecting
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Run as if today were this date (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Print the handoff message instead of sending it
        #[arg(long, default_value_t = false)]
        print: bool,
    },

    /// Compose and post the report from a handed-off payload
    Notify {
        /// Payload file, or - for stdin
        #[arg(long)]
        payload: String,

        /// Print the report instead of posting it
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Write the usage grids as CSV into this directory
        #[arg(long)]
        export_csv: Option<PathBuf>,
    },

    /// Extract, then notify in the same process
    Run {
        #[arg(long)]
        fixture: Option<PathBuf>,

        #[arg(long)]
        today: Option<NaiveDate>,

        #[arg(long, default_value_t = false)]
        dry_run: bool,

        #[arg(long)]
        export_csv: Option<PathBuf>,
    },

    /// Report missing configuration values
    CheckConfig {
        /// Only check one job
        #[arg(long, value_enum)]
        job: Option<JobArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum JobArg {
    Extract,
    Notify,
}

impl From<JobArg> for Job {
    fn from(arg: JobArg) -> Self {
        match arg {
            JobArg::Extract => Job::Extract,
            JobArg::Notify => Job::Notify,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("daily_bot_stats=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let config = Config::load(cli.config.as_deref())?;
    execute_command(cli.command, &config).await
}

async fn execute_command(command: Commands, config: &Config) -> anyhow::Result<()> {
    match command {
        Commands::Extract {
            fixture,
            today,
            print,
        } => {
            let options = ExtractOptions {
                fixture,
                today,
                print,
            };
            commands::extract::run(config, &options).await?;
        }
        Commands::Notify {
            payload,
            dry_run,
            export_csv,
        } => {
            let options = NotifyOptions {
                payload,
                dry_run,
                export_csv,
            };
            commands::notify::run(config, &options).await?;
        }
        Commands::Run {
            fixture,
            today,
            dry_run,
            export_csv,
        } => {
            let extract = ExtractOptions {
                fixture,
                today,
                print: false,
            };
            let notify = NotifyOptions {
                payload: String::new(),
                dry_run,
                export_csv,
            };
            commands::pipeline::run(config, &extract, &notify).await?;
        }
        Commands::CheckConfig { job } => {
            let jobs = match job {
                Some(job) => vec![Job::from(job)],
                None => vec![Job::Extract, Job::Notify],
            };
            let problems = commands::check_config::run(config, &jobs);
            if problems.is_empty() {
                println!("✅ Configuration complete");
                return Ok(());
            }
            for (job, missing) in &problems {
                println!("❌ {} is missing:", job.name());
                for name in missing {
                    println!("   - {}", name);
                }
            }
            bail!("configuration incomplete");
        }
    }

    Ok(())
}
