//! Scheduled notify job.
//!
//! Usage:
//!   cargo run --bin stats_notify -- --payload event.json
//!   cat event.json | cargo run --bin stats_notify -- --payload - --dry-run

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;

use daily_bot_stats::commands::{notify, NotifyOptions};
use daily_bot_stats::Config;

#[derive(Parser, Debug)]
#[command(name = "stats_notify")]
#[command(about = "Post the daily stats report to chat")]
struct Args {
    /// Path to config.yml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Payload file, or - for stdin
    #[arg(long, default_value = "-")]
    payload: String,

    /// Print the report instead of posting it
    #[arg(long)]
    dry_run: bool,

    /// Write the usage grids as CSV into this directory
    #[arg(long)]
    export_csv: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let options = NotifyOptions {
        payload: args.payload,
        dry_run: args.dry_run,
        export_csv: args.export_csv,
    };

    let outcome = notify::run(&config, &options).await?;
    if !options.dry_run {
        println!("✅ Report posted ({} lines)", outcome.message.lines.len());
    }
    Ok(())
}
