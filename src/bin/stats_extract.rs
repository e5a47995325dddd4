//! Scheduled extract job.
//!
//! Usage:
//!   cargo run --bin stats_extract                       # warehouse → notifier
//!   cargo run --bin stats_extract -- --fixture f.yml --print

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;

use daily_bot_stats::commands::{extract, ExtractOptions};
use daily_bot_stats::Config;

#[derive(Parser, Debug)]
#[command(name = "stats_extract")]
#[command(about = "Extract daily subscription stats and hand them to the notifier")]
struct Args {
    /// Path to config.yml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read warehouse tables from a YAML/JSON fixture
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Run as if today were this date (YYYY-MM-DD)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Print the handoff message instead of sending it
    #[arg(long)]
    print: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let options = ExtractOptions {
        fixture: args.fixture,
        today: args.today,
        print: args.print,
    };

    extract::run(&config, &options).await?;
    Ok(())
}
