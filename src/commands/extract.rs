//! `extract`: warehouse → flat report → notifier.

use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::info;

use crate::config::{Config, Job, Requirement};
use crate::delivery::{Handoff, HttpHandoff, StatsHandoff, StdoutHandoff};
use crate::jobs::{guarded, run_extract};
use crate::warehouse::{MemoryWarehouse, PgWarehouse, Warehouse};
use crate::Result;

use super::{alert_sink, report_windows};

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Read warehouse tables from this YAML/JSON file instead of connecting.
    pub fixture: Option<PathBuf>,
    /// Override the run date.
    pub today: Option<NaiveDate>,
    /// Print the handoff message instead of invoking the notifier.
    pub print: bool,
}

impl ExtractOptions {
    pub fn requirements(&self) -> Vec<Requirement> {
        let mut requirements = Vec::new();
        if self.fixture.is_none() {
            requirements.push(Requirement::Warehouse);
        }
        if !self.print {
            requirements.push(Requirement::Handoff);
        }
        requirements
    }
}

pub(crate) async fn open_warehouse(
    config: &Config,
    options: &ExtractOptions,
) -> Result<Box<dyn Warehouse>> {
    match &options.fixture {
        Some(path) => {
            info!(fixture = %path.display(), "Using fixture warehouse");
            Ok(Box::new(MemoryWarehouse::from_file(path)?))
        }
        None => Ok(Box::new(PgWarehouse::connect(&config.warehouse).await?)),
    }
}

pub async fn run(config: &Config, options: &ExtractOptions) -> Result<StatsHandoff> {
    config.validate(&options.requirements())?;
    let alerts = alert_sink(config)?;
    let windows = report_windows(config, options.today);
    info!(today = %windows.today, tz = %config.timezone, "Starting extract");

    guarded(Job::Extract, alerts.as_ref(), async {
        let handoff: Box<dyn Handoff> = if options.print {
            Box::new(StdoutHandoff)
        } else {
            Box::new(HttpHandoff::from_config(
                &config.handoff,
                config.http_timeout_secs,
            )?)
        };
        let mut warehouse = open_warehouse(config, options).await?;
        run_extract(warehouse.as_mut(), &windows, handoff.as_ref()).await
    })
    .await
}
