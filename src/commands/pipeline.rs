//! `run`: both jobs in one process, the handoff passed in memory.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{Config, Job, Requirement};
use crate::delivery::{Handoff, StatsHandoff};
use crate::jobs::{guarded, run_extract, NotifyOutcome};
use crate::Result;

use super::extract::open_warehouse;
use super::{alert_sink, notify, report_windows, ExtractOptions, NotifyOptions};

/// The notify step runs right after extract returns, so nothing is sent.
struct InProcessHandoff;

#[async_trait]
impl Handoff for InProcessHandoff {
    async fn send(&self, handoff: &StatsHandoff) -> Result<()> {
        debug!(keys = handoff.metrics.len(), "Handoff kept in process");
        Ok(())
    }
}

pub async fn run(
    config: &Config,
    extract: &ExtractOptions,
    notify_options: &NotifyOptions,
) -> Result<NotifyOutcome> {
    let mut requirements = extract.requirements();
    requirements.retain(|r| *r != Requirement::Handoff);
    config.validate(&requirements)?;

    let alerts = alert_sink(config)?;
    let windows = report_windows(config, extract.today);

    let message = guarded(Job::Extract, alerts.as_ref(), async {
        let mut warehouse = open_warehouse(config, extract).await?;
        run_extract(warehouse.as_mut(), &windows, &InProcessHandoff).await
    })
    .await?;
    info!(keys = message.metrics.len(), "Extract finished, notifying in-process");

    let payload = serde_json::to_value(&message)?;
    notify::run_with_payload(config, notify_options, payload).await
}
