use serde_json::Value;
use tracing::info;

use crate::analytics::{collect_usage, EventSource, UsageGrid};
use crate::compose::{compose_report, ReportMessage};
use crate::config::AnalyticsConfig;
use crate::delivery::{ChatSink, StatsHandoff};
use crate::Result;

#[derive(Debug, Clone)]
pub struct NotifyOutcome {
    pub handoff: StatsHandoff,
    pub usage: UsageGrid,
    pub message: ReportMessage,
}

/// Decode the handed-off stats, query usage, compose and post the report.
/// Nothing is posted unless every analytics query succeeded.
pub async fn run_notify(
    payload: Value,
    source: &dyn EventSource,
    analytics: &AnalyticsConfig,
    chat: &dyn ChatSink,
) -> Result<NotifyOutcome> {
    let handoff = StatsHandoff::decode(payload)?;
    let report = handoff.report()?;
    info!(
        source = %handoff.source,
        report_date = %report.report_date,
        coupons = report.coupons.len(),
        "Stats received"
    );

    let usage = collect_usage(source, analytics).await?;
    let message = compose_report(&report, &usage);
    info!("Constructed report:\n{}", message.text());

    chat.post(&message.text()).await?;

    Ok(NotifyOutcome {
        handoff,
        usage,
        message,
    })
}
