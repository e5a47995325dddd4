//! `notify`: handed-off stats + analytics usage → chat report.

use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

use crate::analytics::PendoClient;
use crate::config::{Config, Job, Requirement};
use crate::delivery::{ChatSink, SlackWebhook, StdoutChat};
use crate::jobs::{guarded, run_notify, NotifyOutcome};
use crate::Result;

use super::alert_sink;

#[derive(Debug, Clone, Default)]
pub struct NotifyOptions {
    /// Payload file, or `-` for stdin.
    pub payload: String,
    /// Print the report instead of posting it.
    pub dry_run: bool,
    /// Also write the usage grids as CSV into this directory.
    pub export_csv: Option<PathBuf>,
}

impl NotifyOptions {
    pub fn requirements(&self) -> Vec<Requirement> {
        let mut requirements = vec![Requirement::Analytics];
        if !self.dry_run {
            requirements.push(Requirement::Chat);
        }
        requirements
    }
}

/// Read the raw event: `-` means stdin.
pub fn read_payload(source: &str) -> Result<Value> {
    let text = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(source)?
    };
    Ok(serde_json::from_str(&text)?)
}

/// Notify with an already decoded event.
pub async fn run_with_payload(
    config: &Config,
    options: &NotifyOptions,
    payload: Value,
) -> Result<NotifyOutcome> {
    run_guarded(config, options, move || Ok(payload)).await
}

/// Read the event named by `options.payload`, then notify. An unreadable
/// or malformed event is alerted like any other failure.
pub async fn run(config: &Config, options: &NotifyOptions) -> Result<NotifyOutcome> {
    run_guarded(config, options, || read_payload(&options.payload)).await
}

async fn run_guarded<F>(config: &Config, options: &NotifyOptions, load: F) -> Result<NotifyOutcome>
where
    F: FnOnce() -> Result<Value>,
{
    config.validate(&options.requirements())?;
    let alerts = alert_sink(config)?;

    guarded(Job::Notify, alerts.as_ref(), async {
        let payload = load()?;
        let source = PendoClient::from_config(&config.analytics, config.http_timeout_secs)?;
        let chat: Box<dyn ChatSink> = if options.dry_run {
            Box::new(StdoutChat)
        } else {
            Box::new(SlackWebhook::from_config(
                &config.chat,
                config.http_timeout_secs,
            )?)
        };

        let outcome = run_notify(payload, &source, &config.analytics, chat.as_ref()).await?;
        if let Some(dir) = &options.export_csv {
            let (views, clicks) = outcome.usage.write_csv(dir)?;
            info!(views = %views.display(), clicks = %clicks.display(), "CSV written");
        }
        Ok(outcome)
    })
    .await
}
