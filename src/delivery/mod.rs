//! Outbound channels: chat webhook, failure alerts and the job handoff.

pub mod alerts;
pub mod chat;
pub mod handoff;

use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::metrics::record_external_call;
use crate::{Error, Result};

pub use alerts::{AlertMessage, AlertPublisher, AlertSink, LogAlerts};
pub use chat::{ChatSink, SlackWebhook, StdoutChat};
pub use handoff::{Handoff, HttpHandoff, StatsHandoff, StdoutHandoff, HANDOFF_SCHEMA_VERSION};

pub(crate) fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent("daily_bot_stats/0.1.0")
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))
}

/// POST a JSON body and require a 2xx answer. Failures come back as text for
/// the caller to wrap in its own error variant.
pub(crate) async fn post_json<T: Serialize + ?Sized>(
    http: &Client,
    url: &str,
    headers: HeaderMap,
    body: &T,
    target: &'static str,
) -> std::result::Result<(), String> {
    let response = match http.post(url).headers(headers).json(body).send().await {
        Ok(response) => response,
        Err(e) => {
            record_external_call(target, false);
            return Err(e.to_string());
        }
    };

    let status = response.status();
    if status.is_success() {
        record_external_call(target, true);
        Ok(())
    } else {
        record_external_call(target, false);
        let body = response.text().await.unwrap_or_default();
        Err(format!("{} {}", status, body.trim()))
    }
}
