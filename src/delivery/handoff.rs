//! Extractor → notifier handoff.
//!
//! The message is a versioned envelope around the flat report mapping. The
//! receiving side also takes a bare mapping, or a JSON string holding either.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{http_client, post_json};
use crate::config::{HandoffConfig, Job};
use crate::report::{FlatReport, StatsReport};
use crate::{Error, Result};

pub const HANDOFF_SCHEMA_VERSION: u32 = 1;
/// `source` recorded for payloads that arrived without an envelope.
pub const UNVERSIONED_SOURCE: &str = "unversioned";

const INVOCATION_TYPE_HEADER: &str = "x-invocation-type";
const FUNCTION_NAME_HEADER: &str = "x-function-name";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsHandoff {
    pub schema_version: u32,
    pub source: String,
    pub sent_at: DateTime<Utc>,
    pub metrics: FlatReport,
}

impl StatsHandoff {
    pub fn new(report: &StatsReport) -> Result<Self> {
        Ok(Self {
            schema_version: HANDOFF_SCHEMA_VERSION,
            source: Job::Extract.name().to_string(),
            sent_at: Utc::now(),
            metrics: report.to_flat()?,
        })
    }

    /// Accept an envelope, a bare flat mapping, or a JSON string containing either.
    pub fn decode(value: Value) -> Result<Self> {
        match value {
            Value::String(text) => match serde_json::from_str::<Value>(&text)? {
                Value::String(_) => Err(Error::HandoffError(
                    "payload is a doubly encoded string".to_string(),
                )),
                inner => Self::decode(inner),
            },
            Value::Object(map) if map.contains_key("schema_version") => {
                let version = map.get("schema_version").and_then(Value::as_u64);
                if version != Some(u64::from(HANDOFF_SCHEMA_VERSION)) {
                    return Err(Error::HandoffError(format!(
                        "unsupported schema_version {}",
                        map.get("schema_version").cloned().unwrap_or(Value::Null)
                    )));
                }
                Ok(serde_json::from_value(Value::Object(map))?)
            }
            Value::Object(metrics) => Ok(Self {
                schema_version: HANDOFF_SCHEMA_VERSION,
                source: UNVERSIONED_SOURCE.to_string(),
                sent_at: Utc::now(),
                metrics,
            }),
            other => Err(Error::HandoffError(format!(
                "expected a JSON object, got {}",
                kind(&other)
            ))),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::decode(serde_json::from_str(text)?)
    }

    pub fn report(&self) -> Result<StatsReport> {
        StatsReport::from_flat(&self.metrics)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
pub trait Handoff: Send + Sync {
    /// Deliver without waiting for the receiver to finish its work.
    async fn send(&self, handoff: &StatsHandoff) -> Result<()>;
}

/// Asynchronous invocation over HTTP; only acceptance (2xx) is checked.
#[derive(Debug, Clone)]
pub struct HttpHandoff {
    http: Client,
    url: String,
    function_name: String,
}

impl HttpHandoff {
    pub fn new(url: &str, function_name: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout_secs)?,
            url: url.to_string(),
            function_name: function_name.to_string(),
        })
    }

    pub fn from_config(config: &HandoffConfig, timeout_secs: u64) -> Result<Self> {
        Self::new(&config.url, &config.function_name, timeout_secs)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(INVOCATION_TYPE_HEADER),
            HeaderValue::from_static("Event"),
        );
        let function = HeaderValue::from_str(&self.function_name)
            .map_err(|e| Error::InvalidArgument(format!("invalid function name: {}", e)))?;
        headers.insert(HeaderName::from_static(FUNCTION_NAME_HEADER), function);
        Ok(headers)
    }
}

#[async_trait]
impl Handoff for HttpHandoff {
    async fn send(&self, handoff: &StatsHandoff) -> Result<()> {
        post_json(&self.http, &self.url, self.headers()?, handoff, "handoff")
            .await
            .map_err(Error::HandoffError)?;
        info!(
            function = %self.function_name,
            keys = handoff.metrics.len(),
            "Stats handed off"
        );
        Ok(())
    }
}

/// Prints the message as pretty JSON instead of invoking the notifier.
#[derive(Debug, Clone, Default)]
pub struct StdoutHandoff;

#[async_trait]
impl Handoff for StdoutHandoff {
    async fn send(&self, handoff: &StatsHandoff) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(handoff)?);
        Ok(())
    }
}
