//! Failure alerts: `{topic, subject, message}` posted to the alert channel.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{http_client, post_json};
use crate::config::AlertConfig;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub topic: String,
    pub subject: String,
    pub message: String,
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn publish(&self, subject: &str, message: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct AlertPublisher {
    http: Client,
    url: String,
    topic: String,
}

impl AlertPublisher {
    pub fn new(url: &str, topic: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout_secs)?,
            url: url.to_string(),
            topic: topic.to_string(),
        })
    }

    pub fn from_config(config: &AlertConfig, timeout_secs: u64) -> Result<Self> {
        Self::new(&config.url, &config.topic, timeout_secs)
    }
}

#[async_trait]
impl AlertSink for AlertPublisher {
    async fn publish(&self, subject: &str, message: &str) -> Result<()> {
        let alert = AlertMessage {
            topic: self.topic.clone(),
            subject: subject.to_string(),
            message: message.to_string(),
        };
        post_json(&self.http, &self.url, HeaderMap::new(), &alert, "alerts")
            .await
            .map_err(Error::AlertError)?;
        info!(subject, "Alert published");
        Ok(())
    }
}

/// Used when no alert channel is configured (local and dry runs).
#[derive(Debug, Clone, Default)]
pub struct LogAlerts;

#[async_trait]
impl AlertSink for LogAlerts {
    async fn publish(&self, subject: &str, message: &str) -> Result<()> {
        warn!(subject, message, "No alert channel configured");
        Ok(())
    }
}
