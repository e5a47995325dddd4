//! Chat delivery.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use super::{http_client, post_json};
use crate::config::ChatConfig;
use crate::{Error, Result};

#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn post(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

/// Incoming-webhook poster: `{"text": ...}`, any non-2xx is a failure.
#[derive(Debug, Clone)]
pub struct SlackWebhook {
    http: Client,
    webhook_url: String,
}

impl SlackWebhook {
    pub fn new(webhook_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout_secs)?,
            webhook_url: webhook_url.to_string(),
        })
    }

    pub fn from_config(config: &ChatConfig, timeout_secs: u64) -> Result<Self> {
        Self::new(&config.webhook_url, timeout_secs)
    }
}

#[async_trait]
impl ChatSink for SlackWebhook {
    async fn post(&self, text: &str) -> Result<()> {
        post_json(
            &self.http,
            &self.webhook_url,
            HeaderMap::new(),
            &WebhookMessage { text },
            "chat",
        )
        .await
        .map_err(Error::ChatError)?;
        info!(chars = text.len(), "Report posted to chat");
        Ok(())
    }
}

/// Prints the message instead of posting it (dry runs).
#[derive(Debug, Clone, Default)]
pub struct StdoutChat;

#[async_trait]
impl ChatSink for StdoutChat {
    async fn post(&self, text: &str) -> Result<()> {
        println!("{}", text);
        Ok(())
    }
}
