//! HTTP client for the Pendo aggregation endpoint.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};

use super::models::{AggregationRequest, AggregationResponse, Events};
use super::{AnalyticsRange, EventSource};
use crate::config::AnalyticsConfig;
use crate::metrics::record_external_call;
use crate::{Error, Result};

const INTEGRATION_KEY_HEADER: &str = "x-pendo-integration-key";
/// Response bodies are truncated to this many bytes in error messages.
const ERROR_BODY_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct PendoClient {
    http: Client,
    api_url: String,
    integration_key: String,
    range: AnalyticsRange,
}

impl PendoClient {
    pub fn new<S: Into<String>>(
        api_url: S,
        integration_key: S,
        range: AnalyticsRange,
        timeout_secs: u64,
    ) -> Result<Self> {
        let integration_key = integration_key.into();
        if integration_key.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "analytics integration key is empty".to_string(),
            ));
        }

        let http = Client::builder()
            .user_agent("daily_bot_stats/0.1.0")
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            integration_key,
            range,
        })
    }

    /// Client for the configured endpoint, counting from `start_date` up to now.
    pub fn from_config(config: &AnalyticsConfig, timeout_secs: u64) -> Result<Self> {
        let start = config.start_date.ok_or_else(|| {
            Error::ConfigError("missing required values: analytics.start_date".to_string())
        })?;
        let range = AnalyticsRange::since(start, chrono::Utc::now());
        Self::new(
            config.api_url.clone(),
            config.integration_key.clone(),
            range,
            timeout_secs,
        )
    }

    /// Point the client at another endpoint (tests, proxies).
    pub fn with_base_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    pub fn range(&self) -> &AnalyticsRange {
        &self.range
    }

    async fn aggregate(&self, request: &AggregationRequest, field: &str) -> Result<u64> {
        let response = self
            .http
            .post(&self.api_url)
            .header(INTEGRATION_KEY_HEADER, &self.integration_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                record_external_call("analytics", false);
                Error::AnalyticsError(format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            record_external_call("analytics", false);
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            error!(status = %status, request = %request.request.request_id, "Analytics API returned error");
            return Err(Error::AnalyticsError(format!(
                "{} returned {}: {}",
                request.request.request_id, status, body
            )));
        }

        let parsed: AggregationResponse = response
            .json()
            .await
            .map_err(|e| Error::AnalyticsError(format!("invalid response body: {}", e)))?;
        record_external_call("analytics", true);

        let count = parsed.count(field);
        debug!(request = %request.request.request_id, field, count, "Aggregation result");
        Ok(count)
    }
}

#[async_trait]
impl EventSource for PendoClient {
    async fn page_views(&self, segment_id: &str, page_id: &str, name: &str) -> Result<u64> {
        let request = AggregationRequest::event_sum(
            name,
            Events::PageEvents {
                page_id: page_id.to_string(),
            },
            segment_id,
            "views",
            &self.range,
        );
        self.aggregate(&request, "views").await
    }

    async fn feature_clicks(&self, segment_id: &str, feature_id: &str) -> Result<u64> {
        let request = AggregationRequest::event_sum(
            "oneFeature",
            Events::FeatureEvents {
                feature_id: feature_id.to_string(),
            },
            segment_id,
            "clicks",
            &self.range,
        );
        self.aggregate(&request, "clicks").await
    }
}
