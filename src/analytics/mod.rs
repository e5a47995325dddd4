//! Product-analytics usage for the notifier.
//!
//! Provides:
//! - [`EventSource`], one aggregated count per (segment, page) or (segment, feature)
//! - [`PendoClient`], the HTTP implementation
//! - [`grid`], the segment×page and segment×feature-group grids

pub mod client;
pub mod grid;
pub mod models;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::Result;

pub use client::PendoClient;
pub use grid::{collect_usage, ClickCount, UsageGrid, ViewCount};

/// Inclusive query range in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsRange {
    pub first_ms: i64,
    pub last_ms: i64,
}

impl AnalyticsRange {
    /// From midnight UTC of `start` up to `now`.
    pub fn since(start: NaiveDate, now: DateTime<Utc>) -> Self {
        let first = start.and_time(chrono::NaiveTime::MIN).and_utc();
        Self {
            first_ms: first.timestamp_millis(),
            last_ms: now.timestamp_millis(),
        }
    }
}

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Page views for one segment; `name` labels the request.
    async fn page_views(&self, segment_id: &str, page_id: &str, name: &str) -> Result<u64>;

    /// Clicks on a single feature for one segment.
    async fn feature_clicks(&self, segment_id: &str, feature_id: &str) -> Result<u64>;
}
