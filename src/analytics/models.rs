//! Wire types of the analytics aggregation API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::AnalyticsRange;

/// Summed event field for the group stage.
pub const NUM_EVENTS: &str = "numEvents";

#[derive(Debug, Clone, Serialize)]
pub struct AggregationRequest {
    pub response: ResponseFormat,
    pub request: Aggregation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFormat {
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub name: String,
    pub pipeline: Vec<PipelineStep>,
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStep {
    Source(Source),
    Segment(SegmentFilter),
    Group(Group),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(flatten)]
    pub events: Events,
    pub time_series: TimeSeries,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Events {
    #[serde(rename_all = "camelCase")]
    PageEvents { page_id: String },
    #[serde(rename_all = "camelCase")]
    FeatureEvents { feature_id: String },
}

/// Epoch milliseconds are sent as strings.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSeries {
    pub period: String,
    pub first: String,
    pub last: String,
}

impl From<&AnalyticsRange> for TimeSeries {
    fn from(range: &AnalyticsRange) -> Self {
        Self {
            period: "dayRange".to_string(),
            first: range.first_ms.to_string(),
            last: range.last_ms.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentFilter {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub fields: BTreeMap<String, Sum>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sum {
    pub sum: String,
}

impl AggregationRequest {
    /// Sum of `numEvents` for one event source within one segment, reported as `field`.
    pub fn event_sum(
        name: &str,
        events: Events,
        segment_id: &str,
        field: &str,
        range: &AnalyticsRange,
    ) -> Self {
        let fields = BTreeMap::from([(
            field.to_string(),
            Sum {
                sum: NUM_EVENTS.to_string(),
            },
        )]);

        Self {
            response: ResponseFormat {
                mime_type: "application/json".to_string(),
            },
            request: Aggregation {
                name: name.to_string(),
                pipeline: vec![
                    PipelineStep::Source(Source {
                        events,
                        time_series: TimeSeries::from(range),
                    }),
                    PipelineStep::Segment(SegmentFilter {
                        id: segment_id.to_string(),
                    }),
                    PipelineStep::Group(Group { fields }),
                ],
                request_id: name.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AggregationResponse {
    #[serde(default)]
    pub results: Vec<Map<String, Value>>,
}

impl AggregationResponse {
    /// Value of `field` in the first result row; no rows or no field reads as 0.
    pub fn count(&self, field: &str) -> u64 {
        self.results
            .first()
            .and_then(|row| row.get(field))
            .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
            .unwrap_or(0)
    }
}
