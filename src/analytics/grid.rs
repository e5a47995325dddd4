//! Segment×page and segment×feature-group usage grids.
//!
//! Every cell is queried one at a time, segments in the outer loop, so the
//! request order is deterministic.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use super::EventSource;
use crate::config::AnalyticsConfig;
use crate::Result;

pub const VIEWS_CSV: &str = "views.csv";
pub const CLICKS_CSV: &str = "clicks.csv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewCount {
    #[serde(rename = "Segment")]
    pub segment: String,
    #[serde(rename = "Page")]
    pub page: String,
    #[serde(rename = "Views")]
    pub views: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickCount {
    #[serde(rename = "Segment")]
    pub segment: String,
    #[serde(rename = "Feature Group")]
    pub feature_group: String,
    #[serde(rename = "Clicks")]
    pub clicks: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageGrid {
    pub views: Vec<ViewCount>,
    pub clicks: Vec<ClickCount>,
}

impl UsageGrid {
    pub fn total_views(&self) -> u64 {
        self.views.iter().map(|v| v.views).sum()
    }

    pub fn total_clicks(&self) -> u64 {
        self.clicks.iter().map(|c| c.clicks).sum()
    }

    /// Write `views.csv` and `clicks.csv` into `dir`, creating it if needed.
    pub fn write_csv(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;

        let views_path = dir.join(VIEWS_CSV);
        let mut writer = csv::Writer::from_path(&views_path)?;
        for row in &self.views {
            writer.serialize(row)?;
        }
        writer.flush()?;

        let clicks_path = dir.join(CLICKS_CSV);
        let mut writer = csv::Writer::from_path(&clicks_path)?;
        for row in &self.clicks {
            writer.serialize(row)?;
        }
        writer.flush()?;

        info!(dir = %dir.display(), "Usage grids exported");
        Ok((views_path, clicks_path))
    }
}

/// Query both grids. The first failing request aborts the whole collection.
pub async fn collect_usage<S: EventSource + ?Sized>(
    source: &S,
    config: &AnalyticsConfig,
) -> Result<UsageGrid> {
    let mut grid = UsageGrid::default();

    for segment in &config.segments {
        for page in &config.pages {
            let name = format!("{}-{}", segment.name, page.name);
            let views = source.page_views(&segment.id, &page.id, &name).await?;
            grid.views.push(ViewCount {
                segment: segment.name.clone(),
                page: page.name.clone(),
                views,
            });
        }
    }
    info!(cells = grid.views.len(), "Collected page views");

    for segment in &config.segments {
        for group in &config.feature_groups {
            let mut clicks = 0;
            for feature_id in &group.feature_ids {
                clicks += source.feature_clicks(&segment.id, feature_id).await?;
            }
            grid.clicks.push(ClickCount {
                segment: segment.name.clone(),
                feature_group: group.name.clone(),
                clicks,
            });
        }
    }
    info!(cells = grid.clicks.len(), "Collected feature clicks");

    Ok(grid)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{FeatureGroup, NamedId};
    use crate::Error;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every call and answers from a fixed rule.
    #[derive(Default)]
    pub(crate) struct RecordingSource {
        pub calls: Mutex<Vec<String>>,
        pub fail_on: Option<String>,
    }

    impl RecordingSource {
        fn record(&self, call: String) -> Result<()> {
            let failing = self.fail_on.as_deref() == Some(call.as_str());
            self.calls.lock().unwrap().push(call);
            if failing {
                return Err(Error::AnalyticsError("returned 500 Internal Server Error".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl EventSource for RecordingSource {
        async fn page_views(&self, segment_id: &str, page_id: &str, _name: &str) -> Result<u64> {
            self.record(format!("views:{}:{}", segment_id, page_id))?;
            Ok(page_id.len() as u64)
        }

        async fn feature_clicks(&self, segment_id: &str, feature_id: &str) -> Result<u64> {
            self.record(format!("clicks:{}:{}", segment_id, feature_id))?;
            Ok(1)
        }
    }

    pub(crate) fn analytics_config() -> AnalyticsConfig {
        AnalyticsConfig {
            api_url: "http://analytics.test/aggregation".into(),
            integration_key: "key".into(),
            start_date: chrono::NaiveDate::from_ymd_opt(2025, 2, 12),
            segments: vec![NamedId::new("Segment-A", "sa"), NamedId::new("Segment-B", "sb")],
            pages: vec![
                NamedId::new("Web", "web"),
                NamedId::new("iOS", "ios"),
                NamedId::new("Android", "android"),
            ],
            feature_groups: vec![
                FeatureGroup::new("Roleplay", &["r1"]),
                FeatureGroup::new("Automation", &["a1", "a2", "a3"]),
            ],
        }
    }

    #[tokio::test]
    async fn views_grid_is_segment_major() {
        let source = RecordingSource::default();
        let grid = collect_usage(&source, &analytics_config()).await.unwrap();

        let calls = source.calls.lock().unwrap();
        let views: Vec<&String> = calls.iter().filter(|c| c.starts_with("views:")).collect();
        assert_eq!(
            views,
            vec![
                "views:sa:web",
                "views:sa:ios",
                "views:sa:android",
                "views:sb:web",
                "views:sb:ios",
                "views:sb:android",
            ]
        );
        assert_eq!(grid.views.len(), 6);
        assert_eq!(grid.views[4].segment, "Segment-B");
        assert_eq!(grid.views[4].page, "iOS");
        assert_eq!(grid.views[4].views, 3);
    }

    #[tokio::test]
    async fn clicks_are_summed_per_feature_group() {
        let source = RecordingSource::default();
        let grid = collect_usage(&source, &analytics_config()).await.unwrap();

        let click_calls = source
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("clicks:"))
            .count();
        assert_eq!(click_calls, 2 * (1 + 3));

        let clicks: Vec<(&str, &str, u64)> = grid
            .clicks
            .iter()
            .map(|c| (c.segment.as_str(), c.feature_group.as_str(), c.clicks))
            .collect();
        assert_eq!(
            clicks,
            vec![
                ("Segment-A", "Roleplay", 1),
                ("Segment-A", "Automation", 3),
                ("Segment-B", "Roleplay", 1),
                ("Segment-B", "Automation", 3),
            ]
        );
    }

    #[tokio::test]
    async fn first_failure_aborts_collection() {
        let source = RecordingSource {
            fail_on: Some("views:sa:ios".into()),
            ..Default::default()
        };

        let err = collect_usage(&source, &analytics_config()).await.unwrap_err();

        assert!(matches!(err, Error::AnalyticsError(_)));
        assert_eq!(source.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn csv_export_writes_both_grids() {
        let grid = UsageGrid {
            views: vec![ViewCount {
                segment: "Segment-A".into(),
                page: "Web".into(),
                views: 10,
            }],
            clicks: vec![ClickCount {
                segment: "Segment-A".into(),
                feature_group: "Automation".into(),
                clicks: 7,
            }],
        };
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("grids");

        let (views, clicks) = grid.write_csv(&out).unwrap();

        let views = std::fs::read_to_string(views).unwrap();
        assert_eq!(views, "Segment,Page,Views\nSegment-A,Web,10\n");
        let clicks = std::fs::read_to_string(clicks).unwrap();
        assert_eq!(clicks, "Segment,Feature Group,Clicks\nSegment-A,Automation,7\n");
    }
}
