//! Daily Bot Subscription Stats Pipeline Library
//!
//! This library provides the two scheduled reporting jobs:
//! - Extract: query the warehouse for the daily snapshot, churn, coupon
//!   performance and signups, flatten them and hand them to the notifier
//! - Notify: combine the handed-off stats with product-analytics usage and
//!   post a text report to chat
//! - Failure alerts and Prometheus metrics for both

pub mod analytics;
pub mod compose;
pub mod config;
pub mod delivery;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod periods;
pub mod report;
pub mod warehouse;

// Re-export common types
pub use config::{Config, Job};
pub use error::{Error, Result};
pub use periods::{Period, ReportWindows};
pub use report::{FlatReport, StatsReport};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
