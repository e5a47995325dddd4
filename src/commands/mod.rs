//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI. The per-job binaries
//! call the same functions.

pub mod check_config;
pub mod extract;
pub mod notify;
pub mod pipeline;

use chrono::NaiveDate;

use crate::config::Config;
use crate::delivery::{AlertPublisher, AlertSink, LogAlerts};
use crate::periods::ReportWindows;
use crate::Result;

pub use extract::ExtractOptions;
pub use notify::NotifyOptions;

/// The configured alert channel, or a log-only sink when none is set.
pub fn alert_sink(config: &Config) -> Result<Box<dyn AlertSink>> {
    if config.alerts.url.trim().is_empty() {
        Ok(Box::new(LogAlerts))
    } else {
        Ok(Box::new(AlertPublisher::from_config(
            &config.alerts,
            config.http_timeout_secs,
        )?))
    }
}

/// Windows for an explicit `today`, or for the current date in the report timezone.
pub fn report_windows(config: &Config, today: Option<NaiveDate>) -> ReportWindows {
    match today {
        Some(today) => ReportWindows::new(today),
        None => ReportWindows::current(&config.timezone),
    }
}
