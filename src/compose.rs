//! Plain-text chat report.
//!
//! Sections are appended in a fixed order and every absent figure prints as 0.

use crate::analytics::UsageGrid;
use crate::periods::Period;
use crate::report::StatsReport;

const BULLET: &str = "•  ";
const SUB_BULLET: &str = "   ○  ";

/// The report as individual lines; [`ReportMessage::text`] joins them with `\n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportMessage {
    pub lines: Vec<String>,
}

impl ReportMessage {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    fn heading(&mut self, text: &str) {
        self.lines.push(format!("{}{}", BULLET, text));
    }

    fn item(&mut self, label: &str, value: impl std::fmt::Display) {
        self.lines.push(format!("{}{}: {}", SUB_BULLET, label, value));
    }
}

fn or_zero(value: Option<i64>) -> i64 {
    value.unwrap_or(0)
}

pub fn compose_report(report: &StatsReport, usage: &UsageGrid) -> ReportMessage {
    let mut msg = ReportMessage::default();
    let snapshot = &report.snapshot;

    msg.lines.push(format!("Stats for {}", report.report_date));
    msg.heading(&format!("Lifetime user total: {}", or_zero(snapshot.total)));

    msg.heading("Active snapshot stats :");
    msg.item("Total Active Users", report.total_active_users());
    msg.item(
        "Total Active Trial Users without a coupon",
        report.trials_without_coupon(),
    );
    msg.item(
        "Total Active Trial Users with a coupon",
        report.trials_with_coupon(),
    );

    msg.heading("Subscriptions :");
    msg.item("Active", or_zero(snapshot.active_subscriptions));
    msg.item("Past due", or_zero(snapshot.past_due_subscriptions));
    msg.item("Yearly", or_zero(snapshot.yearly_subscriptions));
    msg.item("Cancelled", or_zero(snapshot.cancelled_subscriptions));
    msg.item("Cancelled after trial", or_zero(snapshot.cancel_after_trial));
    msg.item("Cancelled during trial", or_zero(snapshot.cancel_during_trial));

    msg.heading("Trials :");
    msg.item("Total trials", or_zero(snapshot.trials));
    msg.item("daily_bot2025 trials", or_zero(snapshot.daily_bot2025_trials));
    msg.item("revenue30 trials", or_zero(snapshot.revenue30_trials));

    msg.heading("Churn :");
    for (period, counts) in report.churn.iter() {
        msg.item(
            period.label(),
            format!(
                "Conversion {} | Canceled {} | None {} | New Signup {} | Past due {}",
                counts.conversion, counts.canceled, counts.none, counts.new_signup, counts.past_due
            ),
        );
    }

    msg.heading("New signups :");
    for period in Period::ALL {
        let split = report.signups.get(period);
        msg.item(
            period.label(),
            format!(
                "{} (without coupon {}, with coupon {})",
                split.total, split.without_coupon, split.with_coupon
            ),
        );
    }

    msg.heading("Downloads :");
    msg.item("iOS first-time downloads", or_zero(snapshot.ios_first_time_downloads));
    msg.item("iOS total downloads", or_zero(snapshot.ios_total_downloads));
    msg.item(
        "Google Play active installs",
        or_zero(snapshot.google_play_active_installs),
    );

    msg.heading("Coupon performance :");
    for (code, stats) in &report.coupons {
        msg.item(
            code,
            format!(
                "{} active, {} trials, {} conversions, {:.2} conversion rate",
                stats.active_subscriptions,
                stats.total_trials,
                stats.total_conversions,
                stats.conversion_rate.unwrap_or(0.0)
            ),
        );
    }

    msg.heading("Page views :");
    for cell in &usage.views {
        msg.item(&format!("{} / {}", cell.segment, cell.page), cell.views);
    }

    msg.heading("Feature clicks :");
    for cell in &usage.clicks {
        msg.item(&format!("{} / {}", cell.segment, cell.feature_group), cell.clicks);
    }

    msg
}
