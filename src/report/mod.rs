//! Typed stats report produced by the extractor.
//!
//! Coupons are kept as an explicit map from code to a fixed record. The
//! flat key/value form only exists at the transport boundary, see
//! [`flatten`].

pub mod flatten;
pub mod numeric;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::periods::Period;

pub use flatten::FlatReport;
pub use numeric::Numeric;

/// Coupon value that means "signed up without a coupon".
pub const NO_COUPON_CODE: &str = "No Coupon Code";

/// True for a missing coupon or the exact no-coupon sentinel, as the signup
/// query classifies rows.
pub fn is_signup_without_coupon(code: Option<&str>) -> bool {
    code.map_or(true, |code| code == NO_COUPON_CODE)
}

/// Report-side check: the no-coupon sentinel in any letter case.
pub fn is_no_coupon(code: Option<&str>) -> bool {
    match code {
        None => true,
        Some(code) => code.eq_ignore_ascii_case(NO_COUPON_CODE),
    }
}

/// The single row of the daily snapshot table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub struct DailySnapshot {
    pub total: Option<i64>,
    pub trials: Option<i64>,
    pub daily_bot2025_trials: Option<i64>,
    pub revenue30_trials: Option<i64>,
    pub active_subscriptions: Option<i64>,
    pub past_due_subscriptions: Option<i64>,
    pub yearly_subscriptions: Option<i64>,
    pub cancelled_subscriptions: Option<i64>,
    pub cancel_after_trial: Option<i64>,
    pub cancel_during_trial: Option<i64>,
    pub ios_first_time_downloads: Option<i64>,
    pub ios_total_downloads: Option<i64>,
    pub google_play_active_installs: Option<i64>,
}

impl DailySnapshot {
    pub const KEYS: [&'static str; 13] = [
        "total",
        "trials",
        "daily_bot2025_trials",
        "revenue30_trials",
        "active_subscriptions",
        "past_due_subscriptions",
        "yearly_subscriptions",
        "cancelled_subscriptions",
        "cancel_after_trial",
        "cancel_during_trial",
        "ios_first_time_downloads",
        "ios_total_downloads",
        "google_play_active_installs",
    ];
}

/// Distinct-email churn counts for one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnCounts {
    pub conversion: i64,
    pub canceled: i64,
    pub none: i64,
    pub new_signup: i64,
    pub past_due: i64,
}

impl ChurnCounts {
    /// Metric names in key order, e.g. `churn_{name}_{suffix}`.
    pub const METRICS: [&'static str; 5] =
        ["conversion", "canceled", "none", "new_signup", "past_due"];

    pub fn values(&self) -> [i64; 5] {
        [
            self.conversion,
            self.canceled,
            self.none,
            self.new_signup,
            self.past_due,
        ]
    }

    pub fn from_values(values: [i64; 5]) -> Self {
        let [conversion, canceled, none, new_signup, past_due] = values;
        Self {
            conversion,
            canceled,
            none,
            new_signup,
            past_due,
        }
    }
}

/// Signup counts for one period, split by coupon usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupSplit {
    pub without_coupon: i64,
    pub with_coupon: i64,
    pub total: i64,
}

impl SignupSplit {
    pub const METRICS: [&'static str; 3] = [
        "new_signups_without_coupon",
        "new_signups_with_coupon",
        "total_new_signups",
    ];

    pub fn values(&self) -> [i64; 3] {
        [self.without_coupon, self.with_coupon, self.total]
    }

    pub fn from_values(values: [i64; 3]) -> Self {
        let [without_coupon, with_coupon, total] = values;
        Self {
            without_coupon,
            with_coupon,
            total,
        }
    }
}

/// One value per reporting period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerPeriod<T> {
    pub all_time: T,
    pub last_week: T,
    pub last_month: T,
}

impl<T> PerPeriod<T> {
    pub fn get(&self, period: Period) -> &T {
        match period {
            Period::AllTime => &self.all_time,
            Period::LastWeek => &self.last_week,
            Period::LastMonth => &self.last_month,
        }
    }

    pub fn get_mut(&mut self, period: Period) -> &mut T {
        match period {
            Period::AllTime => &mut self.all_time,
            Period::LastWeek => &mut self.last_week,
            Period::LastMonth => &mut self.last_month,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Period, &T)> {
        Period::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

pub type ChurnSummary = PerPeriod<ChurnCounts>;
pub type SignupSummary = PerPeriod<SignupSplit>;

/// One row of the coupon-performance query.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponRow {
    pub coupon_code: String,
    pub coupon_active_subscriptions: i64,
    pub total_trials: i64,
    pub total_conversions: i64,
    pub percent_converted: Numeric,
}

/// Per-coupon performance with the conversion rate already a plain float.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CouponStats {
    pub active_subscriptions: i64,
    pub total_trials: i64,
    pub total_conversions: i64,
    pub conversion_rate: Option<f64>,
}

impl From<&CouponRow> for CouponStats {
    fn from(row: &CouponRow) -> Self {
        Self {
            active_subscriptions: row.coupon_active_subscriptions,
            total_trials: row.total_trials,
            total_conversions: row.total_conversions,
            conversion_rate: row.percent_converted.to_f64(),
        }
    }
}

/// Group coupon rows by code. A repeated code keeps the last row.
pub fn coupons_from_rows(rows: &[CouponRow]) -> BTreeMap<String, CouponStats> {
    rows.iter()
        .map(|row| (row.coupon_code.clone(), CouponStats::from(row)))
        .collect()
}

/// Everything the extractor learns in one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsReport {
    pub report_date: String,
    pub snapshot: DailySnapshot,
    pub churn: ChurnSummary,
    pub coupons: BTreeMap<String, CouponStats>,
    pub signups: SignupSummary,
}

impl StatsReport {
    /// Active subscriptions summed over every coupon, including the no-coupon bucket.
    pub fn total_active_users(&self) -> i64 {
        self.coupons.values().map(|c| c.active_subscriptions).sum()
    }

    /// Trials recorded under the no-coupon bucket.
    pub fn trials_without_coupon(&self) -> i64 {
        self.coupons
            .iter()
            .filter(|(code, _)| is_no_coupon(Some(code)))
            .map(|(_, c)| c.total_trials)
            .sum()
    }

    /// Trials recorded under a real coupon.
    pub fn trials_with_coupon(&self) -> i64 {
        self.coupons
            .iter()
            .filter(|(code, _)| !is_no_coupon(Some(code)))
            .map(|(_, c)| c.total_trials)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coupon(active: i64, trials: i64) -> CouponStats {
        CouponStats {
            active_subscriptions: active,
            total_trials: trials,
            total_conversions: 0,
            conversion_rate: None,
        }
    }

    #[test]
    fn no_coupon_classification() {
        assert!(is_no_coupon(None));
        assert!(is_no_coupon(Some("No Coupon Code")));
        assert!(is_no_coupon(Some("no coupon code")));
        assert!(!is_no_coupon(Some("SAVE10")));
        assert!(!is_no_coupon(Some("")));

        assert!(is_signup_without_coupon(None));
        assert!(is_signup_without_coupon(Some("No Coupon Code")));
        assert!(!is_signup_without_coupon(Some("no coupon code")));
        assert!(!is_signup_without_coupon(Some("SAVE10")));
    }

    #[test]
    fn derived_totals_split_by_coupon() {
        let mut report = StatsReport::default();
        report.coupons.insert("SAVE10".into(), coupon(5, 20));
        report.coupons.insert("SPRING".into(), coupon(3, 7));
        report.coupons.insert("No Coupon Code".into(), coupon(50, 100));

        assert_eq!(report.total_active_users(), 58);
        assert_eq!(report.trials_without_coupon(), 100);
        assert_eq!(report.trials_with_coupon(), 27);
    }

    #[test]
    fn derived_totals_default_to_zero() {
        let report = StatsReport::default();
        assert_eq!(report.total_active_users(), 0);
        assert_eq!(report.trials_without_coupon(), 0);
        assert_eq!(report.trials_with_coupon(), 0);
    }

    #[test]
    fn per_period_iterates_in_fixed_order() {
        let summary = SignupSummary {
            all_time: SignupSplit::from_values([1, 2, 3]),
            last_week: SignupSplit::from_values([4, 5, 9]),
            last_month: SignupSplit::from_values([6, 7, 13]),
        };
        let periods: Vec<Period> = summary.iter().map(|(p, _)| p).collect();
        assert_eq!(periods, Period::ALL.to_vec());
        assert_eq!(summary.get(Period::LastWeek).total, 9);
    }

    #[test]
    fn coupon_rows_normalize_rate() {
        let rows = vec![CouponRow {
            coupon_code: "SAVE10".into(),
            coupon_active_subscriptions: 5,
            total_trials: 20,
            total_conversions: 8,
            percent_converted: Numeric::Text("0.40".into()),
        }];
        let coupons = coupons_from_rows(&rows);
        assert_eq!(coupons["SAVE10"].conversion_rate, Some(0.40));
    }
}
