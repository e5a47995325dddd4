//! Flat key/value form of a [`StatsReport`], used on the wire between jobs.
//!
//! Keys are `report_date`, the snapshot columns, `churn_{metric}_{all|week|month}`,
//! `{all|last_week|last_month}_{signup metric}` and four keys per coupon code.

use serde_json::{Map, Value};
use tracing::warn;

use super::{
    ChurnCounts, CouponStats, DailySnapshot, SignupSplit, StatsReport,
};
use crate::periods::Period;
use crate::Result;

pub type FlatReport = Map<String, Value>;

pub const REPORT_DATE_KEY: &str = "report_date";
pub const COUPON_ACTIVE_SUFFIX: &str = "_coupon_active_subscriptions";
pub const COUPON_TRIALS_SUFFIX: &str = "_total_trials";
pub const COUPON_CONVERSIONS_SUFFIX: &str = "_total_conversions";
pub const COUPON_RATE_SUFFIX: &str = "_conversion_rate";

pub fn churn_key(metric: &str, period: Period) -> String {
    format!("churn_{}_{}", metric, period.churn_suffix())
}

pub fn signup_key(metric: &str, period: Period) -> String {
    format!("{}_{}", period.signup_tag(), metric)
}

/// The four keys emitted for one coupon code, in a fixed order.
pub fn coupon_keys(code: &str) -> [String; 4] {
    [
        format!("{}{}", code, COUPON_ACTIVE_SUFFIX),
        format!("{}{}", code, COUPON_TRIALS_SUFFIX),
        format!("{}{}", code, COUPON_CONVERSIONS_SUFFIX),
        format!("{}{}", code, COUPON_RATE_SUFFIX),
    ]
}

fn float_value(value: Option<f64>) -> Value {
    value
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Integer view of a JSON value; integral floats are accepted, anything else is absent.
fn int_value(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
}

fn int_or_zero(map: &FlatReport, key: &str) -> i64 {
    int_value(map.get(key)).unwrap_or(0)
}

impl StatsReport {
    /// Flatten into the transport mapping.
    pub fn to_flat(&self) -> Result<FlatReport> {
        let mut flat = FlatReport::new();
        flat.insert(
            REPORT_DATE_KEY.to_string(),
            Value::String(self.report_date.clone()),
        );

        if let Value::Object(snapshot) = serde_json::to_value(&self.snapshot)? {
            flat.extend(snapshot);
        }

        for (period, counts) in self.churn.iter() {
            for (metric, value) in ChurnCounts::METRICS.iter().zip(counts.values()) {
                flat.insert(churn_key(metric, period), Value::from(value));
            }
        }

        for (period, split) in self.signups.iter() {
            for (metric, value) in SignupSplit::METRICS.iter().zip(split.values()) {
                flat.insert(signup_key(metric, period), Value::from(value));
            }
        }

        for (code, stats) in &self.coupons {
            let keys = coupon_keys(code);
            let values = [
                Value::from(stats.active_subscriptions),
                Value::from(stats.total_trials),
                Value::from(stats.total_conversions),
                float_value(stats.conversion_rate),
            ];
            for (key, value) in keys.into_iter().zip(values) {
                if flat.contains_key(&key) {
                    warn!(coupon = %code, key = %key, "Coupon key collides with an existing metric");
                }
                flat.insert(key, value);
            }
        }

        Ok(flat)
    }

    /// Rebuild a typed report from the transport mapping. Missing keys read as 0.
    pub fn from_flat(flat: &FlatReport) -> Result<Self> {
        let report_date = flat
            .get(REPORT_DATE_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let snapshot_fields: Map<String, Value> = DailySnapshot::KEYS
            .iter()
            .map(|key| {
                let value = int_value(flat.get(*key))
                    .map(Value::from)
                    .unwrap_or(Value::Null);
                (key.to_string(), value)
            })
            .collect();
        let snapshot: DailySnapshot = serde_json::from_value(Value::Object(snapshot_fields))?;

        let mut report = StatsReport {
            report_date,
            snapshot,
            ..Default::default()
        };

        for period in Period::ALL {
            let churn = ChurnCounts::METRICS.map(|m| int_or_zero(flat, &churn_key(m, period)));
            *report.churn.get_mut(period) = ChurnCounts::from_values(churn);

            let signups = SignupSplit::METRICS.map(|m| int_or_zero(flat, &signup_key(m, period)));
            *report.signups.get_mut(period) = SignupSplit::from_values(signups);
        }

        for code in discover_coupon_codes(flat) {
            let [active, trials, conversions, rate] = coupon_keys(&code);
            let stats = CouponStats {
                active_subscriptions: int_or_zero(flat, &active),
                total_trials: int_or_zero(flat, &trials),
                total_conversions: int_or_zero(flat, &conversions),
                conversion_rate: flat.get(&rate).and_then(Value::as_f64),
            };
            report.coupons.insert(code, stats);
        }

        Ok(report)
    }
}

/// Coupon codes present in a flat mapping, found by their active-subscriptions key.
pub fn discover_coupon_codes(flat: &FlatReport) -> Vec<String> {
    flat.keys()
        .filter_map(|key| key.strip_suffix(COUPON_ACTIVE_SUFFIX))
        .map(str::to_string)
        .collect()
}
