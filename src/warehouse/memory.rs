//! In-process warehouse over fixture records.
//!
//! Applies the same windows and counting rules as the SQL queries, so dry
//! runs and tests see the numbers the warehouse would produce.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use super::{expect_single_row, ChurnStatus, Warehouse};
use crate::periods::{Period, ReportWindows};
use crate::report::{
    is_signup_without_coupon, ChurnCounts, ChurnSummary, CouponRow, DailySnapshot, Numeric,
    SignupSummary,
};
use crate::{Error, Result};

/// A row of the signup-churn table.
#[derive(Debug, Clone, Deserialize)]
pub struct ChurnEvent {
    pub email: Option<String>,
    pub status: String,
    pub status_date: NaiveDate,
}

/// A row of the trial coupon activity table.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponActivity {
    pub email: Option<String>,
    pub coupon_code: String,
}

/// A row of the all-time conversion-rate-by-coupon view.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponConversion {
    pub coupon_code: String,
    #[serde(default)]
    pub total_trials: i64,
    #[serde(default)]
    pub total_conversions: i64,
    pub percent_converted: Numeric,
}

/// A row of the trial-signups-by-coupon table.
#[derive(Debug, Clone, Deserialize)]
pub struct Signup {
    pub signup_date: NaiveDate,
    pub coupon_code: Option<String>,
}

/// Raw tables, loadable from YAML or JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WarehouseFixture {
    pub snapshot: Vec<DailySnapshot>,
    pub churn_events: Vec<ChurnEvent>,
    pub coupon_activity: Vec<CouponActivity>,
    pub coupon_conversions: Vec<CouponConversion>,
    pub signups: Vec<Signup>,
}

impl WarehouseFixture {
    /// Load a fixture file; `.json` is parsed as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(serde_yaml::from_str(&content)?)
        }
    }
}

/// Churn counts for every period.
pub fn aggregate_churn(events: &[ChurnEvent], windows: &ReportWindows) -> ChurnSummary {
    let mut summary = ChurnSummary::default();
    let past_due_from = windows.past_due_threshold();

    for period in Period::ALL {
        let window = windows.churn_window(period);
        let in_window: Vec<(&str, &ChurnEvent)> = events
            .iter()
            .filter_map(|e| e.email.as_deref().map(|email| (email, e)))
            .filter(|(_, e)| window.contains(e.status_date))
            .collect();

        let distinct = |pred: &dyn Fn(&ChurnEvent) -> bool| -> i64 {
            in_window
                .iter()
                .filter(|(_, e)| pred(*e))
                .map(|(email, _)| *email)
                .collect::<HashSet<_>>()
                .len() as i64
        };

        let by_status = |status: ChurnStatus| distinct(&|e: &ChurnEvent| e.status == status.label());

        *summary.get_mut(period) = ChurnCounts {
            conversion: by_status(ChurnStatus::Conversion),
            canceled: by_status(ChurnStatus::Canceled),
            none: by_status(ChurnStatus::None),
            new_signup: by_status(ChurnStatus::NewSignup),
            past_due: distinct(&|e: &ChurnEvent| e.status_date >= past_due_from),
        };
    }

    summary
}

/// Signup counts for every period, split by coupon usage.
pub fn aggregate_signups(signups: &[Signup], windows: &ReportWindows) -> SignupSummary {
    let mut summary = SignupSummary::default();

    for period in Period::ALL {
        let window = windows.signup_window(period);
        let split = summary.get_mut(period);
        for signup in signups.iter().filter(|s| window.contains(s.signup_date)) {
            if is_signup_without_coupon(signup.coupon_code.as_deref()) {
                split.without_coupon += 1;
            } else {
                split.with_coupon += 1;
            }
            split.total += 1;
        }
    }

    summary
}

/// Join distinct active emails per coupon with the conversion view.
pub fn coupon_performance(
    activity: &[CouponActivity],
    conversions: &[CouponConversion],
) -> Vec<CouponRow> {
    let mut active: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
    for row in activity {
        if let Some(email) = row.email.as_deref() {
            active.entry(row.coupon_code.as_str()).or_default().insert(email);
        }
    }

    let mut rows = Vec::new();
    for (code, emails) in &active {
        for conv in conversions.iter().filter(|c| c.coupon_code == *code) {
            rows.push(CouponRow {
                coupon_code: code.to_string(),
                coupon_active_subscriptions: emails.len() as i64,
                total_trials: conv.total_trials,
                total_conversions: conv.total_conversions,
                percent_converted: conv.percent_converted.clone(),
            });
        }
    }
    rows
}

/// Fixture-backed warehouse.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    fixture: WarehouseFixture,
    open: bool,
}

impl MemoryWarehouse {
    pub fn new(fixture: WarehouseFixture) -> Self {
        Self {
            fixture,
            open: true,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(WarehouseFixture::load(path)?))
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::ConnectionError("warehouse connection already closed".into()))
        }
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn daily_snapshot(&mut self) -> Result<DailySnapshot> {
        self.ensure_open()?;
        expect_single_row(self.fixture.snapshot.clone(), "daily snapshot")
    }

    async fn churn_by_period(&mut self, windows: &ReportWindows) -> Result<ChurnSummary> {
        self.ensure_open()?;
        Ok(aggregate_churn(&self.fixture.churn_events, windows))
    }

    async fn coupon_performance(&mut self) -> Result<Vec<CouponRow>> {
        self.ensure_open()?;
        Ok(coupon_performance(
            &self.fixture.coupon_activity,
            &self.fixture.coupon_conversions,
        ))
    }

    async fn signups_by_period(&mut self, windows: &ReportWindows) -> Result<SignupSummary> {
        self.ensure_open()?;
        Ok(aggregate_signups(&self.fixture.signups, windows))
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}
