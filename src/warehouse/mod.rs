//! Warehouse access for the extractor.
//!
//! Provides:
//! - the [`Warehouse`] trait over the four report queries
//! - [`PgWarehouse`], the Postgres-wire (Redshift) implementation
//! - [`MemoryWarehouse`], the same aggregation over fixture records

pub mod memory;
pub mod postgres;
pub mod queries;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::periods::ReportWindows;
use crate::report::{
    coupons_from_rows, ChurnSummary, CouponRow, DailySnapshot, SignupSummary, StatsReport,
};
use crate::{Error, Result};

pub use memory::{MemoryWarehouse, WarehouseFixture};
pub use postgres::PgWarehouse;

/// Status labels partitioning the churn table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChurnStatus {
    Conversion,
    Canceled,
    None,
    NewSignup,
}

impl ChurnStatus {
    pub const ALL: [ChurnStatus; 4] = [
        ChurnStatus::Conversion,
        ChurnStatus::Canceled,
        ChurnStatus::None,
        ChurnStatus::NewSignup,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChurnStatus::Conversion => "Conversion",
            ChurnStatus::Canceled => "Canceled",
            ChurnStatus::None => "None",
            ChurnStatus::NewSignup => "New Signup",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.label() == label)
    }
}

/// One open warehouse session. Queries run strictly in sequence.
#[async_trait]
pub trait Warehouse: Send {
    /// The daily snapshot; anything but exactly one row is an error.
    async fn daily_snapshot(&mut self) -> Result<DailySnapshot>;

    async fn churn_by_period(&mut self, windows: &ReportWindows) -> Result<ChurnSummary>;

    async fn coupon_performance(&mut self) -> Result<Vec<CouponRow>>;

    async fn signups_by_period(&mut self, windows: &ReportWindows) -> Result<SignupSummary>;

    /// Release the connection. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// Exactly-one-row guard shared by the implementations.
pub(crate) fn expect_single_row<T>(mut rows: Vec<T>, query: &str) -> Result<T> {
    match rows.len() {
        1 => Ok(rows.remove(0)),
        n => Err(Error::QueryShape(format!(
            "{} query returned {} rows, expected exactly one",
            query, n
        ))),
    }
}

/// Run the four report queries and assemble the typed report.
pub async fn collect_report<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    windows: &ReportWindows,
) -> Result<StatsReport> {
    let snapshot = warehouse.daily_snapshot().await?;
    info!("Fetched daily snapshot");

    let churn = warehouse.churn_by_period(windows).await?;
    info!("Fetched churn by period");

    let coupon_rows = warehouse.coupon_performance().await?;
    info!(coupons = coupon_rows.len(), "Fetched coupon performance");

    let signups = warehouse.signups_by_period(windows).await?;
    info!("Fetched signups by coupon");

    Ok(StatsReport {
        report_date: windows.report_date(),
        snapshot,
        churn,
        coupons: coupons_from_rows(&coupon_rows),
        signups,
    })
}

/// Collect the report and close the warehouse on every path.
pub async fn extract_report<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    windows: &ReportWindows,
) -> Result<StatsReport> {
    let result = collect_report(warehouse, windows).await;
    let closed = warehouse.close().await;

    match (result, closed) {
        (Ok(report), Ok(())) => Ok(report),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(error = %close_err, "Failed to close warehouse after query error");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ChurnCounts, Numeric};
    use chrono::NaiveDate;

    #[derive(Default)]
    struct FakeWarehouse {
        snapshot_rows: usize,
        fail_churn: bool,
        closed: u32,
    }

    #[async_trait]
    impl Warehouse for FakeWarehouse {
        async fn daily_snapshot(&mut self) -> Result<DailySnapshot> {
            let rows = vec![DailySnapshot::default(); self.snapshot_rows];
            expect_single_row(rows, "daily snapshot")
        }

        async fn churn_by_period(&mut self, _windows: &ReportWindows) -> Result<ChurnSummary> {
            if self.fail_churn {
                return Err(Error::WarehouseError("relation does not exist".into()));
            }
            Ok(ChurnSummary {
                last_week: ChurnCounts::from_values([1, 2, 3, 4, 5]),
                ..Default::default()
            })
        }

        async fn coupon_performance(&mut self) -> Result<Vec<CouponRow>> {
            Ok(vec![CouponRow {
                coupon_code: "SAVE10".into(),
                coupon_active_subscriptions: 5,
                total_trials: 20,
                total_conversions: 8,
                percent_converted: Numeric::Float(0.4),
            }])
        }

        async fn signups_by_period(&mut self, _windows: &ReportWindows) -> Result<SignupSummary> {
            Ok(SignupSummary::default())
        }

        async fn close(&mut self) -> Result<()> {
            self.closed += 1;
            Ok(())
        }
    }

    fn windows() -> ReportWindows {
        ReportWindows::new(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap())
    }

    #[tokio::test]
    async fn extract_report_assembles_and_closes() {
        let mut warehouse = FakeWarehouse {
            snapshot_rows: 1,
            ..Default::default()
        };

        let report = extract_report(&mut warehouse, &windows()).await.unwrap();

        assert_eq!(report.report_date, "03/14/2025");
        assert_eq!(report.churn.last_week.past_due, 5);
        assert_eq!(report.coupons["SAVE10"].active_subscriptions, 5);
        assert_eq!(warehouse.closed, 1);
    }

    #[tokio::test]
    async fn connection_is_closed_when_a_query_fails() {
        let mut warehouse = FakeWarehouse {
            snapshot_rows: 1,
            fail_churn: true,
            ..Default::default()
        };

        let err = extract_report(&mut warehouse, &windows()).await.unwrap_err();

        assert!(matches!(err, Error::WarehouseError(_)));
        assert_eq!(warehouse.closed, 1);
    }

    #[tokio::test]
    async fn snapshot_must_be_exactly_one_row() {
        for rows in [0, 2] {
            let mut warehouse = FakeWarehouse {
                snapshot_rows: rows,
                ..Default::default()
            };
            let err = extract_report(&mut warehouse, &windows()).await.unwrap_err();
            assert!(matches!(err, Error::QueryShape(_)));
            assert!(err.to_string().contains(&format!("returned {} rows", rows)));
            assert_eq!(warehouse.closed, 1);
        }
    }

    #[test]
    fn churn_status_labels() {
        assert_eq!(ChurnStatus::NewSignup.label(), "New Signup");
        assert_eq!(ChurnStatus::from_label("Canceled"), Some(ChurnStatus::Canceled));
        assert_eq!(ChurnStatus::from_label("canceled"), None);
    }
}
