//! Postgres-wire warehouse (Redshift) backed by a single sqlx connection.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Connection, FromRow, Row};
use tracing::info;

use super::{expect_single_row, queries, Warehouse};
use crate::config::WarehouseConfig;
use crate::periods::{Period, ReportWindows};
use crate::report::{
    ChurnCounts, ChurnSummary, CouponRow, DailySnapshot, Numeric, SignupSplit, SignupSummary,
};
use crate::{Error, Result};

/// Column contract of the churn query, one field per period and metric.
#[derive(Debug, FromRow)]
struct ChurnRow {
    churn_conversion_all: i64,
    churn_canceled_all: i64,
    churn_none_all: i64,
    churn_new_signup_all: i64,
    churn_past_due_all: i64,
    churn_conversion_week: i64,
    churn_canceled_week: i64,
    churn_none_week: i64,
    churn_new_signup_week: i64,
    churn_past_due_week: i64,
    churn_conversion_month: i64,
    churn_canceled_month: i64,
    churn_none_month: i64,
    churn_new_signup_month: i64,
    churn_past_due_month: i64,
}

impl From<ChurnRow> for ChurnSummary {
    fn from(row: ChurnRow) -> Self {
        ChurnSummary {
            all_time: ChurnCounts::from_values([
                row.churn_conversion_all,
                row.churn_canceled_all,
                row.churn_none_all,
                row.churn_new_signup_all,
                row.churn_past_due_all,
            ]),
            last_week: ChurnCounts::from_values([
                row.churn_conversion_week,
                row.churn_canceled_week,
                row.churn_none_week,
                row.churn_new_signup_week,
                row.churn_past_due_week,
            ]),
            last_month: ChurnCounts::from_values([
                row.churn_conversion_month,
                row.churn_canceled_month,
                row.churn_none_month,
                row.churn_new_signup_month,
                row.churn_past_due_month,
            ]),
        }
    }
}

#[derive(Debug, FromRow)]
struct SignupRow {
    period: String,
    new_signups_without_coupon: i64,
    new_signups_with_coupon: i64,
    total_new_signups: i64,
}

/// `percent_converted` may be NUMERIC or a float column depending on the view.
fn percent_converted(row: &PgRow) -> Result<Numeric> {
    if let Ok(value) = row.try_get::<Option<Decimal>, _>("percent_converted") {
        return Ok(Numeric::from(value));
    }
    let value: Option<f64> = row.try_get("percent_converted")?;
    Ok(value.map(Numeric::Float).unwrap_or(Numeric::Null))
}

fn coupon_row(row: &PgRow) -> Result<CouponRow> {
    Ok(CouponRow {
        coupon_code: row.try_get("coupon_code")?,
        coupon_active_subscriptions: row.try_get("coupon_active_subscriptions")?,
        total_trials: row.try_get("total_trials")?,
        total_conversions: row.try_get("total_conversions")?,
        percent_converted: percent_converted(row)?,
    })
}

/// Fold the unioned per-period rows; each period must appear exactly once.
fn signup_summary(rows: Vec<SignupRow>) -> Result<SignupSummary> {
    let mut summary = SignupSummary::default();
    let mut seen = Vec::with_capacity(3);

    for row in rows {
        let period = Period::from_signup_tag(&row.period).ok_or_else(|| {
            Error::QueryShape(format!("unknown signup period tag: {}", row.period))
        })?;
        if seen.contains(&period) {
            return Err(Error::QueryShape(format!(
                "signup period {} returned twice",
                row.period
            )));
        }
        seen.push(period);
        *summary.get_mut(period) = SignupSplit {
            without_coupon: row.new_signups_without_coupon,
            with_coupon: row.new_signups_with_coupon,
            total: row.total_new_signups,
        };
    }

    if seen.len() != Period::ALL.len() {
        return Err(Error::QueryShape(format!(
            "signup query returned {} periods, expected {}",
            seen.len(),
            Period::ALL.len()
        )));
    }

    Ok(summary)
}

/// Single connection, opened by [`PgWarehouse::connect`] and released by `close`.
pub struct PgWarehouse {
    conn: Option<PgConnection>,
}

impl PgWarehouse {
    pub async fn connect(config: &WarehouseConfig) -> Result<Self> {
        let conn = PgConnection::connect_with(&config.connect_options())
            .await
            .map_err(|e| Error::ConnectionError(e.to_string()))?;
        info!(host = %config.host, db = %config.dbname, "Connected to warehouse");
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::ConnectionError("warehouse connection already closed".into()))
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn daily_snapshot(&mut self) -> Result<DailySnapshot> {
        let rows: Vec<DailySnapshot> = sqlx::query_as(queries::DAILY_SNAPSHOT)
            .fetch_all(self.conn()?)
            .await?;
        expect_single_row(rows, "daily snapshot")
    }

    async fn churn_by_period(&mut self, windows: &ReportWindows) -> Result<ChurnSummary> {
        let rows: Vec<ChurnRow> = sqlx::query_as(queries::CHURN_BY_PERIOD)
            .bind(windows.today)
            .bind(windows.week_start())
            .bind(windows.month_start())
            .bind(windows.past_due_threshold())
            .fetch_all(self.conn()?)
            .await?;
        expect_single_row(rows, "churn").map(ChurnSummary::from)
    }

    async fn coupon_performance(&mut self) -> Result<Vec<CouponRow>> {
        let rows = sqlx::query(queries::COUPON_PERFORMANCE)
            .fetch_all(self.conn()?)
            .await?;
        rows.iter().map(coupon_row).collect()
    }

    async fn signups_by_period(&mut self, windows: &ReportWindows) -> Result<SignupSummary> {
        let rows: Vec<SignupRow> = sqlx::query_as(queries::SIGNUPS_BY_PERIOD)
            .bind(windows.today)
            .bind(windows.week_start())
            .bind(windows.month_start())
            .fetch_all(self.conn()?)
            .await?;
        signup_summary(rows)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
            info!("Warehouse connection closed");
        }
        Ok(())
    }
}
