//! SQL for the four report queries.
//!
//! Date bounds are bound as parameters:
//! `$1` today, `$2` week start, `$3` month start, `$4` past-due threshold.
//! Every per-window figure is a `COUNT`, so an empty window yields 0.

pub const DAILY_SNAPSHOT: &str = r#"
SELECT
    rsd.total::BIGINT                        AS total,
    rsd.trials::BIGINT                       AS trials,
    rsd.daily_bot2025_trials::BIGINT         AS daily_bot2025_trials,
    rsd.revenue30_trials::BIGINT             AS revenue30_trials,
    rsd.active_subscriptions::BIGINT         AS active_subscriptions,
    rsd.past_due_subscriptions::BIGINT       AS past_due_subscriptions,
    rsd.yearly_subscriptions::BIGINT         AS yearly_subscriptions,
    rsd.cancelled_subscriptions::BIGINT      AS cancelled_subscriptions,
    rsd.cancel_after_trial::BIGINT           AS cancel_after_trial,
    rsd.cancel_during_trial::BIGINT          AS cancel_during_trial,
    rsd.ios_first_time_downloads::BIGINT     AS ios_first_time_downloads,
    rsd.ios_total_downloads::BIGINT          AS ios_total_downloads,
    rsd.google_play_active_installs::BIGINT  AS google_play_active_installs
FROM daily_bot_stats_daily AS rsd
"#;

pub const CHURN_BY_PERIOD: &str = r#"
WITH
churn_total AS (
  SELECT
    COUNT(DISTINCT CASE WHEN status = 'Conversion' THEN email END)::BIGINT AS churn_conversion_all,
    COUNT(DISTINCT CASE WHEN status = 'Canceled'   THEN email END)::BIGINT AS churn_canceled_all,
    COUNT(DISTINCT CASE WHEN status = 'None'       THEN email END)::BIGINT AS churn_none_all,
    COUNT(DISTINCT CASE WHEN status = 'New Signup' THEN email END)::BIGINT AS churn_new_signup_all,
    COUNT(DISTINCT CASE WHEN status_date >= $4::date THEN email END)::BIGINT AS churn_past_due_all
  FROM daily_bot_signup_churn
  WHERE email IS NOT NULL
),
churn_last_week AS (
  SELECT
    COUNT(DISTINCT CASE WHEN status = 'Conversion' THEN email END)::BIGINT AS churn_conversion_week,
    COUNT(DISTINCT CASE WHEN status = 'Canceled'   THEN email END)::BIGINT AS churn_canceled_week,
    COUNT(DISTINCT CASE WHEN status = 'None'       THEN email END)::BIGINT AS churn_none_week,
    COUNT(DISTINCT CASE WHEN status = 'New Signup' THEN email END)::BIGINT AS churn_new_signup_week,
    COUNT(DISTINCT CASE WHEN status_date >= $4::date THEN email END)::BIGINT AS churn_past_due_week
  FROM daily_bot_signup_churn
  WHERE email IS NOT NULL
    AND status_date >= $2::date
    AND status_date <  $1::date
),
churn_last_month AS (
  SELECT
    COUNT(DISTINCT CASE WHEN status = 'Conversion' THEN email END)::BIGINT AS churn_conversion_month,
    COUNT(DISTINCT CASE WHEN status = 'Canceled'   THEN email END)::BIGINT AS churn_canceled_month,
    COUNT(DISTINCT CASE WHEN status = 'None'       THEN email END)::BIGINT AS churn_none_month,
    COUNT(DISTINCT CASE WHEN status = 'New Signup' THEN email END)::BIGINT AS churn_new_signup_month,
    COUNT(DISTINCT CASE WHEN status_date >= $4::date THEN email END)::BIGINT AS churn_past_due_month
  FROM daily_bot_signup_churn
  WHERE email IS NOT NULL
    AND status_date >= $3::date
    AND status_date <  $1::date
)
SELECT
  ct.churn_conversion_all,
  ct.churn_canceled_all,
  ct.churn_none_all,
  ct.churn_new_signup_all,
  ct.churn_past_due_all,
  lw.churn_conversion_week,
  lw.churn_canceled_week,
  lw.churn_none_week,
  lw.churn_new_signup_week,
  lw.churn_past_due_week,
  lm.churn_conversion_month,
  lm.churn_canceled_month,
  lm.churn_none_month,
  lm.churn_new_signup_month,
  lm.churn_past_due_month
FROM churn_total AS ct
CROSS JOIN churn_last_week AS lw
CROSS JOIN churn_last_month AS lm
"#;

pub const COUPON_PERFORMANCE: &str = r#"
WITH
    daily_bot_coupon_trial AS (
        SELECT coupon_code, COUNT(DISTINCT email) AS coupon_active_subscriptions
        FROM daily_bot_trial_coupon_activity
        WHERE email IS NOT NULL
        GROUP BY coupon_code
    ),
    all_time_conversion_rate_by_coupon AS (
        SELECT coupon_code, total_trials, total_conversions, percent_converted
        FROM daily_bot_all_time_conversion_rate_by_coupon
    )
SELECT
    rct.coupon_code,
    rct.coupon_active_subscriptions::BIGINT AS coupon_active_subscriptions,
    COALESCE(atc.total_trials, 0)::BIGINT      AS total_trials,
    COALESCE(atc.total_conversions, 0)::BIGINT AS total_conversions,
    atc.percent_converted
FROM daily_bot_coupon_trial AS rct
JOIN all_time_conversion_rate_by_coupon AS atc
  ON rct.coupon_code = atc.coupon_code
ORDER BY rct.coupon_code
"#;

pub const SIGNUPS_BY_PERIOD: &str = r#"
WITH
    t_all AS (
      SELECT
        'all'::VARCHAR AS period,
        COUNT(CASE WHEN coupon_code IS NULL OR coupon_code = 'No Coupon Code' THEN 1 END)::BIGINT AS new_signups_without_coupon,
        COUNT(CASE WHEN coupon_code IS NOT NULL AND coupon_code <> 'No Coupon Code' THEN 1 END)::BIGINT AS new_signups_with_coupon,
        COUNT(1)::BIGINT AS total_new_signups
      FROM daily_bot_trial_signups_by_coupon
      WHERE signup_date::date < $1::date
    ),
    t_last_week AS (
      SELECT
        'last_week'::VARCHAR AS period,
        COUNT(CASE WHEN coupon_code IS NULL OR coupon_code = 'No Coupon Code' THEN 1 END)::BIGINT AS new_signups_without_coupon,
        COUNT(CASE WHEN coupon_code IS NOT NULL AND coupon_code <> 'No Coupon Code' THEN 1 END)::BIGINT AS new_signups_with_coupon,
        COUNT(1)::BIGINT AS total_new_signups
      FROM daily_bot_trial_signups_by_coupon
      WHERE signup_date::date >= $2::date
        AND signup_date::date <  $1::date
    ),
    t_last_month AS (
      SELECT
        'last_month'::VARCHAR AS period,
        COUNT(CASE WHEN coupon_code IS NULL OR coupon_code = 'No Coupon Code' THEN 1 END)::BIGINT AS new_signups_without_coupon,
        COUNT(CASE WHEN coupon_code IS NOT NULL AND coupon_code <> 'No Coupon Code' THEN 1 END)::BIGINT AS new_signups_with_coupon,
        COUNT(1)::BIGINT AS total_new_signups
      FROM daily_bot_trial_signups_by_coupon
      WHERE signup_date::date >= $3::date
        AND signup_date::date <  $1::date
    )
SELECT * FROM t_all
UNION ALL
SELECT * FROM t_last_week
UNION ALL
SELECT * FROM t_last_month
"#;
