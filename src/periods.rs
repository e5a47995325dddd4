//! Reporting periods and their date windows.
//!
//! All windows are anchored on `today` in the reporting timezone. The
//! as-of date (the day being reported) is the day before.

use chrono::{DateTime, Duration, Months, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Trailing lookback for the "past due" churn figure, used for every period.
pub const PAST_DUE_LOOKBACK_DAYS: i64 = 7;
pub const WEEK_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Period {
    AllTime,
    LastWeek,
    LastMonth,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::AllTime, Period::LastWeek, Period::LastMonth];

    /// Suffix used by churn keys (`churn_canceled_week`).
    pub fn churn_suffix(&self) -> &'static str {
        match self {
            Period::AllTime => "all",
            Period::LastWeek => "week",
            Period::LastMonth => "month",
        }
    }

    /// Prefix used by signup keys (`last_week_total_new_signups`).
    pub fn signup_tag(&self) -> &'static str {
        match self {
            Period::AllTime => "all",
            Period::LastWeek => "last_week",
            Period::LastMonth => "last_month",
        }
    }

    /// Tag written into the churn CTEs.
    pub fn churn_tag(&self) -> &'static str {
        match self {
            Period::AllTime => "all_time",
            Period::LastWeek => "last_week",
            Period::LastMonth => "last_month",
        }
    }

    pub fn from_signup_tag(tag: &str) -> Option<Self> {
        match tag {
            "all" | "all_time" => Some(Period::AllTime),
            "last_week" => Some(Period::LastWeek),
            "last_month" => Some(Period::LastMonth),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::AllTime => "All time",
            Period::LastWeek => "Last week",
            Period::LastMonth => "Last month",
        }
    }
}

/// Half-open date range `[start, end)`; `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date < e)
    }
}

/// Every window the extractor needs for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindows {
    pub today: NaiveDate,
}

impl ReportWindows {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Windows for "now" in the reporting timezone.
    pub fn current(tz: &Tz) -> Self {
        Self::at(Utc::now(), tz)
    }

    pub fn at(now: DateTime<Utc>, tz: &Tz) -> Self {
        Self::new(tz.from_utc_datetime(&now.naive_utc()).date_naive())
    }

    /// The day being reported.
    pub fn as_of(&self) -> NaiveDate {
        self.today - Duration::days(1)
    }

    /// `MM/DD/YYYY` label of the as-of date.
    pub fn report_date(&self) -> String {
        self.as_of().format("%m/%d/%Y").to_string()
    }

    pub fn week_start(&self) -> NaiveDate {
        self.today - Duration::days(WEEK_DAYS)
    }

    pub fn month_start(&self) -> NaiveDate {
        self.today
            .checked_sub_months(Months::new(1))
            .unwrap_or(self.today)
    }

    /// Status changes on or after this date count as "past due" in every period.
    pub fn past_due_threshold(&self) -> NaiveDate {
        self.today - Duration::days(PAST_DUE_LOOKBACK_DAYS)
    }

    /// Window over which churn rows are partitioned.
    pub fn churn_window(&self, period: Period) -> DateWindow {
        match period {
            Period::AllTime => DateWindow {
                start: None,
                end: None,
            },
            Period::LastWeek => DateWindow {
                start: Some(self.week_start()),
                end: Some(self.today),
            },
            Period::LastMonth => DateWindow {
                start: Some(self.month_start()),
                end: Some(self.today),
            },
        }
    }

    /// Window over which signups are counted. All-time runs through the as-of date.
    pub fn signup_window(&self, period: Period) -> DateWindow {
        match period {
            Period::AllTime => DateWindow {
                start: None,
                end: Some(self.today),
            },
            other => self.churn_window(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn as_of_is_yesterday() {
        let windows = ReportWindows::new(date(2025, 3, 1));
        assert_eq!(windows.as_of(), date(2025, 2, 28));
        assert_eq!(windows.report_date(), "02/28/2025");
    }

    #[test]
    fn week_window_covers_seven_days_before_today() {
        let windows = ReportWindows::new(date(2025, 3, 10));
        let week = windows.churn_window(Period::LastWeek);

        assert_eq!(week.start, Some(date(2025, 3, 3)));
        assert!(week.contains(date(2025, 3, 3)));
        assert!(week.contains(date(2025, 3, 9)));
        assert!(!week.contains(date(2025, 3, 10)));
        assert!(!week.contains(date(2025, 3, 2)));
    }

    #[test]
    fn month_window_uses_calendar_month() {
        let windows = ReportWindows::new(date(2025, 3, 31));
        assert_eq!(windows.month_start(), date(2025, 2, 28));

        let windows = ReportWindows::new(date(2025, 3, 15));
        let month = windows.churn_window(Period::LastMonth);
        assert_eq!(month.start, Some(date(2025, 2, 15)));
        assert_eq!(month.end, Some(date(2025, 3, 15)));
    }

    #[test]
    fn past_due_threshold_is_seven_days_for_every_period() {
        let windows = ReportWindows::new(date(2025, 3, 15));
        assert_eq!(windows.past_due_threshold(), date(2025, 3, 8));
        assert_eq!(windows.past_due_threshold(), windows.week_start());
    }

    #[test]
    fn all_time_churn_is_unbounded_but_signups_stop_at_as_of() {
        let windows = ReportWindows::new(date(2025, 3, 15));

        let churn = windows.churn_window(Period::AllTime);
        assert!(churn.contains(date(2000, 1, 1)));
        assert!(churn.contains(date(2025, 3, 15)));

        let signups = windows.signup_window(Period::AllTime);
        assert!(signups.contains(date(2025, 3, 14)));
        assert!(!signups.contains(date(2025, 3, 15)));
    }

    #[test]
    fn today_follows_reporting_timezone() {
        // 05:00 UTC is still the previous evening on the US west coast.
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 5, 0, 0).unwrap();
        let windows = ReportWindows::at(now, &chrono_tz::PST8PDT);
        assert_eq!(windows.today, date(2025, 3, 14));

        let windows = ReportWindows::at(now, &chrono_tz::UTC);
        assert_eq!(windows.today, date(2025, 3, 15));
    }

    #[test]
    fn period_tags() {
        assert_eq!(Period::AllTime.churn_suffix(), "all");
        assert_eq!(Period::LastMonth.churn_suffix(), "month");
        assert_eq!(Period::LastWeek.signup_tag(), "last_week");
        assert_eq!(Period::from_signup_tag("all"), Some(Period::AllTime));
        assert_eq!(Period::from_signup_tag("all_time"), Some(Period::AllTime));
        assert_eq!(Period::from_signup_tag("yesterday"), None);
    }
}
