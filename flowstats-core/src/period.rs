//! Report period resolution
//!
//! Turns a period selector (`all`, `today`, `last_week`, `last_N_months`,
//! `custom`) into a concrete UTC interval. Calendar boundaries such as
//! "start of today" or "Monday" are taken in the site's UTC offset.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveTime, Offset, Utc,
};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::to_db_timestamp;

/// Month counts accepted by `last_N_months`.
pub const MONTH_PRESETS: [u32; 4] = [1, 3, 6, 12];

/// A named period preset or a custom range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodSelector {
    /// No lower or upper bound
    All,
    /// Start of the current day until now
    Today,
    /// The previous full ISO week (Monday to Sunday)
    LastWeek,
    /// Rolling window of N calendar months ending now
    LastMonths(u32),
    /// Caller-supplied calendar dates, both inclusive
    Custom,
}

impl PeriodSelector {
    pub fn as_str(&self) -> String {
        match self {
            PeriodSelector::All => "all".to_string(),
            PeriodSelector::Today => "today".to_string(),
            PeriodSelector::LastWeek => "last_week".to_string(),
            PeriodSelector::LastMonths(n) => format!("last_{}_months", n),
            PeriodSelector::Custom => "custom".to_string(),
        }
    }
}

impl std::fmt::Display for PeriodSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PeriodSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let months = |n: &str| -> Result<Self> {
            match n.parse::<u32>() {
                Ok(n) if MONTH_PRESETS.contains(&n) => Ok(PeriodSelector::LastMonths(n)),
                _ => Err(Error::InvalidPeriod(s.to_string())),
            }
        };

        match s.trim() {
            "all" => Ok(PeriodSelector::All),
            "today" => Ok(PeriodSelector::Today),
            "last_week" => Ok(PeriodSelector::LastWeek),
            "custom" => Ok(PeriodSelector::Custom),
            other => {
                if let Some(n) = other
                    .strip_prefix("last_")
                    .and_then(|rest| rest.strip_suffix("_months"))
                {
                    months(n)
                } else if other == "last_month" {
                    Ok(PeriodSelector::LastMonths(1))
                } else if !other.is_empty() && other.chars().all(|c| c.is_ascii_digit()) {
                    // The report form posts bare month counts ("1", "3", ...)
                    months(other)
                } else {
                    Err(Error::InvalidPeriod(s.to_string()))
                }
            }
        }
    }
}

/// A resolved time interval, closed at the start.
///
/// The end is open unless `end_inclusive` is set, which is the case for
/// periods that run up to the moment of the request. A missing bound means
/// the interval is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateInterval {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub end_inclusive: bool,
}

impl DateInterval {
    /// The interval covering all time.
    pub fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
            end_inclusive: false,
        }
    }

    /// Interval `[start, end)`.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            end_inclusive: false,
        }
    }

    /// Interval `[start, now]`.
    pub fn up_to(start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            end_inclusive: true,
            ..Self::between(start, now)
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let before_end = |e: DateTime<Utc>| if self.end_inclusive { ts <= e } else { ts < e };
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, before_end)
    }

    /// Bounds formatted for comparison against `date_created`, as
    /// `start <= date_created < end`.
    ///
    /// Stored timestamps have whole seconds, so an inclusive end becomes the
    /// start of the following second.
    pub fn sql_bounds(&self) -> (Option<String>, Option<String>) {
        let end = self.end.map(|e| {
            if self.end_inclusive {
                to_db_timestamp(e + Duration::seconds(1))
            } else {
                to_db_timestamp(e)
            }
        });
        (self.start.map(to_db_timestamp), end)
    }
}

/// Resolves period selectors against a clock and a site UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct PeriodResolver {
    offset: FixedOffset,
}

impl Default for PeriodResolver {
    fn default() -> Self {
        Self::utc()
    }
}

impl PeriodResolver {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Resolver whose calendar days are UTC days.
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Resolver for a site whose clock runs `minutes` ahead of UTC.
    pub fn from_offset_minutes(minutes: i32) -> Result<Self> {
        FixedOffset::east_opt(minutes * 60)
            .map(Self::new)
            .ok_or_else(|| Error::Config(format!("UTC offset out of range: {} minutes", minutes)))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Resolve a selector against the current time.
    pub fn resolve(
        &self,
        selector: &str,
        custom_start: Option<&str>,
        custom_end: Option<&str>,
    ) -> Result<DateInterval> {
        self.resolve_at(selector, custom_start, custom_end, Utc::now())
    }

    /// Resolve a selector as if the current time were `now`.
    pub fn resolve_at(
        &self,
        selector: &str,
        custom_start: Option<&str>,
        custom_end: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DateInterval> {
        let selector: PeriodSelector = selector.parse()?;
        let range = match selector {
            PeriodSelector::Custom => Some(parse_custom_range(custom_start, custom_end)?),
            _ => None,
        };
        self.resolve_selector(selector, range, now)
    }

    /// Resolve an already-parsed selector.
    ///
    /// `range` is required for [`PeriodSelector::Custom`] and ignored otherwise.
    pub fn resolve_selector(
        &self,
        selector: PeriodSelector,
        range: Option<(NaiveDate, NaiveDate)>,
        now: DateTime<Utc>,
    ) -> Result<DateInterval> {
        let today = now.with_timezone(&self.offset).date_naive();

        let interval = match selector {
            PeriodSelector::All => DateInterval::unbounded(),
            PeriodSelector::Today => DateInterval::up_to(self.local_midnight(today), now),
            PeriodSelector::LastWeek => {
                let this_monday =
                    today - Duration::days(today.weekday().num_days_from_monday() as i64);
                let previous_monday = this_monday - Duration::days(7);
                DateInterval::between(
                    self.local_midnight(previous_monday),
                    self.local_midnight(this_monday),
                )
            }
            PeriodSelector::LastMonths(n) => {
                if !MONTH_PRESETS.contains(&n) {
                    return Err(Error::InvalidPeriod(selector.as_str()));
                }
                let start = now
                    .checked_sub_months(Months::new(n))
                    .ok_or_else(|| Error::InvalidPeriod(selector.as_str()))?;
                DateInterval::up_to(start, now)
            }
            PeriodSelector::Custom => {
                let (start, end) = range.ok_or_else(|| {
                    Error::MissingDateRange("custom period needs a start and an end date".into())
                })?;
                if start > end {
                    return Err(Error::MissingDateRange(format!(
                        "start date {} is after end date {}",
                        start, end
                    )));
                }
                let after_end = end.succ_opt().ok_or_else(|| {
                    Error::MissingDateRange(format!("end date {} is out of range", end))
                })?;
                DateInterval::between(self.local_midnight(start), self.local_midnight(after_end))
            }
        };

        tracing::debug!(
            selector = %selector,
            start = ?interval.start,
            end = ?interval.end,
            "Resolved report period"
        );

        Ok(interval)
    }

    /// 00:00 local time on `date`, as a UTC instant.
    fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(NaiveTime::MIN);
        (local - Duration::seconds(self.offset.local_minus_utc() as i64)).and_utc()
    }
}

fn parse_custom_range(
    custom_start: Option<&str>,
    custom_end: Option<&str>,
) -> Result<(NaiveDate, NaiveDate)> {
    let (Some(start), Some(end)) = (custom_start, custom_end) else {
        return Err(Error::MissingDateRange(
            "custom period needs a start and an end date".to_string(),
        ));
    };
    Ok((parse_calendar_date(start)?, parse_calendar_date(end)?))
}

fn parse_calendar_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::MissingDateRange(format!("invalid date {:?}: {}", s, e)))
}
