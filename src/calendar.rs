//! Sunday-to-Saturday calendar weeks and their attribution to months.
//!
//! A week that straddles two months belongs to the month holding the
//! majority (four or more) of its days. Comparisons always use the full (year, month) pair so
//! December/January weeks resolve correctly.

use chrono::{Datelike, Duration, Month, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthOfYear {
    pub year: i32,
    /// 1-based.
    pub month: u32,
}

impl MonthOfYear {
    pub fn new(month: u32, year: i32) -> Self {
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::new(date.month(), date.year())
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
    }

    pub fn name(&self) -> Option<&'static str> {
        month_name(self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WeekSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekSpan {
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            start: week_start(date),
            end: week_end(date),
        }
    }

    pub fn month(&self) -> MonthOfYear {
        attribute_week(self.start, self.end)
    }

    pub fn label(&self) -> String {
        format_week_range(self.start, self.end)
    }
}

/// Sunday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// Saturday on or after `date`.
pub fn week_end(date: NaiveDate) -> NaiveDate {
    week_start(date) + Duration::days(6)
}

/// Days of `[week_start, week_end]` that fall in the given month.
pub fn days_in_month(week_start: NaiveDate, week_end: NaiveDate, month: u32, year: i32) -> u32 {
    week_start
        .iter_days()
        .take_while(|day| *day <= week_end)
        .filter(|day| day.month() == month && day.year() == year)
        .count() as u32
}

pub fn attribute_week(week_start: NaiveDate, week_end: NaiveDate) -> MonthOfYear {
    let start_month = MonthOfYear::of(week_start);
    let end_month = MonthOfYear::of(week_end);

    if start_month == end_month {
        return start_month;
    }

    let start_days = days_in_month(week_start, week_end, start_month.month, start_month.year);
    let end_days = days_in_month(week_start, week_end, end_month.month, end_month.year);

    // A 3/4 split leaves both sides with three or more days; only the
    // strict majority decides. Ties on odd spans go to the later month.
    if start_days > end_days {
        start_month
    } else {
        end_month
    }
}

/// Weeks attributed to `month`/`year`, oldest first. An out-of-range month
/// yields no weeks.
pub fn weeks_for_month(month: u32, year: i32) -> Vec<WeekSpan> {
    let target = MonthOfYear::new(month, year);
    let (Some(first_day), Some(last_day)) = (target.first_day(), target.last_day()) else {
        return Vec::new();
    };

    let mut weeks = Vec::new();
    let mut current = week_start(first_day);

    while current <= last_day {
        let span = WeekSpan {
            start: current,
            end: week_end(current),
        };
        if span.month() == target {
            weeks.push(span);
        }
        current += Duration::days(7);
    }

    weeks
}

/// 1-based position of the week starting at `week_start` within the month,
/// or 0 when that week is attributed elsewhere.
pub fn week_number_in_month(week_start: NaiveDate, month: u32, year: i32) -> usize {
    weeks_for_month(month, year)
        .iter()
        .position(|week| week.start == week_start)
        .map(|index| index + 1)
        .unwrap_or(0)
}

pub fn is_date_in_week(date: NaiveDate, week_start: NaiveDate, week_end: NaiveDate) -> bool {
    week_start <= date && date <= week_end
}

pub fn month_name(month: u32) -> Option<&'static str> {
    let month = u8::try_from(month).ok()?;
    Month::try_from(month).ok().map(|m| m.name())
}

/// `MM/DD/YY - MM/DD/YY`, the label the dashboard stores on each record.
pub fn format_week_range(week_start: NaiveDate, week_end: NaiveDate) -> String {
    format!(
        "{} - {}",
        week_start.format("%m/%d/%y"),
        week_end.format("%m/%d/%y")
    )
}

/// Inverse of [`format_week_range`]. Four-digit years are also accepted.
/// Anything malformed yields `None` so callers can skip the record.
pub fn parse_week_range(label: &str) -> Option<(NaiveDate, NaiveDate)> {
    let (start, end) = label.split_once(" - ")?;
    let start = parse_us_date(start)?;
    let end = parse_us_date(end)?;
    Some((start, end))
}

fn parse_us_date(value: &str) -> Option<NaiveDate> {
    let mut parts = value.trim().split('/');
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    let year_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let year: i32 = year_part.parse().ok()?;
    let year = match year_part.len() {
        2 => 2000 + year,
        4 => year,
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}
