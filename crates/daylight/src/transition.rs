// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::DaylightError;

/// The week number that stands for "the last such weekday of the month".
pub const LAST_WEEK: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DateRule {
    Fixed { day: u32 },
    Floating { week: u8, weekday: Weekday },
}

/// The local date and time at which clocks change, expressed independently of the year.
///
/// A transition either falls on a fixed day of a month (such as "March 25th") or floats with
/// the calendar (such as "the second Sunday of March"). Placing it in a concrete year is done
/// with [`on`](Self::on).
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, NaiveTime, Weekday};
/// use daylight::TransitionTime;
///
/// let two_am = NaiveTime::from_hms_opt(2, 0, 0).unwrap();
/// let second_sunday_of_march = TransitionTime::floating(3, 2, Weekday::Sun, two_am)?;
///
/// assert_eq!(
///     second_sunday_of_march.on(2024)?,
///     NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_time(two_am)
/// );
/// # Ok::<(), daylight::DaylightError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionTime {
    month: u32,
    time_of_day: NaiveTime,
    date: DateRule,
}

impl TransitionTime {
    /// Creates a transition on a fixed day of a month.
    ///
    /// Days past the end of the month are allowed and fall on the month's last day, so day 31
    /// means "the last day of the month" in every year.
    ///
    /// # Errors
    ///
    /// Returns [`DaylightError::InvalidMonth`] or [`DaylightError::InvalidDay`] if either is out
    /// of its calendar range.
    pub fn fixed(month: u32, day: u32, time_of_day: NaiveTime) -> Result<Self, DaylightError> {
        validate_month(month)?;
        if !(1..=31).contains(&day) {
            return Err(DaylightError::InvalidDay(day));
        }

        Ok(Self {
            month,
            time_of_day,
            date: DateRule::Fixed { day },
        })
    }

    /// Creates a transition on the `week`th `weekday` of a month.
    ///
    /// Week [`LAST_WEEK`] selects the last such weekday, whether the month has four or five of
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`DaylightError::InvalidMonth`] or [`DaylightError::InvalidWeek`] if either is
    /// out of range.
    pub fn floating(month: u32, week: u8, weekday: Weekday, time_of_day: NaiveTime) -> Result<Self, DaylightError> {
        validate_month(month)?;
        if !(1..=LAST_WEEK).contains(&week) {
            return Err(DaylightError::InvalidWeek(week));
        }

        Ok(Self {
            month,
            time_of_day,
            date: DateRule::Floating { week, weekday },
        })
    }

    /// The month of the transition, `1..=12`.
    #[must_use]
    pub fn month(&self) -> u32 {
        self.month
    }

    /// The local wall-clock time at which the transition happens.
    #[must_use]
    pub fn time_of_day(&self) -> NaiveTime {
        self.time_of_day
    }

    /// Whether the transition falls on a fixed day of the month.
    #[must_use]
    pub fn is_fixed_date(&self) -> bool {
        matches!(self.date, DateRule::Fixed { .. })
    }

    /// Places the transition in `year`.
    ///
    /// # Errors
    ///
    /// Returns [`DaylightError::YearOutOfRange`] if the resulting date cannot be represented.
    pub fn on(&self, year: i32) -> Result<NaiveDateTime, DaylightError> {
        let date = match self.date {
            DateRule::Fixed { day } => {
                days_in_month(year, self.month).and_then(|last| NaiveDate::from_ymd_opt(year, self.month, day.min(last)))
            }
            DateRule::Floating { week, weekday } => NaiveDate::from_weekday_of_month_opt(year, self.month, weekday, week).or_else(|| {
                // Only four of that weekday this month; the fourth is the last.
                if week == LAST_WEEK {
                    NaiveDate::from_weekday_of_month_opt(year, self.month, weekday, LAST_WEEK - 1)
                } else {
                    None
                }
            }),
        };

        date.map(|date| date.and_time(self.time_of_day))
            .ok_or(DaylightError::YearOutOfRange(year))
    }
}

fn validate_month(month: u32) -> Result<(), DaylightError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(DaylightError::InvalidMonth(month))
    }
}

/// Returns `None` if `year` is outside the representable calendar.
fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;

    Some(match month {
        2 if first.leap_year() => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    })
}
