// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, TimeDelta};
use unifier::{Options, Unifier};

use crate::{AdjustmentRule, DaylightError};

/// The daylight saving window of one year.
///
/// `start` and `end` are local wall-clock times. In the southern hemisphere daylight saving spans
/// the turn of the year, so `end` comes before `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaylightTime {
    /// When daylight saving starts.
    pub start: NaiveDateTime,
    /// When daylight saving ends.
    pub end: NaiveDateTime,
    /// How far clocks move while daylight saving is in effect.
    pub delta: TimeDelta,
}

impl DaylightTime {
    /// Whether `time` falls within daylight saving. The start is inclusive, the end exclusive.
    #[must_use]
    pub fn contains(&self, time: NaiveDateTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// Computes the daylight saving window of `rule` in `year`.
///
/// # Errors
///
/// Returns [`DaylightError::NotEffective`] if the rule does not apply to `year`, and
/// [`DaylightError::YearOutOfRange`] if a transition cannot be placed in it.
pub fn daylight_time(year: i32, rule: &AdjustmentRule) -> Result<DaylightTime, DaylightError> {
    if !rule.is_effective_in(year) {
        return Err(DaylightError::NotEffective(year));
    }

    Ok(DaylightTime {
        start: rule.daylight_start().on(year)?,
        end: rule.daylight_end().on(year)?,
        delta: rule.daylight_delta(),
    })
}

type WindowFactory = Box<dyn Fn(&i32) -> Result<DaylightTime, DaylightError> + Send + Sync>;

/// The daylight saving windows of one adjustment rule, computed at most once per year.
///
/// Any number of threads may ask for the same year at once; one of them computes the window and
/// the rest reuse it. A year that cannot be computed is reported to everyone who asked and is not
/// remembered.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, NaiveTime, Weekday};
/// use daylight::{AdjustmentRule, DaylightWindows, LAST_WEEK, TransitionTime};
///
/// let one_am = NaiveTime::from_hms_opt(1, 0, 0).unwrap();
/// let rule = AdjustmentRule::new(
///     TransitionTime::floating(3, LAST_WEEK, Weekday::Sun, one_am)?,
///     TransitionTime::floating(10, LAST_WEEK, Weekday::Sun, one_am)?,
///     60,
/// )?;
///
/// let windows = DaylightWindows::new(rule);
/// let summer = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap().and_time(one_am);
///
/// assert!(windows.is_daylight_saving(summer)?);
/// # Ok::<(), daylight::DaylightError>(())
/// ```
#[derive(Debug)]
pub struct DaylightWindows {
    rule: Arc<AdjustmentRule>,
    windows: Unifier<i32, DaylightTime, DaylightError, WindowFactory>,
}

impl DaylightWindows {
    /// Creates the window table for `rule`, logging cache activity under the name `daylight`.
    #[must_use]
    pub fn new(rule: AdjustmentRule) -> Self {
        Self::with_options(rule, Options::new().name("daylight"))
    }

    /// Creates the window table for `rule` with custom cache options.
    #[must_use]
    pub fn with_options(rule: AdjustmentRule, options: Options) -> Self {
        let rule = Arc::new(rule);
        let factory_rule = Arc::clone(&rule);

        let factory: WindowFactory = Box::new(move |year: &i32| {
            let window = daylight_time(*year, &factory_rule)?;
            tracing::debug!(year, start = %window.start, end = %window.end, "daylight.window");
            Ok(window)
        });

        Self {
            rule,
            windows: Unifier::with_options(factory, options),
        }
    }

    /// The rule the windows are computed from.
    #[must_use]
    pub fn rule(&self) -> &AdjustmentRule {
        &self.rule
    }

    /// Returns the daylight saving window of `year`, computing it on first use.
    ///
    /// # Errors
    ///
    /// See [`daylight_time`].
    pub fn window(&self, year: i32) -> Result<DaylightTime, DaylightError> {
        self.windows.get_or_compute(&year)
    }

    /// Whether daylight saving is in effect at the local time `time`.
    ///
    /// Years the rule does not apply to have no daylight saving; answering for them never touches
    /// the window table.
    ///
    /// # Errors
    ///
    /// Returns [`DaylightError::YearOutOfRange`] if the window of the year cannot be computed.
    pub fn is_daylight_saving(&self, time: NaiveDateTime) -> Result<bool, DaylightError> {
        let year = time.year();
        if !self.rule.is_effective_in(year) {
            return Ok(false);
        }

        self.window(year).map(|window| window.contains(time))
    }

    /// Forgets the window of `year`, returning whether it was known.
    pub fn invalidate(&self, year: i32) -> bool {
        self.windows.invalidate(&year)
    }

    /// Forgets every window.
    pub fn clear(&self) {
        self.windows.clear();
    }

    /// The number of years whose window is known or being computed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Returns `true` if no window is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
