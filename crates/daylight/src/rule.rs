// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::RangeInclusive;

use chrono::TimeDelta;

use crate::{DaylightError, TransitionTime};

/// Daylight deltas are bounded the same way as UTC offsets.
const MAX_DELTA_MINUTES: i64 = 14 * 60;

/// When daylight saving starts and ends, and by how much it moves the clock.
///
/// A rule may be restricted to a range of years, outside of which it does not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentRule {
    start: TransitionTime,
    end: TransitionTime,
    delta: TimeDelta,
    effective_years: Option<RangeInclusive<i32>>,
}

impl AdjustmentRule {
    /// Creates a rule that applies to every year.
    ///
    /// # Errors
    ///
    /// Returns [`DaylightError::IdenticalTransitions`] if `start` and `end` are the same
    /// transition, and [`DaylightError::InvalidDelta`] if `delta_minutes` exceeds 14 hours in
    /// either direction.
    pub fn new(start: TransitionTime, end: TransitionTime, delta_minutes: i64) -> Result<Self, DaylightError> {
        if start == end {
            return Err(DaylightError::IdenticalTransitions);
        }

        let delta = TimeDelta::try_minutes(delta_minutes)
            .filter(|delta| delta.num_minutes().abs() <= MAX_DELTA_MINUTES)
            .ok_or(DaylightError::InvalidDelta(delta_minutes))?;

        Ok(Self {
            start,
            end,
            delta,
            effective_years: None,
        })
    }

    /// Restricts the rule to the years `first..=last`.
    ///
    /// # Errors
    ///
    /// Returns [`DaylightError::EmptyEffectiveYears`] if `first` is after `last`.
    pub fn with_effective_years(self, first: i32, last: i32) -> Result<Self, DaylightError> {
        if first > last {
            return Err(DaylightError::EmptyEffectiveYears { first, last });
        }

        Ok(Self {
            effective_years: Some(first..=last),
            ..self
        })
    }

    /// When daylight saving starts.
    #[must_use]
    pub fn daylight_start(&self) -> &TransitionTime {
        &self.start
    }

    /// When daylight saving ends.
    #[must_use]
    pub fn daylight_end(&self) -> &TransitionTime {
        &self.end
    }

    /// How far clocks move when daylight saving starts.
    #[must_use]
    pub fn daylight_delta(&self) -> TimeDelta {
        self.delta
    }

    /// The years the rule is restricted to, if any.
    #[must_use]
    pub fn effective_years(&self) -> Option<&RangeInclusive<i32>> {
        self.effective_years.as_ref()
    }

    /// Whether the rule applies to `year`.
    #[must_use]
    pub fn is_effective_in(&self, year: i32) -> bool {
        self.effective_years.as_ref().is_none_or(|years| years.contains(&year))
    }
}
