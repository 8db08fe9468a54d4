// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// An error raised while building an adjustment rule or computing a daylight window from one.
///
/// Errors are cheap to clone, so a failed window computation can be handed to every caller that
/// waited for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DaylightError {
    /// The month of a transition is not in `1..=12`.
    #[error("month {0} is not in 1..=12")]
    InvalidMonth(u32),

    /// The day of a fixed-date transition is not in `1..=31`.
    #[error("day {0} is not in 1..=31")]
    InvalidDay(u32),

    /// The week of a floating transition is not in `1..=5`.
    #[error("week {0} is not in 1..=5")]
    InvalidWeek(u8),

    /// The daylight delta is not within fourteen hours either way.
    #[error("daylight delta of {0} minutes is not within 14 hours")]
    InvalidDelta(i64),

    /// Daylight saving starts and ends with the same transition, so it never applies.
    #[error("daylight saving starts and ends with the same transition")]
    IdenticalTransitions,

    /// The effective years of a rule form an empty range.
    #[error("effective years {first}..={last} are empty")]
    EmptyEffectiveYears {
        /// First year requested.
        first: i32,
        /// Last year requested.
        last: i32,
    },

    /// A transition cannot be placed in the year because the date is not representable.
    #[error("year {0} is out of the representable range")]
    YearOutOfRange(i32),

    /// The rule does not apply to the year.
    #[error("the adjustment rule is not in effect in {0}")]
    NotEffective(i32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        assert_eq!(DaylightError::InvalidMonth(13).to_string(), "month 13 is not in 1..=12");
        assert_eq!(DaylightError::InvalidWeek(0).to_string(), "week 0 is not in 1..=5");
        assert_eq!(
            DaylightError::EmptyEffectiveYears { first: 2010, last: 2000 }.to_string(),
            "effective years 2010..=2000 are empty"
        );
        assert_eq!(
            DaylightError::NotEffective(1999).to_string(),
            "the adjustment rule is not in effect in 1999"
        );
    }
}
