// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Daylight saving windows computed from adjustment rules.
//!
//! An [`AdjustmentRule`] says when daylight saving starts and ends in terms of
//! [`TransitionTime`]s such as "the second Sunday of March at 02:00". [`daylight_time`] places a
//! rule in a concrete year, and [`DaylightWindows`] remembers the result per year so that
//! repeated queries, from any number of threads, compute each year's window only once.
//!
//! # Example
//!
//! ```
//! use chrono::{NaiveDate, NaiveTime, Weekday};
//! use daylight::{AdjustmentRule, DaylightWindows, TransitionTime};
//!
//! let two_am = NaiveTime::from_hms_opt(2, 0, 0).unwrap();
//! let rule = AdjustmentRule::new(
//!     TransitionTime::floating(3, 2, Weekday::Sun, two_am)?,
//!     TransitionTime::floating(11, 1, Weekday::Sun, two_am)?,
//!     60,
//! )?
//! .with_effective_years(2007, 9999)?;
//!
//! let windows = DaylightWindows::new(rule);
//! let window = windows.window(2024)?;
//!
//! assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_time(two_am));
//! assert_eq!(window.end, NaiveDate::from_ymd_opt(2024, 11, 3).unwrap().and_time(two_am));
//! # Ok::<(), daylight::DaylightError>(())
//! ```

mod error;
mod rule;
mod transition;
mod window;

pub use error::DaylightError;
pub use rule::AdjustmentRule;
pub use transition::{LAST_WEEK, TransitionTime};
pub use window::{DaylightTime, DaylightWindows, daylight_time};
