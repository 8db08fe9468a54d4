// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for [`DaylightWindows`] with real-world adjustment rules.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use daylight::{AdjustmentRule, DaylightError, DaylightWindows, LAST_WEEK, TransitionTime, daylight_time};
use testing_aids::{LogCapture, fan_out};
use unifier::Options;

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn hour(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
}

/// United States since 2007: second Sunday of March to first Sunday of November, 02:00.
fn united_states() -> AdjustmentRule {
    AdjustmentRule::new(
        TransitionTime::floating(3, 2, Weekday::Sun, hour(2)).unwrap(),
        TransitionTime::floating(11, 1, Weekday::Sun, hour(2)).unwrap(),
        60,
    )
    .unwrap()
    .with_effective_years(2007, 9999)
    .unwrap()
}

/// European Union: last Sunday of March to last Sunday of October, 01:00.
fn european_union() -> AdjustmentRule {
    AdjustmentRule::new(
        TransitionTime::floating(3, LAST_WEEK, Weekday::Sun, hour(1)).unwrap(),
        TransitionTime::floating(10, LAST_WEEK, Weekday::Sun, hour(1)).unwrap(),
        60,
    )
    .unwrap()
}

/// New South Wales: first Sunday of October to first Sunday of April.
fn new_south_wales() -> AdjustmentRule {
    AdjustmentRule::new(
        TransitionTime::floating(10, 1, Weekday::Sun, hour(2)).unwrap(),
        TransitionTime::floating(4, 1, Weekday::Sun, hour(3)).unwrap(),
        60,
    )
    .unwrap()
}

#[test]
fn united_states_windows() {
    let windows = DaylightWindows::new(united_states());

    let window = windows.window(2024).unwrap();
    assert_eq!(window.start, at(2024, 3, 10, 2, 0));
    assert_eq!(window.end, at(2024, 11, 3, 2, 0));
    assert_eq!(window.delta, TimeDelta::hours(1));

    let window = windows.window(2023).unwrap();
    assert_eq!(window.start, at(2023, 3, 12, 2, 0));
    assert_eq!(window.end, at(2023, 11, 5, 2, 0));
}

#[test]
fn european_union_windows() {
    let windows = DaylightWindows::new(european_union());

    let window = windows.window(2024).unwrap();
    assert_eq!(window.start, at(2024, 3, 31, 1, 0));
    assert_eq!(window.end, at(2024, 10, 27, 1, 0));

    let window = windows.window(2025).unwrap();
    assert_eq!(window.start, at(2025, 3, 30, 1, 0));
    assert_eq!(window.end, at(2025, 10, 26, 1, 0));
}

#[test]
fn daylight_saving_boundaries() {
    let windows = DaylightWindows::new(united_states());

    assert!(!windows.is_daylight_saving(at(2024, 3, 10, 1, 59)).unwrap());
    assert!(windows.is_daylight_saving(at(2024, 3, 10, 2, 0)).unwrap());
    assert!(windows.is_daylight_saving(at(2024, 7, 4, 12, 0)).unwrap());
    assert!(windows.is_daylight_saving(at(2024, 11, 3, 1, 59)).unwrap());
    assert!(!windows.is_daylight_saving(at(2024, 11, 3, 2, 0)).unwrap());
    assert!(!windows.is_daylight_saving(at(2024, 12, 25, 8, 0)).unwrap());
}

#[test]
fn southern_hemisphere_spans_new_year() {
    let windows = DaylightWindows::new(new_south_wales());

    let window = windows.window(2024).unwrap();
    assert_eq!(window.start, at(2024, 10, 6, 2, 0));
    assert_eq!(window.end, at(2024, 4, 7, 3, 0));

    assert!(windows.is_daylight_saving(at(2024, 1, 15, 12, 0)).unwrap());
    assert!(!windows.is_daylight_saving(at(2024, 6, 21, 12, 0)).unwrap());
    assert!(windows.is_daylight_saving(at(2024, 12, 31, 23, 0)).unwrap());
}

#[test]
fn fixed_date_rule_clamps_to_month_end() {
    let rule = AdjustmentRule::new(
        TransitionTime::fixed(2, 30, hour(0)).unwrap(),
        TransitionTime::fixed(9, 31, hour(0)).unwrap(),
        30,
    )
    .unwrap();

    let leap = daylight_time(2024, &rule).unwrap();
    assert_eq!(leap.start, at(2024, 2, 29, 0, 0));
    assert_eq!(leap.end, at(2024, 9, 30, 0, 0));
    assert_eq!(leap.delta, TimeDelta::minutes(30));

    let common = daylight_time(2023, &rule).unwrap();
    assert_eq!(common.start, at(2023, 2, 28, 0, 0));
}

#[test]
fn years_outside_the_rule_have_no_daylight_saving() {
    let windows = DaylightWindows::new(united_states());

    assert_eq!(windows.window(2006), Err(DaylightError::NotEffective(2006)));
    assert!(!windows.is_daylight_saving(at(2006, 7, 1, 12, 0)).unwrap());
    assert!(windows.is_empty());
}

#[test]
fn years_outside_the_rule_never_reach_the_cache() {
    let windows = DaylightWindows::with_options(united_states(), Options::new().name("daylight").with_logs());

    let capture = LogCapture::new();
    let _guard = tracing::subscriber::set_default(capture.subscriber());

    for _ in 0..3 {
        assert!(!windows.is_daylight_saving(at(1999, 7, 1, 12, 0)).unwrap());
    }

    assert!(windows.is_empty());
    assert_eq!(capture.count_lines_containing("unifier."), 0);
    assert_eq!(capture.count_lines_containing("ERROR"), 0);
}

#[test]
fn unrepresentable_year_is_reported_every_time() {
    let windows = DaylightWindows::new(european_union());

    assert_eq!(windows.window(i32::MAX), Err(DaylightError::YearOutOfRange(i32::MAX)));
    assert_eq!(windows.window(i32::MAX), Err(DaylightError::YearOutOfRange(i32::MAX)));
    assert!(windows.is_empty());
}

#[test]
fn concurrent_queries_agree() {
    let windows = DaylightWindows::new(european_union());

    let results = fan_out(32, |index| {
        let year = 2020 + i32::try_from(index % 4).unwrap();
        (year, windows.window(year).unwrap())
    });

    for (year, window) in results {
        assert_eq!(window, daylight_time(year, windows.rule()).unwrap());
    }
    assert_eq!(windows.len(), 4);
}

#[test]
fn invalidate_and_clear() {
    let windows = DaylightWindows::new(united_states());

    assert!(!windows.invalidate(2024));

    let before = windows.window(2024).unwrap();
    assert!(windows.invalidate(2024));
    assert!(windows.is_empty());
    assert_eq!(windows.window(2024).unwrap(), before);

    windows.window(2025).unwrap();
    assert_eq!(windows.len(), 2);

    windows.clear();
    assert!(windows.is_empty());
}
