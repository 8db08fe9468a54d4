// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logging of cache activity.
//!
//! Logging is opt-in via [`Options::with_logs`]. Every event carries the cache name, the
//! activity and, for computations, how long the factory ran.

use std::time::Duration;

use crate::Options;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Activity {
    /// A resolved value was served without waiting.
    Hit,
    /// A new entry was installed for a key.
    Miss,
    /// A caller adopted the outcome of a computation run by another caller.
    Joined,
    /// The factory produced a value.
    Computed,
    /// The factory returned an error; the entry was dropped.
    Failed,
    /// The factory panicked.
    Panicked,
    /// A weakly held value was gone and its entry was replaced.
    Stale,
    /// Entries whose weakly held values were gone were removed in bulk.
    Pruned,
    Invalidated,
    Cleared,
}

impl Activity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "unifier.hit",
            Self::Miss => "unifier.miss",
            Self::Joined => "unifier.joined",
            Self::Computed => "unifier.computed",
            Self::Failed => "unifier.failed",
            Self::Panicked => "unifier.panicked",
            Self::Stale => "unifier.stale",
            Self::Pruned => "unifier.pruned",
            Self::Invalidated => "unifier.invalidated",
            Self::Cleared => "unifier.cleared",
        }
    }

    fn severity(self) -> Severity {
        match self {
            Self::Hit | Self::Miss | Self::Joined => Severity::Debug,
            Self::Computed | Self::Stale | Self::Pruned | Self::Invalidated | Self::Cleared => Severity::Info,
            Self::Failed | Self::Panicked => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Debug,
    Info,
    Error,
}

#[derive(Clone, Debug)]
pub(crate) struct Telemetry {
    name: &'static str,
    logs_enabled: bool,
}

impl Telemetry {
    pub fn new(options: &Options) -> Self {
        Self {
            name: options.name,
            logs_enabled: options.logs_enabled,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn record(&self, activity: Activity, duration: Option<Duration>) {
        if self.logs_enabled {
            Self::emit(self.name, activity, duration);
        }
    }

    fn emit(name: &'static str, activity: Activity, duration: Option<Duration>) {
        let activity_name = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());

        // Field names must match the ones asserted in `emit_contains_all_fields_and_values`.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    unifier.name = name,
                    unifier.activity = activity_name,
                    unifier.duration_ns = ?duration_ns,
                    "unifier.event"
                )
            };
        }

        match activity.severity() {
            Severity::Error => emit_event!(error),
            Severity::Info => emit_event!(info),
            Severity::Debug => emit_event!(debug),
        }
    }
}

#[cfg(test)]
mod tests {
    use testing_aids::LogCapture;

    use super::*;

    const UNIFIER_NAME: &str = "unifier.name";
    const UNIFIER_ACTIVITY: &str = "unifier.activity";
    const UNIFIER_DURATION: &str = "unifier.duration_ns";
    const UNIFIER_EVENT: &str = "unifier.event";

    #[test]
    fn activity_as_str() {
        assert_eq!(Activity::Hit.as_str(), "unifier.hit");
        assert_eq!(Activity::Miss.as_str(), "unifier.miss");
        assert_eq!(Activity::Joined.as_str(), "unifier.joined");
        assert_eq!(Activity::Computed.as_str(), "unifier.computed");
        assert_eq!(Activity::Failed.as_str(), "unifier.failed");
        assert_eq!(Activity::Panicked.as_str(), "unifier.panicked");
        assert_eq!(Activity::Stale.as_str(), "unifier.stale");
        assert_eq!(Activity::Pruned.as_str(), "unifier.pruned");
        assert_eq!(Activity::Invalidated.as_str(), "unifier.invalidated");
        assert_eq!(Activity::Cleared.as_str(), "unifier.cleared");
    }

    #[test]
    fn emit_contains_all_fields_and_values() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        Telemetry::emit("years", Activity::Computed, Some(Duration::from_nanos(4048)));

        capture.assert_contains(UNIFIER_NAME);
        capture.assert_contains(UNIFIER_ACTIVITY);
        capture.assert_contains(UNIFIER_DURATION);
        capture.assert_contains(UNIFIER_EVENT);

        capture.assert_contains("years");
        capture.assert_contains(Activity::Computed.as_str());
        capture.assert_contains("4048");
    }

    #[test]
    fn emit_at_activity_severity() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        Telemetry::emit("years", Activity::Failed, None);
        capture.assert_contains("ERROR");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        Telemetry::emit("years", Activity::Invalidated, None);
        capture.assert_contains("INFO");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        Telemetry::emit("years", Activity::Hit, None);
        capture.assert_contains("DEBUG");
    }

    #[test]
    fn disabled_logs_emit_nothing() {
        let telemetry = Telemetry::new(&Options::new());

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        telemetry.record(Activity::Failed, Some(Duration::from_secs(1)));

        assert!(capture.output().is_empty());
    }

    #[test]
    fn enabled_logs_use_configured_name() {
        let telemetry = Telemetry::new(&Options::new().name("time_zones").with_logs());
        assert_eq!(telemetry.name(), "time_zones");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        telemetry.record(Activity::Miss, None);

        capture.assert_contains("time_zones");
        capture.assert_contains(Activity::Miss.as_str());
    }
}
