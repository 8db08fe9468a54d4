// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Name used in telemetry when none is configured.
pub(crate) const DEFAULT_NAME: &str = "unifier";

/// Configuration shared by every unifier flavor.
///
/// Use the builder methods to adjust the defaults, then pass the value to
/// [`Unifier::with_options`](crate::Unifier::with_options),
/// [`WeakUnifier::with_options`](crate::WeakUnifier::with_options) or
/// [`AsyncUnifier::with_options`](crate::AsyncUnifier::with_options).
///
/// # Examples
///
/// ```
/// use std::convert::Infallible;
///
/// use unifier::{Options, Unifier};
///
/// let options = Options::new().name("squares").shard_amount(8).with_logs();
/// let squares = Unifier::with_options(|n: &u64| Ok::<_, Infallible>(n * n), options);
///
/// assert_eq!(squares.name(), "squares");
/// assert_eq!(squares.get(&12), 144);
/// ```
#[derive(Clone, Debug)]
pub struct Options {
    pub(crate) name: &'static str,
    pub(crate) shard_amount: Option<usize>,
    pub(crate) logs_enabled: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME,
            shard_amount: None,
            logs_enabled: false,
        }
    }
}

impl Options {
    /// Creates options with the default name, default sharding and logging disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name that identifies this cache in log output.
    #[must_use]
    pub fn name(self, name: &'static str) -> Self {
        Self { name, ..self }
    }

    /// Sets the number of shards of the key table.
    ///
    /// Keys in different shards never contend with each other, not even for the brief map
    /// operations that install or look up an entry.
    ///
    /// # Panics
    ///
    /// Panics if `shard_amount` is not a power of two greater than 1.
    #[must_use]
    pub fn shard_amount(self, shard_amount: usize) -> Self {
        assert!(
            shard_amount > 1 && shard_amount.is_power_of_two(),
            "shard_amount must be a power of two greater than 1"
        );

        Self {
            shard_amount: Some(shard_amount),
            ..self
        }
    }

    /// Enables structured logging of cache activity via the `tracing` crate.
    #[must_use]
    pub fn with_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }
}
