// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{convert::Infallible, fmt, hash::Hash};

use crate::{
    Options,
    flight::{Strong, Table},
};

/// A concurrent memoizing cache that runs its factory at most once per key.
///
/// The factory is bound at construction and must be a pure function of the key: whichever
/// caller wins the race for a key runs it, and every other caller adopts that outcome.
///
/// Failures are not memoized. When the factory returns an error, that error is handed to the
/// caller that ran the factory and to every caller that was already waiting on the same attempt,
/// and the key's entry is dropped so that the next call runs the factory again.
///
/// # Examples
///
/// ```
/// use std::convert::Infallible;
///
/// use unifier::Unifier;
///
/// let doubled = Unifier::new(|year: &i32| Ok::<_, Infallible>(year * 2));
///
/// assert_eq!(doubled.get_or_compute(&2024), Ok(4048));
/// assert_eq!(doubled.peek(&2024), Some(4048));
/// ```
pub struct Unifier<K, V, E, F> {
    table: Table<K, V, V, E>,
    factory: F,
}

impl<K, V, E, F> Unifier<K, V, E, F>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
    F: Fn(&K) -> Result<V, E>,
{
    /// Creates a cache bound to `factory` with default [`Options`].
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self::with_options(factory, Options::default())
    }

    /// Creates a cache bound to `factory` with the given [`Options`].
    #[must_use]
    pub fn with_options(factory: F, options: Options) -> Self {
        Self {
            table: Table::new(&options),
            factory,
        }
    }

    /// Returns the value for `key`, running the factory if no value is cached yet.
    ///
    /// If several threads ask for the same uncached key at once, exactly one of them runs the
    /// factory while the others block until it finishes. Resolved values are served from the
    /// cache for the lifetime of the cache, or until [`invalidate`](Self::invalidate) is called.
    ///
    /// # Errors
    ///
    /// Returns the factory's error, unchanged, if the attempt this call ran or waited on failed.
    /// The failure is not cached; a later call tries again.
    ///
    /// # Panics
    ///
    /// Propagates a panic from the factory if this call ran it. Callers waiting on that attempt
    /// do not panic; one of them runs the factory instead.
    pub fn get_or_compute(&self, key: &K) -> Result<V, E> {
        self.table.get_or_compute::<Strong, _>(key, &self.factory)
    }

    /// Returns the cached value for `key` without computing it or waiting for a computation.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<V> {
        self.table.peek::<Strong>(key)
    }

    /// Forgets the entry for `key`, returning whether there was one.
    ///
    /// A computation that is already running still completes and is delivered to the callers
    /// waiting on it, but its value is not cached.
    pub fn invalidate(&self, key: &K) -> bool {
        self.table.invalidate(key)
    }

    /// Forgets every entry.
    pub fn clear(&self) {
        self.table.clear();
    }

    /// Returns the number of entries, counting computations in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the name configured via [`Options::name`].
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.table.name()
    }
}

impl<K, V, F> Unifier<K, V, Infallible, F>
where
    K: Hash + Eq + Clone,
    V: Clone,
    F: Fn(&K) -> Result<V, Infallible>,
{
    /// Returns the value for `key` from a factory that cannot fail.
    pub fn get(&self, key: &K) -> V {
        match self.get_or_compute(key) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<K, V, E, F> fmt::Debug for Unifier<K, V, E, F>
where
    K: Hash + Eq + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unifier").field("table", &self.table).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn failed_attempt_is_not_kept() {
        let calls = Cell::new(0);
        let unifier = Unifier::new(|key: &u8| {
            calls.set(calls.get() + 1);
            if calls.get() == 1 { Err("first attempt fails") } else { Ok(*key) }
        });

        assert_eq!(unifier.get_or_compute(&7), Err("first attempt fails"));
        assert!(unifier.is_empty());

        assert_eq!(unifier.get_or_compute(&7), Ok(7));
        assert_eq!(unifier.len(), 1);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn peek_never_computes() {
        let calls = AtomicUsize::new(0);
        let unifier = Unifier::new(|key: &u8| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok::<_, Infallible>(*key)
        });

        assert_eq!(unifier.peek(&1), None);
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert!(unifier.is_empty());
    }

    #[test]
    fn debug_lists_flights() {
        let unifier = Unifier::with_options(|key: &&str| Ok::<_, Infallible>(key.len()), Options::new().name("lengths"));
        unifier.get(&"tuesday");

        let debug = format!("{unifier:?}");
        assert!(debug.contains("Unifier"));
        assert!(debug.contains("lengths"));
        assert!(debug.contains("tuesday"));
        assert!(debug.contains("Resolved"));
    }
}
