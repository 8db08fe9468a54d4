// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    convert::Infallible,
    fmt,
    hash::Hash,
    sync::{Arc, Weak},
};

use crate::{
    Options,
    flight::{Table, Weakly},
};

/// A memoizing cache that only keeps values alive while someone else does.
///
/// Values are handed out as `Arc<T>` and the cache holds a [`Weak`] reference to each of them.
/// As long as any caller keeps an `Arc` for a key, every lookup of that key returns the same
/// instance. Once the last `Arc` is dropped the entry goes stale and the next lookup runs the
/// factory again, with the same single-flight and failure semantics as [`Unifier`](crate::Unifier).
///
/// This suits tables that unify large, identity-sensitive values (such as type descriptors)
/// that should not outlive their users.
///
/// # Examples
///
/// ```
/// use std::{convert::Infallible, sync::Arc};
///
/// use unifier::WeakUnifier;
///
/// let names = WeakUnifier::new(|id: &u32| Ok::<_, Infallible>(Arc::new(format!("type#{id}"))));
///
/// let first = names.get(&7);
/// let second = names.get(&7);
/// assert!(Arc::ptr_eq(&first, &second));
///
/// drop((first, second));
/// assert_eq!(names.peek(&7), None);
/// ```
pub struct WeakUnifier<K, T, E, F> {
    table: Table<K, Weak<T>, Arc<T>, E>,
    factory: F,
}

impl<K, T, E, F> WeakUnifier<K, T, E, F>
where
    K: Hash + Eq + Clone,
    E: Clone,
    F: Fn(&K) -> Result<Arc<T>, E>,
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

    /// Returns the live value for `key`, running the factory if there is none.
    ///
    /// # Errors
    ///
    /// Returns the factory's error, unchanged, if the attempt this call ran or waited on failed.
    /// The failure is not cached; a later call tries again.
    ///
    /// # Panics
    ///
    /// Propagates a panic from the factory if this call ran it.
    pub fn get_or_compute(&self, key: &K) -> Result<Arc<T>, E> {
        self.table.get_or_compute::<Weakly, _>(key, &self.factory)
    }

    /// Returns the live value for `key` without computing it or waiting for a computation.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<Arc<T>> {
        self.table.peek::<Weakly>(key)
    }

    /// Forgets the entry for `key`, returning whether there was one.
    ///
    /// Values already handed out stay valid; later lookups produce a new instance.
    pub fn invalidate(&self, key: &K) -> bool {
        self.table.invalidate(key)
    }

    /// Forgets every entry.
    pub fn clear(&self) {
        self.table.clear();
    }

    /// Removes the entries whose values have been dropped by all of their holders, returning how
    /// many were removed.
    ///
    /// Dead entries are also pruned automatically whenever the table has doubled in size since the
    /// last pruning, so calling this is only needed to shrink the table right away.
    pub fn prune(&self) -> usize {
        self.table.prune::<Weakly>()
    }

    /// Returns the number of entries, including dead ones that have not been pruned or replaced yet.
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

impl<K, T, F> WeakUnifier<K, T, Infallible, F>
where
    K: Hash + Eq + Clone,
    F: Fn(&K) -> Result<Arc<T>, Infallible>,
{
    /// Returns the live value for `key` from a factory that cannot fail.
    pub fn get(&self, key: &K) -> Arc<T> {
        match self.get_or_compute(key) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<K, T, E, F> fmt::Debug for WeakUnifier<K, T, E, F>
where
    K: Hash + Eq + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakUnifier").field("table", &self.table).finish_non_exhaustive()
    }
}
