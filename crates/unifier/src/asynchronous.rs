// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{any::Any, fmt, hash::Hash, panic::AssertUnwindSafe, sync::Arc, time::Instant};

use ahash::RandomState;
use dashmap::{DashMap, mapref::entry::Entry};
use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::{
    Options,
    telemetry::{Activity, Telemetry},
};

#[derive(Clone)]
enum Outcome<V, E> {
    Resolved(V),
    Failed(E),
    Panicked(Arc<str>),
}

/// One computation of a key's value, awaited by every caller interested in it.
type Attempt<V, E> = Shared<BoxFuture<'static, Outcome<V, E>>>;

/// A memoizing cache for asynchronous factories.
///
/// The computation for a key is owned by the cache rather than by the caller that started it. It
/// is driven by whichever callers are currently awaiting it, so dropping one caller's future only
/// abandons that caller's wait: the remaining callers keep the computation going. If every caller
/// goes away, the partially progressed computation stays in the cache and the next caller for the
/// key picks it up where it was left.
///
/// Like [`Unifier`](crate::Unifier), failures are handed to every caller of the failed attempt and
/// then dropped, so the next call runs the factory again. A panicking factory is re-raised in every
/// caller awaiting that attempt and is likewise not remembered.
///
/// The cache does not depend on any particular async runtime.
///
/// # Examples
///
/// ```
/// use std::convert::Infallible;
///
/// use unifier::AsyncUnifier;
///
/// # futures_util::FutureExt::now_or_never(async {
/// let doubled = AsyncUnifier::new(|year: i32| async move { Ok::<_, Infallible>(year * 2) });
///
/// assert_eq!(doubled.get_or_compute(&2024).await, Ok(4048));
/// # }).expect("ready futures complete immediately");
/// ```
pub struct AsyncUnifier<K, V, E, F> {
    attempts: DashMap<K, Attempt<V, E>, RandomState>,
    factory: Arc<F>,
    telemetry: Telemetry,
}

impl<K, V, E, F, Fut> AsyncUnifier<K, V, E, F>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    /// Creates a cache bound to `factory` with default [`Options`].
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self::with_options(factory, Options::default())
    }

    /// Creates a cache bound to `factory` with the given [`Options`].
    #[must_use]
    pub fn with_options(factory: F, options: Options) -> Self {
        let attempts = match options.shard_amount {
            Some(shard_amount) => DashMap::with_hasher_and_shard_amount(RandomState::new(), shard_amount),
            None => DashMap::with_hasher(RandomState::new()),
        };

        Self {
            attempts,
            factory: Arc::new(factory),
            telemetry: Telemetry::new(&options),
        }
    }

    /// Returns the value for `key`, starting the factory if no value is cached or in progress.
    ///
    /// # Errors
    ///
    /// Returns the factory's error, unchanged, if the attempt this call awaited failed. The failure
    /// is not cached; a later call tries again.
    ///
    /// # Panics
    ///
    /// Panics if the factory panicked during the attempt this call awaited.
    pub async fn get_or_compute(&self, key: &K) -> Result<V, E> {
        if let Some(value) = self.peek(key) {
            self.telemetry.record(Activity::Hit, None);
            return Ok(value);
        }

        let attempt = self.join(key);

        match attempt.clone().await {
            Outcome::Resolved(value) => Ok(value),
            Outcome::Failed(error) => {
                self.forget(key, &attempt);
                Err(error)
            }
            Outcome::Panicked(message) => {
                self.forget(key, &attempt);
                self.resume_panic(&message)
            }
        }
    }

    fn join(&self, key: &K) -> Attempt<V, E> {
        match self.attempts.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                if !matches!(current.peek(), Some(Outcome::Failed(_) | Outcome::Panicked(_))) {
                    self.telemetry.record(Activity::Joined, None);
                    return current.clone();
                }

                // Landed badly but not removed yet; this caller is not part of that attempt.
                let fresh = self.launch(key);
                occupied.insert(fresh.clone());
                fresh
            }
            Entry::Vacant(vacant) => {
                self.telemetry.record(Activity::Miss, None);
                let fresh = self.launch(key);
                vacant.insert(fresh.clone());
                fresh
            }
        }
    }

    /// Wraps the factory call for `key` into a shareable attempt. Nothing runs until it is polled.
    fn launch(&self, key: &K) -> Attempt<V, E> {
        let factory = Arc::clone(&self.factory);
        let telemetry = self.telemetry.clone();
        let key = key.clone();

        async move {
            let started = Instant::now();
            let computation = AssertUnwindSafe(async move { factory(key).await });

            match computation.catch_unwind().await {
                Ok(Ok(value)) => {
                    telemetry.record(Activity::Computed, Some(started.elapsed()));
                    Outcome::Resolved(value)
                }
                Ok(Err(error)) => {
                    telemetry.record(Activity::Failed, Some(started.elapsed()));
                    Outcome::Failed(error)
                }
                Err(payload) => {
                    telemetry.record(Activity::Panicked, Some(started.elapsed()));
                    Outcome::Panicked(panic_message(payload.as_ref()))
                }
            }
        }
        .boxed()
        .shared()
    }

    fn forget(&self, key: &K, attempt: &Attempt<V, E>) {
        self.attempts.remove_if(key, |_, current| current.ptr_eq(attempt));
    }

    #[expect(clippy::panic, reason = "a panicking factory is re-raised in every caller that awaited it")]
    fn resume_panic(&self, message: &str) -> ! {
        panic!("factory of unifier `{}` panicked: {message}", self.telemetry.name())
    }

    /// Returns the cached value for `key` without starting or awaiting a computation.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<V> {
        let attempt = self.attempts.get(key)?;
        match attempt.peek() {
            Some(Outcome::Resolved(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Forgets the entry for `key`, returning whether there was one.
    ///
    /// Callers already awaiting a computation for the key still receive its outcome, but the
    /// outcome is not cached.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.attempts.remove(key).is_some();
        if removed {
            self.telemetry.record(Activity::Invalidated, None);
        }
        removed
    }

    /// Forgets every entry.
    pub fn clear(&self) {
        self.attempts.clear();
        self.telemetry.record(Activity::Cleared, None);
    }

    /// Returns the number of entries, counting computations in progress.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Returns the name configured via [`Options::name`].
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.telemetry.name()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> Arc<str> {
    if let Some(message) = payload.downcast_ref::<&str>() {
        Arc::from(*message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        Arc::from(message.as_str())
    } else {
        Arc::from("opaque panic payload")
    }
}

impl<K, V, E, F> fmt::Debug for AsyncUnifier<K, V, E, F>
where
    K: Hash + Eq + fmt::Debug,
    V: Clone,
    E: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncUnifier")
            .field("name", &self.telemetry.name())
            .field("attempts", &AttemptsDebug(&self.attempts))
            .finish_non_exhaustive()
    }
}

struct AttemptsDebug<'a, K, V, E>(&'a DashMap<K, Attempt<V, E>, RandomState>);

impl<K, V, E> fmt::Debug for AttemptsDebug<'_, K, V, E>
where
    K: Hash + Eq + fmt::Debug,
    V: Clone,
    E: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for entry in self.0.iter() {
            let state = match entry.value().peek() {
                None => "Pending",
                Some(Outcome::Resolved(_)) => "Resolved",
                Some(Outcome::Failed(_)) => "Failed",
                Some(Outcome::Panicked(_)) => "Panicked",
            };
            map.entry(entry.key(), &state);
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_extracts_strings() {
        let literal: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(&*panic_message(literal.as_ref()), "boom");

        let formatted: Box<dyn Any + Send> = Box::new(format!("boom {}", 2));
        assert_eq!(&*panic_message(formatted.as_ref()), "boom 2");

        let opaque: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(&*panic_message(opaque.as_ref()), "opaque panic payload");
    }
}
