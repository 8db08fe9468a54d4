// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-key flights and the sharded table that holds them.
//!
//! A flight is the cache entry for one key. Its `gate` is held by whichever caller runs the
//! factory, so every other caller for the same key parks on the gate until the outcome is known.
//! The gate is never acquired while a shard of the table is locked, which keeps the table free for
//! unrelated keys and lets the leader remove its own entry after a failure.
//!
//! A resolved value is parked on the gate until every caller seated on that flight has picked it
//! up. Callers that waited therefore never depend on the table's retention of the value, which for
//! weakly held values may already be gone by the time they wake.

use std::{
    fmt,
    hash::Hash,
    sync::{
        Arc, OnceLock, Weak,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Instant,
};

use ahash::RandomState;
use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::{Mutex, MutexGuard};

use crate::{
    Options,
    telemetry::{Activity, Telemetry},
};

/// Tables with ephemeral retention are not pruned while smaller than this.
const PRUNE_FLOOR: usize = 64;

/// How a resolved value is held by the table.
pub(crate) trait Retention<V> {
    type Stored;

    /// Whether stored values can vanish on their own, leaving dead entries behind.
    const EPHEMERAL: bool = false;

    fn retain(value: &V) -> Self::Stored;

    /// Returns `None` if the stored form no longer yields a value.
    fn recall(stored: &Self::Stored) -> Option<V>;

    /// Like `recall(stored).is_some()`, without producing (and later dropping) a value.
    fn is_live(_stored: &Self::Stored) -> bool {
        true
    }
}

/// Keeps a clone of every resolved value.
#[derive(Debug)]
pub(crate) struct Strong;

impl<V: Clone> Retention<V> for Strong {
    type Stored = V;

    fn retain(value: &V) -> V {
        value.clone()
    }

    fn recall(stored: &V) -> Option<V> {
        Some(stored.clone())
    }
}

/// Keeps resolved values only for as long as someone else holds them.
#[derive(Debug)]
pub(crate) struct Weakly;

impl<T> Retention<Arc<T>> for Weakly {
    type Stored = Weak<T>;

    const EPHEMERAL: bool = true;

    fn retain(value: &Arc<T>) -> Weak<T> {
        Arc::downgrade(value)
    }

    fn recall(stored: &Weak<T>) -> Option<Arc<T>> {
        stored.upgrade()
    }

    fn is_live(stored: &Weak<T>) -> bool {
        stored.strong_count() > 0
    }
}

enum Attempt<V, E> {
    /// Nobody has produced an outcome yet, or the last leader panicked.
    Open,
    /// Held for the callers still seated on the flight.
    Resolved(V),
    /// Every seated caller has taken the value; later callers recall it from the table.
    Released,
    Failed(E),
}

pub(crate) struct Flight<S, V, E> {
    stored: OnceLock<S>,
    gate: Mutex<Attempt<V, E>>,
    // Callers between `Table::join` and the end of their `Seat`.
    seated: AtomicUsize,
    // Set before the entry is removed so that late joiners start a fresh flight.
    failed: AtomicBool,
}

impl<S, V, E> Flight<S, V, E> {
    fn new() -> Self {
        Self {
            stored: OnceLock::new(),
            gate: Mutex::new(Attempt::Open),
            seated: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
        }
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    fn is_stale<R>(&self) -> bool
    where
        R: Retention<V, Stored = S>,
    {
        self.stored.get().is_some_and(|stored| !R::is_live(stored))
    }

    /// Takes the gate on behalf of a caller that `join` has already counted in `seated`.
    fn seat(&self) -> Seat<'_, V, E> {
        Seat {
            attempt: self.gate.lock(),
            seated: &self.seated,
        }
    }
}

impl<S, V, E> fmt::Debug for Flight<S, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.stored.get().is_some() {
            "Resolved"
        } else if self.has_failed() {
            "Failed"
        } else {
            "Pending"
        };

        f.debug_tuple("Flight").field(&state).finish()
    }
}

/// A caller's hold on a flight's gate.
///
/// The last caller to leave a flight releases the value parked on the gate, also when it leaves
/// by unwinding out of the factory.
struct Seat<'a, V, E> {
    attempt: MutexGuard<'a, Attempt<V, E>>,
    seated: &'a AtomicUsize,
}

impl<V, E> Drop for Seat<'_, V, E> {
    fn drop(&mut self) {
        if self.seated.fetch_sub(1, Ordering::AcqRel) == 1 && matches!(*self.attempt, Attempt::Resolved(_)) {
            *self.attempt = Attempt::Released;
        }
    }
}

type Flights<K, S, V, E> = DashMap<K, Arc<Flight<S, V, E>>, RandomState>;

/// The key table shared by [`Unifier`](crate::Unifier) and [`WeakUnifier`](crate::WeakUnifier).
///
/// `S` is the stored form of a resolved value `V`; the [`Retention`] passed to each lookup turns
/// it back into a value.
pub(crate) struct Table<K, S, V, E> {
    flights: Flights<K, S, V, E>,
    // Size at which the next insertion prunes dead entries.
    prune_at: AtomicUsize,
    telemetry: Telemetry,
}

impl<K, S, V, E> Table<K, S, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    pub fn new(options: &Options) -> Self {
        let flights = match options.shard_amount {
            Some(shard_amount) => DashMap::with_hasher_and_shard_amount(RandomState::new(), shard_amount),
            None => DashMap::with_hasher(RandomState::new()),
        };

        Self {
            flights,
            prune_at: AtomicUsize::new(PRUNE_FLOOR),
            telemetry: Telemetry::new(options),
        }
    }

    pub fn name(&self) -> &'static str {
        self.telemetry.name()
    }

    pub fn get_or_compute<R, F>(&self, key: &K, factory: F) -> Result<V, E>
    where
        R: Retention<V, Stored = S>,
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(value) = self.peek::<R>(key) {
            self.telemetry.record(Activity::Hit, None);
            return Ok(value);
        }

        loop {
            let (flight, installed) = self.join::<R>(key);
            if installed {
                self.prune_when_grown::<R>();
            }

            let mut seat = flight.seat();

            match &*seat.attempt {
                Attempt::Resolved(value) => {
                    let value = value.clone();
                    drop(seat);
                    self.telemetry.record(Activity::Joined, None);
                    return Ok(value);
                }
                Attempt::Released => {
                    let recalled = flight.stored.get().and_then(R::recall);
                    drop(seat);
                    match recalled {
                        Some(value) => {
                            self.telemetry.record(Activity::Joined, None);
                            return Ok(value);
                        }
                        // Dropped by its last holder since we joined; `join` replaces the entry.
                        None => continue,
                    }
                }
                Attempt::Failed(error) => {
                    let error = error.clone();
                    drop(seat);
                    self.telemetry.record(Activity::Joined, None);
                    return Err(error);
                }
                Attempt::Open => {}
            }

            // Either nobody ran the factory yet or the previous leader panicked. We lead now.
            let started = Instant::now();
            return match factory(key) {
                Ok(value) => {
                    // The gate is held, so nobody else can have published a value.
                    _ = flight.stored.set(R::retain(&value));
                    *seat.attempt = Attempt::Resolved(value.clone());
                    drop(seat);
                    self.telemetry.record(Activity::Computed, Some(started.elapsed()));
                    Ok(value)
                }
                Err(error) => {
                    *seat.attempt = Attempt::Failed(error.clone());
                    flight.failed.store(true, Ordering::Release);
                    drop(seat);
                    self.flights.remove_if(key, |_, current| Arc::ptr_eq(current, &flight));
                    self.telemetry.record(Activity::Failed, Some(started.elapsed()));
                    Err(error)
                }
            };
        }
    }

    /// Returns the flight for `key` with the caller counted as seated on it, installing a fresh
    /// flight if the key has no usable entry. The flag tells whether the key was vacant.
    ///
    /// Every call must be followed by [`Flight::seat`].
    fn join<R>(&self, key: &K) -> (Arc<Flight<S, V, E>>, bool)
    where
        R: Retention<V, Stored = S>,
    {
        // Counting happens under the shard lock, so a flight is never released while a caller
        // that found it in the table is still on its way to the gate.
        match self.flights.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();

                let stale = current.is_stale::<R>();
                if !stale && !current.has_failed() {
                    current.seated.fetch_add(1, Ordering::AcqRel);
                    return (Arc::clone(current), false);
                }

                if stale {
                    self.telemetry.record(Activity::Stale, None);
                }

                let fresh = Arc::new(Flight::new());
                fresh.seated.fetch_add(1, Ordering::AcqRel);
                occupied.insert(Arc::clone(&fresh));
                (fresh, false)
            }
            Entry::Vacant(vacant) => {
                self.telemetry.record(Activity::Miss, None);
                let fresh = Arc::new(Flight::new());
                fresh.seated.fetch_add(1, Ordering::AcqRel);
                vacant.insert(Arc::clone(&fresh));
                (fresh, true)
            }
        }
    }

    fn prune_when_grown<R>(&self)
    where
        R: Retention<V, Stored = S>,
    {
        if R::EPHEMERAL && self.flights.len() >= self.prune_at.load(Ordering::Relaxed) {
            self.prune::<R>();
        }
    }

    /// Removes every entry whose value has been dropped by all of its holders.
    ///
    /// Returns the number of entries removed.
    pub fn prune<R>(&self) -> usize
    where
        R: Retention<V, Stored = S>,
    {
        let mut pruned = 0;
        self.flights.retain(|_, flight| {
            let stale = flight.is_stale::<R>();
            if stale {
                pruned += 1;
            }
            !stale
        });

        self.prune_at
            .store(PRUNE_FLOOR.max(self.flights.len().saturating_mul(2)), Ordering::Relaxed);

        if pruned > 0 {
            self.telemetry.record(Activity::Pruned, None);
        }
        pruned
    }

    pub fn peek<R>(&self, key: &K) -> Option<V>
    where
        R: Retention<V, Stored = S>,
    {
        let flight = self.flights.get(key)?;
        flight.stored.get().and_then(R::recall)
    }

    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.flights.remove(key).is_some();
        if removed {
            self.telemetry.record(Activity::Invalidated, None);
        }
        removed
    }

    pub fn clear(&self) {
        self.flights.clear();
        self.telemetry.record(Activity::Cleared, None);
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

impl<K, S, V, E> fmt::Debug for Table<K, S, V, E>
where
    K: Hash + Eq + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.telemetry.name())
            .field("flights", &FlightsDebug(&self.flights))
            .finish()
    }
}

struct FlightsDebug<'a, K, S, V, E>(&'a Flights<K, S, V, E>);

impl<K, S, V, E> fmt::Debug for FlightsDebug<'_, K, S, V, E>
where
    K: Hash + Eq + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for entry in self.0.iter() {
            map.entry(entry.key(), entry.value());
        }
        map.finish()
    }
}
