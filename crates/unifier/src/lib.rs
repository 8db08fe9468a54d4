// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Concurrent memoizing caches that compute each key's value at most once.
//!
//! A unifier sits between callers asking for the value of a key and an expensive, pure function
//! (the *factory*) that derives that value. The first caller to ask for a key runs the factory;
//! every caller that asks while it runs waits for that same computation instead of starting its
//! own, and every later caller is served the cached value.
//!
//! # Flavors
//!
//! - [`Unifier`] blocks waiting threads. Resolved values live as long as the cache.
//! - [`WeakUnifier`] hands out `Arc<T>` and keeps only a weak reference, so values are recomputed
//!   once nobody holds them anymore.
//! - [`AsyncUnifier`] takes a factory returning a future. The computation belongs to the cache, so
//!   cancelling one caller never aborts the work other callers are waiting on.
//!
//! # Failures
//!
//! Factory errors are not memoized. An error is delivered, unchanged, to every caller of the
//! attempt that produced it, and the key's entry is dropped so that the next call runs the factory
//! again. A transient failure therefore never turns into a permanent one.
//!
//! # Example
//!
//! ```
//! use std::{
//!     convert::Infallible,
//!     sync::atomic::{AtomicUsize, Ordering},
//!     thread,
//! };
//!
//! use unifier::Unifier;
//!
//! let calls = AtomicUsize::new(0);
//! let doubled = Unifier::new(|year: &i32| {
//!     calls.fetch_add(1, Ordering::Relaxed);
//!     Ok::<_, Infallible>(year * 2)
//! });
//!
//! thread::scope(|scope| {
//!     for _ in 0..8 {
//!         scope.spawn(|| assert_eq!(doubled.get(&2024), 4048));
//!     }
//! });
//!
//! assert_eq!(calls.load(Ordering::Relaxed), 1);
//! ```
//!
//! # Logging
//!
//! Caches created with [`Options::with_logs`] report hits, misses, computations, failures and
//! invalidations as structured [`tracing`] events named `unifier.event`.
//!
//! [`tracing`]: https://docs.rs/tracing

mod asynchronous;
mod blocking;
mod flight;
mod options;
mod telemetry;
mod weak;

pub use asynchronous::AsyncUnifier;
pub use blocking::Unifier;
pub use options::Options;
pub use weak::WeakUnifier;
