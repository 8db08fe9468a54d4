// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Demonstrates using `Unifier` to build a per-year table exactly once under concurrency.
//!
//! Many threads ask for the same year at the same time. One of them runs the factory while the
//! others wait for its result, and later lookups are served from the cache. A failing year is
//! reported to everyone who asked and then retried on the next request.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::{Duration, Instant},
};

use unifier::{Options, Unifier};

fn main() {
    // Track how many times the factory actually runs
    let execution_count = AtomicUsize::new(0);

    let table = Unifier::with_options(
        |year: &i32| {
            let count = execution_count.fetch_add(1, Ordering::SeqCst) + 1;
            println!("  Building table for {year}... (execution #{count})");

            // Simulate an expensive derivation
            thread::sleep(Duration::from_millis(500));

            if *year < 1 {
                return Err(format!("year {year} is out of range"));
            }
            Ok(year * 2)
        },
        Options::new().name("year_table"),
    );

    println!("Starting 50 concurrent requests for 2024...\n");

    thread::scope(|scope| {
        for i in 1..=50 {
            let table = &table;
            scope.spawn(move || {
                let start = Instant::now();
                let result = table.get_or_compute(&2024);
                if i % 10 == 0 {
                    println!("  [Request {i}] Got {result:?} in {:?}", start.elapsed());
                }
            });
        }
    });

    println!("\nRequesting year 0, which fails...");
    println!("  First attempt: {:?}", table.get_or_compute(&0));
    println!("  Cached after failure: {:?}", table.peek(&0));
    println!("  Second attempt: {:?}", table.get_or_compute(&0));

    let total_executions = execution_count.load(Ordering::SeqCst);
    println!("\nDone! The factory ran {total_executions} time(s) for 52 requests.");
}
