// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An unpublished crate containing testing utilities for use within this repo.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Barrier, mpsc};
use std::time::Duration;
use std::{env, process, thread};

mod log;

pub use log::*;

/// If something (whatever) does not happen in a test within this time, the test will fail.
///
/// We are conservative here and allow much time - this is only to break out of deadlocks, not for
/// any situations that are actually expected.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether the tests are running under `cargo mutants`, as signaled by `MUTATION_TESTING=1`.
#[must_use]
pub fn is_mutation_testing() -> bool {
    env::var("MUTATION_TESTING").as_deref() == Ok("1")
}

/// Executes a function on the current thread and sets up a watchdog timer that terminates the
/// process if the function does not complete before [`TEST_TIMEOUT`].
///
/// A deadlocked cache would otherwise hang the whole test run.
///
/// # Panics
///
/// Re-raises any panic of `f`.
#[cfg_attr(test, mutants::skip)] // This is test logic - pointless to mutate.
pub fn execute_or_terminate_process<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    if is_mutation_testing() {
        // Timeouts must surface as real "timeout" mutation results, not as failures.
        return f();
    }

    let (sender, receiver) = mpsc::channel();

    let watchdog = thread::Builder::new()
        .name("test watchdog".to_string())
        .spawn(move || {
            if receiver.recv_timeout(TEST_TIMEOUT) != Ok(()) {
                eprintln!("Test timed out, terminating process.");
                #[expect(
                    clippy::exit,
                    reason = "test harness is intentionally terminating test process that cannot continue execution"
                )]
                // Arbitrary value in portable range (8 bits) to signal "emergency timeout".
                process::exit(112);
            }
        })
        .unwrap();

    let result = catch_unwind(AssertUnwindSafe(f));

    // We signal "done" no matter whether it panics or succeeds, all we care about is timeout.
    sender.send(()).unwrap();
    watchdog.join().unwrap();

    // This will re-raise any panic if one occurred.
    result.unwrap()
}

/// Runs `f` on `threads` threads at once and returns the results ordered by thread index.
///
/// All threads are released together from a barrier, to maximize the chance that they race
/// each other. The whole fan-out is guarded by [`execute_or_terminate_process`].
///
/// # Panics
///
/// Panics if any of the threads panics.
#[cfg_attr(test, mutants::skip)] // This is test logic - pointless to mutate.
pub fn fan_out<F, R>(threads: usize, f: F) -> Vec<R>
where
    F: Fn(usize) -> R + Sync,
    R: Send,
{
    execute_or_terminate_process(|| {
        let start = Barrier::new(threads);

        thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|index| {
                    let f = &f;
                    let start = &start;
                    scope.spawn(move || {
                        start.wait();
                        f(index)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().expect("fan-out thread panicked"))
                .collect()
        })
    })
}
