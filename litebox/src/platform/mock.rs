// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Test-only mock platform for running the socket layer deterministically.
//!
//! Available to this crate's tests, and to other crates' tests through the `mock` feature.

// Pull in `std` for the test-only world, so that we have a nicer/easier time writing tests
extern crate std;

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::string::String;
use std::sync::{Mutex, RwLock};
use std::vec::Vec;

use super::{
    DebugLogProvider, ImmediatelyWokenUp, Instant, Provider, RawMutex, RawMutexProvider,
    TimeProvider, UnblockedOrTimedOut,
};

/// A mock platform that is a [`platform::Provider`](Provider), useful purely for testing.
///
/// - time moves at one millisecond per "now" call, so deadlines expire after a bounded number of
///   clock reads no matter how slow the test machine is
/// - debug output goes to stderr and is also recorded, see [`Self::debug_log`]
pub struct MockPlatform {
    current_time: AtomicU64,
    debug_lines: Mutex<Vec<String>>,
}

impl MockPlatform {
    /// Create a new, leaked, platform.
    pub fn new() -> &'static Self {
        //  Since this is used entirely for tests, leaking a bit of memory is perfectly fine in
        //  order to give ourselves a statically lived platform easily.
        alloc::boxed::Box::leak(alloc::boxed::Box::new(MockPlatform {
            current_time: AtomicU64::new(0),
            debug_lines: Mutex::new(Vec::new()),
        }))
    }

    /// All lines printed through [`DebugLogProvider::debug_log_print`] so far.
    pub fn debug_log(&self) -> Vec<String> {
        self.debug_lines.lock().unwrap().clone()
    }

    /// Move the clock forward without anyone calling `now`.
    pub fn advance(&self, by: core::time::Duration) {
        let millis: u64 = by.as_millis().try_into().unwrap();
        self.current_time.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Provider for MockPlatform {}

pub struct MockRawMutex {
    inner: AtomicU32,
    internal_state: RwLock<MockRawMutexInternalState>,
}

struct MockRawMutexInternalState {
    number_to_wake_up: usize,
    number_blocked: usize,
}

impl MockRawMutex {
    const fn new() -> Self {
        Self {
            inner: AtomicU32::new(0),
            internal_state: RwLock::new(MockRawMutexInternalState {
                number_to_wake_up: 0,
                number_blocked: 0,
            }),
        }
    }

    fn block_or_maybe_timeout(
        &self,
        val: u32,
        timeout: Option<core::time::Duration>,
    ) -> Result<UnblockedOrTimedOut, ImmediatelyWokenUp> {
        // Count ourselves as blocked before looking at the value, so no wake-up is lost.
        self.internal_state.write().unwrap().number_blocked += 1;

        if self.inner.load(Ordering::SeqCst) != val {
            let mut internal_state = self.internal_state.write().unwrap();
            internal_state.number_blocked -= 1;
            if internal_state.number_to_wake_up > 0 {
                internal_state.number_to_wake_up -= 1;
            }
            return Err(ImmediatelyWokenUp);
        }

        let start = std::time::Instant::now();
        loop {
            core::hint::spin_loop();

            if let Some(timeout) = timeout
                && start.elapsed() >= timeout
            {
                let mut internal_state = self.internal_state.write().unwrap();
                internal_state.number_blocked -= 1;
                if internal_state.number_to_wake_up > 0 {
                    // A wake raced with the timeout; take it so the waker is not stuck.
                    internal_state.number_to_wake_up -= 1;
                    break Ok(UnblockedOrTimedOut::Unblocked);
                }
                break Ok(UnblockedOrTimedOut::TimedOut);
            }

            if self.internal_state.read().unwrap().number_to_wake_up == 0 {
                continue;
            }

            let mut internal_state = self.internal_state.write().unwrap();
            if internal_state.number_to_wake_up == 0 {
                // Someone else took the wake-up.
                continue;
            }
            internal_state.number_to_wake_up -= 1;
            internal_state.number_blocked -= 1;
            break Ok(UnblockedOrTimedOut::Unblocked);
        }
    }
}

impl RawMutex for MockRawMutex {
    const INIT: Self = Self::new();

    fn underlying_atomic(&self) -> &AtomicU32 {
        &self.inner
    }

    fn wake_many(&self, n: usize) -> usize {
        let mut internal_state = loop {
            let internal_state = self.internal_state.write().unwrap();
            if internal_state.number_to_wake_up > 0 {
                // A previous wake is still being consumed; wait for our turn.
                drop(internal_state);
                std::thread::yield_now();
                continue;
            }
            break internal_state;
        };
        let num_to_wake_up = internal_state.number_blocked.min(n);
        internal_state.number_to_wake_up = num_to_wake_up;
        num_to_wake_up
    }

    fn block(&self, val: u32) -> Result<(), ImmediatelyWokenUp> {
        match self.block_or_maybe_timeout(val, None) {
            Ok(UnblockedOrTimedOut::Unblocked | UnblockedOrTimedOut::TimedOut) => Ok(()),
            Err(ImmediatelyWokenUp) => Err(ImmediatelyWokenUp),
        }
    }

    fn block_or_timeout(
        &self,
        val: u32,
        timeout: core::time::Duration,
    ) -> Result<UnblockedOrTimedOut, ImmediatelyWokenUp> {
        self.block_or_maybe_timeout(val, Some(timeout))
    }
}

impl RawMutexProvider for MockPlatform {
    type RawMutex = MockRawMutex;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockInstant {
    time: u64,
}

impl Instant for MockInstant {
    fn checked_duration_since(&self, earlier: &Self) -> Option<core::time::Duration> {
        let millis = self.time.checked_sub(earlier.time)?;
        Some(core::time::Duration::from_millis(millis))
    }

    fn checked_add(&self, duration: core::time::Duration) -> Option<Self> {
        let duration_millis: u64 = duration.as_millis().try_into().ok()?;
        Some(MockInstant {
            time: self.time.checked_add(duration_millis)?,
        })
    }
}

impl TimeProvider for MockPlatform {
    type Instant = MockInstant;

    fn now(&self) -> Self::Instant {
        MockInstant {
            time: self.current_time.fetch_add(1, Ordering::SeqCst),
        }
    }
}

impl DebugLogProvider for MockPlatform {
    fn debug_log_print(&self, msg: &str) {
        std::eprint!("{msg}");
        self.debug_lines.lock().unwrap().push(msg.into());
    }
}
