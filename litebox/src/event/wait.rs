// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Support infrastructure for interruptible waits.
//!
//! Ordinary waits via the [`RawMutex`] trait can only be woken up by another thread explicitly
//! signaling the raw mutex. Waits on guest- or network-controlled conditions (data arriving,
//! a connection completing, a peer acknowledging a close) may never be satisfied, so they must
//! also end on a deadline or when the calling task is interrupted (e.g., by a signal).
//!
//! The core type is [`WaitState`], which models a per-thread wait state. The thread creates a
//! [`WaitContext`] from it to perform waits, optionally narrowed with a deadline and an
//! interrupt check. The context hands out a [`Waker`], which other threads use to make the
//! waiting thread re-evaluate its condition.

use alloc::sync::Arc;
use core::{marker::PhantomData, sync::atomic::Ordering};

use crate::platform::{
    ImmediatelyWokenUp, Instant as _, RawMutex, RawSyncPrimitivesProvider, TimeProvider,
    UnblockedOrTimedOut,
};
use thiserror::Error;

/// The wait state for a thread.
///
/// This is meant to be stored in a per-thread object and used for all waits for that thread.
pub struct WaitState<Platform: RawSyncPrimitivesProvider> {
    waker: Waker<Platform>,
    /// Make sure this is `Send` but not `Sync` so that no one tries to share it
    /// across threads.
    _phantom: PhantomData<core::cell::Cell<()>>,
}

struct WaitStateInner<Platform: RawSyncPrimitivesProvider> {
    platform: &'static Platform,
    condvar: Platform::RawMutex,
}

/// A handle, returned by [`WaitContext::waker`], that can be used to wake up a
/// thread waiting via [`WaitContext::wait_until`].
pub struct Waker<Platform: RawSyncPrimitivesProvider>(Arc<WaitStateInner<Platform>>);

impl<Platform: RawSyncPrimitivesProvider> Clone for Waker<Platform> {
    fn clone(&self) -> Self {
        Waker(self.0.clone())
    }
}

impl<Platform: RawSyncPrimitivesProvider> Waker<Platform> {
    /// Causes the thread blocked in [`WaitContext::wait_until`] to wake up and
    /// reevaluate its wait condition (and its interrupt check).
    pub fn wake(&self) {
        self.0.wake();
    }
}

impl<Platform: RawSyncPrimitivesProvider> WaitState<Platform> {
    /// Creates a new wait state.
    ///
    /// Typically, you should create just one wait state per thread.
    pub fn new(platform: &'static Platform) -> Self {
        Self {
            waker: Waker(Arc::new(WaitStateInner {
                platform,
                condvar: <Platform::RawMutex as RawMutex>::INIT,
            })),
            _phantom: PhantomData,
        }
    }

    /// Returns a wait context that can be used to wait for things.
    pub fn context(&self) -> WaitContext<'_, Platform>
    where
        Platform: TimeProvider,
    {
        WaitContext::new(&self.waker)
    }
}

impl<Platform: RawSyncPrimitivesProvider> WaitStateInner<Platform> {
    /// Wakes up the thread if it is waiting.
    fn wake(&self) {
        let condvar = &self.condvar;
        let v = condvar.underlying_atomic().fetch_update(
            Ordering::Release,
            Ordering::Relaxed,
            |state| match ThreadState(state) {
                ThreadState::WAITING => Some(ThreadState::WOKEN.0),
                _ => None,
            },
        );
        if v.is_ok() {
            condvar.wake_one();
        } else {
            // Provide a consistent release fence even if we didn't wake up
            // the thread.
            core::sync::atomic::fence(Ordering::Release);
        }
    }

    fn state_for_assert(&self) -> ThreadState {
        ThreadState(self.condvar.underlying_atomic().load(Ordering::Relaxed))
    }

    fn set_state(&self, new_state: ThreadState, ordering: Ordering) {
        self.condvar
            .underlying_atomic()
            .store(new_state.0, ordering);
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct ThreadState(u32);

impl ThreadState {
    /// The thread is running (this includes waiting non-interruptibly via a [`RawMutex`]).
    const RUNNING: Self = Self(0);
    /// The thread is waiting via [`WaitContext::wait_until`].
    const WAITING: Self = Self(1);
    /// The thread is waiting and has been woken up to reevaluate its wait
    /// condition.
    const WOKEN: Self = Self(2);
}

impl core::fmt::Debug for ThreadState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let v = match *self {
            Self::RUNNING => "RUNNING",
            Self::WAITING => "WAITING",
            Self::WOKEN => "WOKEN",
            Self(v) => return write!(f, "UNKNOWN({v})"),
        };
        f.write_str(v)
    }
}

/// A context object used to perform interruptible waits.
///
/// This is created from a [`WaitState`] but can be augmented with timeouts and
/// with code to evaluate whether the wait should be interrupted.
pub struct WaitContext<'a, Platform: RawSyncPrimitivesProvider + TimeProvider> {
    waker: &'a Waker<Platform>,
    deadline: Option<Platform::Instant>,
    check_interrupt: &'a dyn CheckForInterrupt,
    // Not Send or Sync--this can only be used by the thread that created it.
    _phantom: PhantomData<*mut ()>,
}

/// A trait for checking whether the wait should be interrupted.
pub trait CheckForInterrupt {
    /// Returns `true` if the wait should be interrupted.
    ///
    /// This is called by [`WaitContext::wait_until`] each time it is about to
    /// block the thread. If this returns `true`, the wait will return with
    /// [`WaitError::Interrupted`].
    fn check_for_interrupt(&self) -> bool;
}

impl CheckForInterrupt for core::sync::atomic::AtomicBool {
    fn check_for_interrupt(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

struct NeverInterrupt;

impl CheckForInterrupt for NeverInterrupt {
    fn check_for_interrupt(&self) -> bool {
        false
    }
}

impl<'a, Platform: RawSyncPrimitivesProvider + TimeProvider> WaitContext<'a, Platform> {
    fn new(waker: &'a Waker<Platform>) -> WaitContext<'a, Platform> {
        WaitContext {
            waker,
            deadline: None,
            check_interrupt: &NeverInterrupt,
            _phantom: PhantomData,
        }
    }

    /// Returns a new context that uses the given interrupt checker.
    ///
    /// Note that this _replaces_ any existing interrupt checker.
    #[must_use]
    pub fn with_check_for_interrupt(&self, f: &'a dyn CheckForInterrupt) -> Self {
        Self {
            check_interrupt: f,
            ..*self
        }
    }

    /// Returns a new context that has a deadline after the given duration.
    ///
    /// If the existing context already has an earlier deadline or if no timeout
    /// is provided, then this just clones the context.
    #[must_use]
    pub fn with_timeout(&self, timeout: impl Into<Option<core::time::Duration>>) -> Self {
        // If this overflows, treat that as no deadline.
        if let Some(deadline) = timeout
            .into()
            .and_then(|timeout| self.waker.0.platform.now().checked_add(timeout))
        {
            self.with_deadline(deadline)
        } else {
            Self { ..*self }
        }
    }

    /// Returns a new context that has the given deadline.
    ///
    /// If the existing context already has an earlier deadline, then this just
    /// clones the context.
    #[must_use]
    pub fn with_deadline(&self, deadline: impl Into<Option<Platform::Instant>>) -> Self {
        let mut this = Self { ..*self };
        if let Some(deadline) = deadline.into()
            && self.deadline.is_none_or(|d| deadline < d)
        {
            this.deadline = Some(deadline);
        }
        this
    }

    /// Returns the remaining timeout for this wait context, if any.
    pub fn remaining_timeout(&self) -> Option<core::time::Duration> {
        self.deadline.and_then(|deadline| {
            let now = self.waker.0.platform.now();
            deadline.checked_duration_since(&now)
        })
    }

    /// Moves the thread into the waiting state. This must happen before
    /// evaluating the wait and interrupt conditions so that wakeups are not
    /// missed.
    fn start_wait(&self) {
        self.waker.0.set_state(ThreadState::WAITING, Ordering::SeqCst);
    }

    /// Returns the thread to the running state after a wait.
    fn end_wait(&self) {
        self.waker.0.set_state(ThreadState::RUNNING, Ordering::Relaxed);
    }

    /// Checks whether the wait should be interrupted. If not, then performs
    /// the wait.
    ///
    /// `start_wait` must have already been called and the wait condition
    /// evaluated.
    fn commit_wait(&self) -> Result<(), WaitError> {
        // Timeout wins over a pending interrupt once the deadline has passed.
        let timeout = if self.deadline.is_some() {
            Some(self.remaining_timeout().ok_or(WaitError::TimedOut)?)
        } else {
            None
        };
        if self.check_interrupt.check_for_interrupt() {
            return Err(WaitError::Interrupted);
        }

        if let Some(timeout) = timeout {
            match self
                .waker
                .0
                .condvar
                .block_or_timeout(ThreadState::WAITING.0, timeout)
            {
                Ok(UnblockedOrTimedOut::Unblocked) | Err(ImmediatelyWokenUp) => Ok(()),
                Ok(UnblockedOrTimedOut::TimedOut) => Err(WaitError::TimedOut),
            }
        } else {
            let _ = self.waker.0.condvar.block(ThreadState::WAITING.0);
            Ok(())
        }
    }

    /// Sleep until the wait is interrupted or times out.
    ///
    /// If no deadline is provided, this sleeps until interrupted.
    pub fn sleep(&self) -> WaitError {
        match self.wait_until(|| false) {
            Ok(()) => unreachable!("`ready` never returns true"),
            Err(err) => err,
        }
    }

    /// Waits until `ready` returns `true`.
    ///
    /// `ready` is called once before the thread sleeps and then again each time the
    /// thread is woken up. The caller must arrange for wakeups at the
    /// appropriate time, via [`Waker::wake`].
    ///
    /// # Panics
    /// Panics if the thread is not currently in the running state, i.e., if `ready` calls
    /// `wait_until` recursively.
    pub fn wait_until(&self, mut ready: impl FnMut() -> bool) -> Result<(), WaitError> {
        assert_eq!(self.waker.0.state_for_assert(), ThreadState::RUNNING);
        let _end_wait = crate::utils::defer(|| self.end_wait());
        loop {
            self.start_wait();
            if ready() {
                break Ok(());
            }
            self.commit_wait()?;
        }
    }

    /// Returns the waker associated with this wait context.
    pub fn waker(&self) -> &Waker<Platform> {
        self.waker
    }
}

/// An error that can occur during a wait.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    #[error("wait was interrupted")]
    Interrupted,
    #[error("wait timed out")]
    TimedOut,
}
