// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Polling-related functionality
//!
//! A [`Pollee`] is the notification queue attached to something that can become ready (an
//! endpoint, a socket). Blocking operations are built from a non-blocking `try_op` plus
//! [`WaitContext::wait_on_events`], which registers exactly one observer for the duration of the
//! wait and always removes it again.

use core::sync::atomic::AtomicBool;

use alloc::sync::{Arc, Weak};
use thiserror::Error;

use super::{
    Events,
    observer::{Observer, Subject},
};
use crate::{
    event::wait::{WaitContext, WaitError},
    platform::{RawSyncPrimitivesProvider, TimeProvider},
};

/// A pollable entity that can be observed for events.
///
/// This supports polling, waiting, and notifications for observers.
pub struct Pollee {
    subject: Subject<Events, Events>,
}

/// Handle for one registration made through [`Pollee::register`].
///
/// Hand it back to [`Pollee::unregister`]; dropping it without doing so leaves the entry in place
/// until the observer itself is dropped.
#[must_use = "registrations must be unregistered"]
pub struct ObserverToken {
    observer: Weak<dyn Observer<Events>>,
}

/// The result of a tried operation.
#[derive(Error, Debug)]
pub enum TryOpError<E> {
    #[error("operation should be retried")]
    TryAgain,
    #[error("wait error")]
    WaitError(#[source] WaitError),
    #[error(transparent)]
    Other(E),
}

impl<Platform: RawSyncPrimitivesProvider + TimeProvider> WaitContext<'_, Platform> {
    /// Run `try_op` until it returns a non-`TryAgain` result, waiting after
    /// each `TryAgain`.
    ///
    /// If `nonblock` is true, returns `TryAgain` instead of waiting.
    ///
    /// The first attempt is made before anything is registered. If it has to wait, an observer is
    /// registered once via `register` (for `events` and [`Events::ALWAYS_POLLED`]) and the
    /// returned token is passed to `unregister` when this function returns, whatever the outcome.
    pub fn wait_on_events<R, E, T>(
        &self,
        nonblock: bool,
        events: Events,
        register: impl FnOnce(Weak<dyn Observer<Events>>, Events) -> Result<T, E>,
        unregister: impl FnOnce(T),
        mut try_op: impl FnMut() -> Result<R, TryOpError<E>>,
    ) -> Result<R, TryOpError<E>> {
        // Try once before allocating and registering the observer.
        match try_op() {
            Err(TryOpError::TryAgain) if !nonblock => {}
            ret => return ret,
        }
        let observer = Arc::new(PolleeObserver::new(self.waker().clone()));
        let token = register(
            Arc::downgrade(&observer) as _,
            events | Events::ALWAYS_POLLED,
        )
        .map_err(TryOpError::Other)?;
        let _unregister = crate::utils::defer(move || unregister(token));
        loop {
            match try_op() {
                Err(TryOpError::TryAgain) => {}
                ret => return ret,
            }
            self.wait_until(|| observer.is_ready())
                .map_err(TryOpError::WaitError)?;
            // Reset the observer before calling [`try_op`] again so that we
            // don't miss a wakeup.
            observer.reset();
        }
    }
}

impl Default for Pollee {
    fn default() -> Self {
        Self::new()
    }
}

impl Pollee {
    /// Create a new pollee.
    pub const fn new() -> Self {
        Self {
            subject: Subject::new(),
        }
    }

    /// Run `try_op` until it returns a non-`TryAgain` result, waiting after
    /// each `TryAgain`.
    ///
    /// If `nonblock` is true, returns `TryAgain` instead of waiting.
    ///
    /// If `try_op` returns `TryAgain`, the thread will be woken to try again
    /// when [`notify_observers`](Self::notify_observers) is called with events
    /// that match the given `events` filter (or an event in
    /// `Events::ALWAYS_POLLED`).
    pub fn wait<Platform, R, E>(
        &self,
        cx: &WaitContext<'_, Platform>,
        nonblock: bool,
        events: Events,
        try_op: impl FnMut() -> Result<R, TryOpError<E>>,
    ) -> Result<R, TryOpError<E>>
    where
        Platform: RawSyncPrimitivesProvider + TimeProvider,
    {
        cx.wait_on_events(
            nonblock,
            events,
            |observer, filter| Ok(self.register(observer, filter)),
            |token| self.unregister(token),
            try_op,
        )
    }

    /// Register an observer for events that satisfy the given `filter`.
    pub fn register(&self, observer: Weak<dyn Observer<Events>>, filter: Events) -> ObserverToken {
        self.subject
            .register_observer(observer.clone(), filter | Events::ALWAYS_POLLED);
        ObserverToken { observer }
    }

    /// Remove the registration behind `token`.
    pub fn unregister(&self, token: ObserverToken) {
        self.subject.unregister_observer(token.observer);
    }

    /// Number of live registrations.
    pub fn observer_count(&self) -> usize {
        self.subject.len()
    }

    /// Notify all registered observers with the given events.
    pub fn notify_observers(&self, events: Events) {
        self.subject.notify_observers(events);
    }
}

/// Private observer, used solely to help implement [`WaitContext::wait_on_events`].
struct PolleeObserver<Platform: RawSyncPrimitivesProvider> {
    ready: AtomicBool,
    waker: super::wait::Waker<Platform>,
}

impl<Platform: RawSyncPrimitivesProvider> PolleeObserver<Platform> {
    fn new(waker: super::wait::Waker<Platform>) -> Self {
        Self {
            ready: AtomicBool::new(false),
            waker,
        }
    }

    fn reset(&self) {
        self.ready
            .store(false, core::sync::atomic::Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(core::sync::atomic::Ordering::SeqCst)
    }
}

impl<Platform: RawSyncPrimitivesProvider> Observer<Events> for PolleeObserver<Platform> {
    fn on_events(&self, _events: &Events) {
        self.ready
            .store(true, core::sync::atomic::Ordering::Release);
        self.waker.wake();
    }
}
