// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Observer pattern utilities for event handling.

use alloc::collections::btree_map::BTreeMap;
use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicUsize, Ordering};

/// A trait for filtering events of type `E`.
pub trait EventsFilter<E>: Send + Sync + 'static {
    /// Returns `true` if the event should be processed.
    fn filter(&self, event: &E) -> bool;
}

impl EventsFilter<super::Events> for super::Events {
    fn filter(&self, events: &Self) -> bool {
        self.intersects(*events)
    }
}

/// A trait for observers that can be notified of events.
pub trait Observer<E>: Send + Sync {
    /// Called when events of interest occur.
    fn on_events(&self, events: &E);
}

/// A key for managing observers with weak references.
///
/// Orders by the address of the observer, so the same observer always maps to the same entry.
struct ObserverKey<E> {
    observer: Weak<dyn Observer<E>>,
}

impl<E> PartialEq for ObserverKey<E> {
    fn eq(&self, other: &Self) -> bool {
        self.observer.ptr_eq(&other.observer)
    }
}
impl<E> Eq for ObserverKey<E> {}
impl<E> PartialOrd for ObserverKey<E> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<E> Ord for ObserverKey<E> {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.observer
            .as_ptr()
            .cast::<()>()
            .cmp(&other.observer.as_ptr().cast::<()>())
    }
}

impl<E> ObserverKey<E> {
    fn upgrade(&self) -> Option<Arc<dyn Observer<E>>> {
        self.observer.upgrade()
    }
}

/// A Subject notifies interesting events to registered observers.
pub struct Subject<E, F: EventsFilter<E>> {
    observers: spin::Mutex<BTreeMap<ObserverKey<E>, F>>,
    /// Number of observers; lets `notify_observers` skip the lock when nobody listens.
    nums: AtomicUsize,
}

impl<E, F: EventsFilter<E>> Default for Subject<E, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, F: EventsFilter<E>> Subject<E, F> {
    /// Create a new subject.
    pub const fn new() -> Self {
        Self {
            observers: spin::Mutex::new(BTreeMap::new()),
            nums: AtomicUsize::new(0),
        }
    }

    /// Register an observer with the given filter.
    ///
    /// Registering the same observer again replaces its filter.
    pub fn register_observer(&self, observer: Weak<dyn Observer<E>>, filter: F) {
        let mut observers = self.observers.lock();
        if observers
            .insert(ObserverKey { observer }, filter)
            .is_none()
        {
            self.nums.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Unregister an observer. Returns whether it was registered.
    pub fn unregister_observer(&self, observer: Weak<dyn Observer<E>>) -> bool {
        let mut observers = self.observers.lock();
        let removed = observers.remove(&ObserverKey { observer }).is_some();
        if removed {
            self.nums.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Number of currently registered observers, including ones whose owner has gone away but
    /// that have not been pruned yet.
    pub fn len(&self) -> usize {
        self.nums.load(Ordering::Relaxed)
    }

    /// Whether no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify all observers of the given events.
    ///
    /// Observers are called with the table unlocked, so an observer may register or unregister
    /// from within `on_events`.
    pub fn notify_observers(&self, events: E) {
        if self.nums.load(Ordering::Relaxed) == 0 {
            return;
        }

        let mut to_notify = alloc::vec::Vec::new();
        {
            let mut observers = self.observers.lock();
            observers.retain(|observer, filter| {
                if let Some(observer) = observer.upgrade() {
                    if filter.filter(&events) {
                        to_notify.push(observer);
                    }
                    true
                } else {
                    self.nums.fetch_sub(1, Ordering::Relaxed);
                    false
                }
            });
        }
        for observer in to_notify {
            observer.on_events(&events);
        }
    }
}
