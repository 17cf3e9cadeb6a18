// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Events related functionality

pub mod observer;
pub mod polling;
pub mod wait;


bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Events: u32 {
        /// `POLLIN`: There is data to be read.
        const IN    = 0x0001;
        /// `POLLPRI`: There is some exceptional condition on the file descriptor.
        const PRI   = 0x0002;
        /// `POLLOUT`: Writing is now possible, though a write larger than the available space in a socket or pipe will still block.
        const OUT   = 0x0004;
        /// `POLLERR`: Error condition (always returnable).
        const ERR   = 0x0008;
        /// `POLLHUP`: Hang up (always returnable).
        const HUP   = 0x0010;
        /// `POLLNVAL`: Invalid request: fd not open (always returnable).
        const NVAL  = 0x0020;
        /// `POLLRDNORM`: Normal data may be read.
        const RDNORM = 0x0040;
        /// `POLLWRNORM`: Normal data may be written.
        const WRNORM = 0x0100;
        /// `POLLRDHUP`: Stream socket peer closed connection, or shut down writing half of connection.
        const RDHUP = 0x2000;

        /// Events that can be returned even if they are not specified
        const ALWAYS_POLLED = Self::ERR.bits() | Self::HUP.bits() | Self::NVAL.bits();
        /// What a reader waits for.
        const READABLE = Self::IN.bits() | Self::RDNORM.bits();
        /// What a writer waits for.
        const WRITABLE = Self::OUT.bits() | Self::WRNORM.bits();

        /// <https://docs.rs/bitflags/*/bitflags/#externally-defined-flags>
        const _ = !0;
    }
}

/// Something that supports registering observers and polling for events.
pub trait IOPollable {
    /// Register the `observer` to be notified whenever there are events within the `mask`.
    ///
    /// The returned token must be handed back to
    /// [`unregister_observer`](Self::unregister_observer) once the observer is no longer
    /// interested.
    fn register_observer(
        &self,
        observer: alloc::sync::Weak<dyn observer::Observer<Events>>,
        mask: Events,
    ) -> polling::ObserverToken;

    /// Stop notifying the observer registered under `token`.
    fn unregister_observer(&self, token: polling::ObserverToken);

    /// Get the current set of active events at this moment in time.
    ///
    /// This does not _by itself_ cause any triggering for observers; instead `notify_observer`
    /// calls are what notify observers. This particular function itself however _may_ be used to
    /// essentially get "the current status" of events for the system.
    fn check_io_events(&self) -> Events;
}
