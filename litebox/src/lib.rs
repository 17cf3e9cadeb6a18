// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! # LiteBox
//!
//! > A security-focused library OS.
//!
//! This crate holds the platform-independent core that socket emulation is built on:
//!
//! - [`platform`]: the traits a host must provide (raw mutexes, a clock, a debug log).
//! - [`event`]: readiness events, observers, and the interruptible waits used to implement
//!   blocking calls on top of non-blocking primitives.
//! - [`net`]: the contract a transport endpoint (TCP, UDP, raw, link-layer, ...) must fulfil for a
//!   socket layer to drive it, including its shared option block and the namespace it lives in.
//!
//! To use LiteBox, you must provide a type that implements the [`platform::Provider`] trait.

#![no_std]

extern crate alloc;

#[doc(hidden)]
pub use arrayvec;

pub mod event;
pub mod net;
pub mod platform;
pub mod utils;

/// Format a line into a fixed-size buffer and hand it to the platform's debug log.
///
/// Lines longer than the buffer are truncated rather than allocated.
#[macro_export]
macro_rules! debug_log_println {
    ($platform:expr, $($tt:tt)*) => {{
        use core::fmt::Write as _;
        use $crate::platform::DebugLogProvider as _;
        let mut t: $crate::arrayvec::ArrayString<1024> = $crate::arrayvec::ArrayString::new();
        let _ = writeln!(t, $($tt)*);
        $platform.debug_log_print(&t);
    }};
}
