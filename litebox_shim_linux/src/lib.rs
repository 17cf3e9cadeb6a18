// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! A shim that provides Linux-compatible socket semantics via LiteBox.
//!
//! The shim is parametric in the choice of [LiteBox platform](litebox::platform::Provider) and
//! drives transport endpoints through the [`litebox::net::Endpoint`] contract; see
//! [`syscalls::net::Socket`] for the entry point.

#![no_std]

extern crate alloc;

use litebox::platform::DebugLogProvider;

/// On debug builds, logs that the user attempted to use an unsupported feature.
// DEVNOTE: this is before the `mod` declarations so that it can be used within them.
macro_rules! log_unsupported {
    ($platform:expr, $($arg:tt)*) => {
        $crate::log_unsupported_fmt($platform, core::format_args!($($arg)*));
    };
}

pub mod syscalls;

/// On debug builds, logs that the user attempted to use an unsupported feature.
fn log_unsupported_fmt<Platform: DebugLogProvider>(
    platform: &Platform,
    args: core::fmt::Arguments<'_>,
) {
    if cfg!(debug_assertions) {
        let msg = alloc::format!("WARNING: unsupported: {args}\n");
        platform.debug_log_print(&msg);
    }
}
