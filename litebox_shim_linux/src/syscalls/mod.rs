// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Socket syscall handlers

pub mod cmsg;
mod ioctl;
pub mod net;
pub mod sockopt;

pub use ioctl::IoctlArg;

#[cfg(test)]
mod tests;
