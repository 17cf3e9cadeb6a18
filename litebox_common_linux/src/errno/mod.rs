// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Error handling. See [`Errno`].

#![expect(
    clippy::match_same_arms,
    reason = "in this one module, we want to make sure we do the necessary repeat, just to keep consistency; \
              thus we don't want clippy to complain about this here"
)]

use litebox::event::{polling::TryOpError, wait::WaitError};
use litebox::net::errors::EndpointError;
use thiserror::Error;

mod generated;


/// Linux error numbers
///
/// This is a transparent wrapper around Linux error numbers (i.e., `i32`s) intended
/// to provide some type safety by expecting explicit conversions to/from `i32`s.
#[derive(PartialEq, Eq, Clone, Copy, Error)]
pub struct Errno {
    value: core::num::NonZeroU8,
}

impl From<Errno> for i32 {
    fn from(e: Errno) -> Self {
        e.value.get().into()
    }
}

impl core::fmt::Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl core::fmt::Debug for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Errno({} = {})", self.value.get(), self.as_str())
    }
}

impl Errno {
    /// Provide the negative integer representation of the error
    ///
    /// ```
    /// # use litebox_common_linux::errno::Errno;
    /// assert_eq!(-1, Errno::EPERM.as_neg());
    /// // Direct conversion to i32 will give the positive variant
    /// assert_eq!(1, i32::from(Errno::EPERM));
    /// ```
    pub fn as_neg(self) -> i32 {
        -i32::from(self)
    }

    /// (Private-only) Helper function that makes the associated constants on [`Errno`] significantly more
    /// readable. Not intended to be used outside this crate, or even this module.
    const fn from_const(v: u8) -> Self {
        match core::num::NonZeroU8::new(v) {
            Some(value) => Self { value },
            None => panic!("errno constants are non-zero"),
        }
    }
}

/// Errors when converting to an [`Errno`]
#[derive(Error, Debug)]
pub enum ErrnoConversionError {
    #[error("Expected positive error number")]
    ExpectedPositive,
    #[error("Error number cannot be zero")]
    ExpectedNonZero,
    #[error("Error number is unexpectedly large")]
    ExpectedSmallEnough,
}

impl TryFrom<i32> for Errno {
    type Error = ErrnoConversionError;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        let value: u32 = value
            .try_into()
            .or(Err(ErrnoConversionError::ExpectedPositive))?;
        Self::try_from(value)
    }
}
impl TryFrom<u32> for Errno {
    type Error = ErrnoConversionError;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        let value: u8 = value
            .try_into()
            .or(Err(ErrnoConversionError::ExpectedSmallEnough))?;
        Self::try_from(value)
    }
}
impl TryFrom<u8> for Errno {
    type Error = ErrnoConversionError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let value =
            core::num::NonZeroU8::new(value).ok_or(ErrnoConversionError::ExpectedNonZero)?;
        if value.get() <= Self::MAX.value.get() {
            Ok(Self { value })
        } else {
            Err(ErrnoConversionError::ExpectedSmallEnough)
        }
    }
}

impl From<EndpointError> for Errno {
    fn from(value: EndpointError) -> Self {
        match value {
            EndpointError::WouldBlock => Errno::EAGAIN,
            EndpointError::ConnectStarted => Errno::EINPROGRESS,
            EndpointError::AlreadyConnecting => Errno::EALREADY,
            EndpointError::AlreadyConnected => Errno::EISCONN,
            EndpointError::AlreadyBound => Errno::EINVAL,
            EndpointError::NoPortAvailable => Errno::EAGAIN,
            EndpointError::PortInUse => Errno::EADDRINUSE,
            EndpointError::BadLocalAddress => Errno::EADDRNOTAVAIL,
            EndpointError::ConnectionRefused => Errno::ECONNREFUSED,
            EndpointError::ConnectionReset => Errno::ECONNRESET,
            EndpointError::ConnectionAborted => Errno::ECONNABORTED,
            EndpointError::NetworkUnreachable => Errno::ENETUNREACH,
            EndpointError::HostUnreachable => Errno::EHOSTUNREACH,
            EndpointError::NoRoute => Errno::EHOSTUNREACH,
            EndpointError::NotConnected => Errno::ENOTCONN,
            EndpointError::ClosedForSend => Errno::EPIPE,
            // End of stream; callers that care about it handle it before converting.
            EndpointError::ClosedForReceive => Errno::EAGAIN,
            EndpointError::InvalidEndpointState => Errno::EINVAL,
            EndpointError::InvalidOptionValue => Errno::EINVAL,
            EndpointError::UnknownProtocolOption => Errno::ENOPROTOOPT,
            EndpointError::NotSupported => Errno::EOPNOTSUPP,
            EndpointError::AddressFamilyNotSupported => Errno::EAFNOSUPPORT,
            EndpointError::DestinationRequired => Errno::EDESTADDRREQ,
            EndpointError::MessageTooLong => Errno::EMSGSIZE,
            EndpointError::BadBuffer => Errno::EFAULT,
            EndpointError::Timeout => Errno::ETIMEDOUT,
            EndpointError::Aborted => Errno::EPIPE,
            EndpointError::UnknownDevice => Errno::ENODEV,
            EndpointError::NoBufferSpace => Errno::ENOBUFS,
            EndpointError::BroadcastDisabled => Errno::EACCES,
            EndpointError::NotPermitted => Errno::EPERM,
            EndpointError::QueueSizeNotSupported => Errno::ENOTTY,
            EndpointError::HostDown => Errno::EHOSTDOWN,
            EndpointError::DuplicateAddress => Errno::EADDRINUSE,
            EndpointError::BadAddress => Errno::EFAULT,
            EndpointError::InvalidPortRange => Errno::EINVAL,
            EndpointError::MulticastInputCannotBeOutput => Errno::EINVAL,
            EndpointError::Interrupted => Errno::EINTR,
            _ => Errno::EINVAL,
        }
    }
}

impl From<WaitError> for Errno {
    fn from(value: WaitError) -> Self {
        match value {
            WaitError::Interrupted => Errno::EINTR,
            WaitError::TimedOut => Errno::EAGAIN,
        }
    }
}

impl<E: Into<Errno>> From<TryOpError<E>> for Errno {
    fn from(value: TryOpError<E>) -> Self {
        match value {
            TryOpError::TryAgain => Errno::EAGAIN,
            TryOpError::WaitError(e) => e.into(),
            TryOpError::Other(e) => e.into(),
        }
    }
}
