// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Possible errors reported by an [`Endpoint`](super::Endpoint)

use thiserror::Error;

/// Conditions a transport endpoint reports back to the socket layer.
///
/// The socket layer translates each of these into exactly one guest-visible error number; some
/// (like [`WouldBlock`](Self::WouldBlock) or [`ConnectStarted`](Self::ConnectStarted)) are also
/// consumed internally to drive blocking calls.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Operation would block")]
    WouldBlock,
    #[error("Connection in progress")]
    ConnectStarted,
    #[error("Connection already in progress")]
    AlreadyConnecting,
    #[error("Endpoint is already connected")]
    AlreadyConnected,
    #[error("Endpoint is already bound")]
    AlreadyBound,
    #[error("No ephemeral port available")]
    NoPortAvailable,
    #[error("Port is in use")]
    PortInUse,
    #[error("Local address is not available")]
    BadLocalAddress,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection reset by peer")]
    ConnectionReset,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Network is unreachable")]
    NetworkUnreachable,
    #[error("Host is unreachable")]
    HostUnreachable,
    #[error("No route to host")]
    NoRoute,
    #[error("Endpoint is not connected")]
    NotConnected,
    #[error("Endpoint is closed for send")]
    ClosedForSend,
    #[error("Endpoint is closed for receive")]
    ClosedForReceive,
    #[error("Endpoint is in an invalid state")]
    InvalidEndpointState,
    #[error("Invalid option value")]
    InvalidOptionValue,
    #[error("Unknown protocol option")]
    UnknownProtocolOption,
    #[error("Operation not supported")]
    NotSupported,
    #[error("Address family not supported by protocol")]
    AddressFamilyNotSupported,
    #[error("Destination address is required")]
    DestinationRequired,
    #[error("Message too long")]
    MessageTooLong,
    #[error("Bad buffer")]
    BadBuffer,
    #[error("Operation timed out")]
    Timeout,
    #[error("Operation aborted")]
    Aborted,
    #[error("Unknown device")]
    UnknownDevice,
    #[error("No buffer space available")]
    NoBufferSpace,
    #[error("Broadcast is disabled")]
    BroadcastDisabled,
    #[error("Operation not permitted")]
    NotPermitted,
    #[error("Queue size is not supported")]
    QueueSizeNotSupported,
    #[error("Host is down")]
    HostDown,
    #[error("Duplicate address detected")]
    DuplicateAddress,
    #[error("Bad address")]
    BadAddress,
    #[error("Invalid port range")]
    InvalidPortRange,
    #[error("Multicast input cannot be output")]
    MulticastInputCannotBeOutput,
    #[error("Interrupted")]
    Interrupted,
}
