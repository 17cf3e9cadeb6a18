// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The option block shared between an endpoint and the socket layer above it.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU32, Ordering};
use core::time::Duration;

use super::{FullAddress, NetworkProtocol, errors::EndpointError, stack::BufferSizeLimits};

/// `SO_LINGER` state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LingerOption {
    pub enabled: bool,
    pub timeout: Duration,
}

/// Where a queued socket error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SockErrorOrigin {
    None,
    Local,
    Icmp,
    Icmp6,
}

impl SockErrorOrigin {
    /// Whether the error was reported by an ICMP message.
    pub fn is_icmp(self) -> bool {
        matches!(self, SockErrorOrigin::Icmp | SockErrorOrigin::Icmp6)
    }
}

/// The cause of a queued socket error, in the shape of Linux's `sock_extended_err`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SockErrorCause {
    pub origin: SockErrorOrigin,
    pub type_: u8,
    pub code: u8,
    pub info: u32,
}

/// An asynchronously delivered transport error, as kept on the error queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SockError {
    pub err: EndpointError,
    pub cause: SockErrorCause,
    /// The original packet (or its leading part) that caused the error.
    pub payload: Vec<u8>,
    /// Destination of the packet that caused the error.
    pub dst: FullAddress,
    /// The node that reported the error.
    pub offender: FullAddress,
    pub net_proto: NetworkProtocol,
}

macro_rules! bool_options {
    ($($(#[$meta:meta])* $get:ident / $set:ident;)*) => {
        #[derive(Default)]
        struct BoolOptions {
            $($get: AtomicBool,)*
        }

        impl SocketOptions {
            $(
                $(#[$meta])*
                pub fn $get(&self) -> bool {
                    self.bools.$get.load(Ordering::Relaxed)
                }

                #[doc = concat!("Update [`Self::", stringify!($get), "`].")]
                pub fn $set(&self, v: bool) {
                    self.bools.$get.store(v, Ordering::Relaxed);
                }
            )*
        }
    };
}

bool_options! {
    /// `SO_BROADCAST`
    broadcast / set_broadcast;
    /// `SO_PASSCRED`
    pass_cred / set_pass_cred;
    /// `SO_KEEPALIVE`
    keep_alive / set_keep_alive;
    /// `SO_REUSEADDR`
    reuse_address / set_reuse_address;
    /// `SO_REUSEPORT`
    reuse_port / set_reuse_port;
    /// `SO_OOBINLINE`
    oob_inline / set_oob_inline;
    /// `SO_NO_CHECK`
    no_checksum / set_no_checksum;
    /// `IPV6_V6ONLY`
    v6_only / set_v6_only;
    /// Nagle's algorithm; the inverse of `TCP_NODELAY`.
    delay / set_delay;
    /// `TCP_CORK`
    cork / set_cork;
    /// `TCP_QUICKACK`
    quick_ack / set_quick_ack;
    /// `IP_RECVTOS`
    receive_tos / set_receive_tos;
    /// `IPV6_RECVTCLASS`
    receive_tclass / set_receive_tclass;
    /// `IP_RECVTTL`
    receive_ttl / set_receive_ttl;
    /// `IPV6_RECVHOPLIMIT`
    receive_hop_limit / set_receive_hop_limit;
    /// `IP_PKTINFO`
    receive_packet_info / set_receive_packet_info;
    /// `IPV6_RECVPKTINFO`
    receive_ipv6_packet_info / set_receive_ipv6_packet_info;
    /// `IP_RECVORIGDSTADDR` / `IPV6_RECVORIGDSTADDR`
    receive_original_dst_address / set_receive_original_dst_address;
    /// `IP_RECVERR`
    ip_recv_error / set_ip_recv_error;
    /// `IPV6_RECVERR`
    ipv6_recv_error / set_ipv6_recv_error;
    /// `IP_HDRINCL`
    hdr_included / set_hdr_included;
    /// `IP_MULTICAST_LOOP`
    multicast_loop / set_multicast_loop;
    /// `SO_ACCEPTCONN`; maintained by the endpoint.
    accept_conn / set_accept_conn;
}

/// Options common to every endpoint, readable and writable from both sides.
///
/// All accessors take `&self`; the block synchronizes internally.
pub struct SocketOptions {
    bools: BoolOptions,
    send_buffer_size: AtomicI64,
    receive_buffer_size: AtomicI64,
    send_limits: BufferSizeLimits,
    receive_limits: BufferSizeLimits,
    rcv_lowat: AtomicI32,
    bound_device: AtomicU32,
    linger: spin::Mutex<LingerOption>,
    send_timeout: spin::Mutex<Option<Duration>>,
    receive_timeout: spin::Mutex<Option<Duration>>,
    last_error: spin::Mutex<Option<EndpointError>>,
    error_queue: spin::Mutex<VecDeque<SockError>>,
}

impl SocketOptions {
    /// Fresh options, with buffer sizes at the defaults of the given limits.
    pub fn new(send_limits: BufferSizeLimits, receive_limits: BufferSizeLimits) -> Self {
        let this = Self {
            bools: BoolOptions::default(),
            send_buffer_size: AtomicI64::new(send_limits.default),
            receive_buffer_size: AtomicI64::new(receive_limits.default),
            send_limits,
            receive_limits,
            rcv_lowat: AtomicI32::new(1),
            bound_device: AtomicU32::new(0),
            linger: spin::Mutex::new(LingerOption::default()),
            send_timeout: spin::Mutex::new(None),
            receive_timeout: spin::Mutex::new(None),
            last_error: spin::Mutex::new(None),
            error_queue: spin::Mutex::new(VecDeque::new()),
        };
        this.set_multicast_loop(true);
        this
    }

    /// `SO_SNDBUF`, as stored (already adjusted for overhead).
    pub fn send_buffer_size(&self) -> i64 {
        self.send_buffer_size.load(Ordering::Relaxed)
    }

    pub fn set_send_buffer_size(&self, size: i64) {
        self.send_buffer_size.store(size, Ordering::Relaxed);
    }

    /// `SO_RCVBUF`, as stored (already adjusted for overhead).
    pub fn receive_buffer_size(&self) -> i64 {
        self.receive_buffer_size.load(Ordering::Relaxed)
    }

    pub fn set_receive_buffer_size(&self, size: i64) {
        self.receive_buffer_size.store(size, Ordering::Relaxed);
    }

    pub fn send_buffer_limits(&self) -> BufferSizeLimits {
        self.send_limits
    }

    pub fn receive_buffer_limits(&self) -> BufferSizeLimits {
        self.receive_limits
    }

    /// `SO_RCVLOWAT`
    pub fn rcv_lowat(&self) -> i32 {
        self.rcv_lowat.load(Ordering::Relaxed)
    }

    pub fn set_rcv_lowat(&self, v: i32) {
        self.rcv_lowat.store(v, Ordering::Relaxed);
    }

    /// Interface index the endpoint is bound to (`SO_BINDTODEVICE`), 0 if none.
    pub fn bound_device(&self) -> u32 {
        self.bound_device.load(Ordering::Relaxed)
    }

    pub fn set_bound_device(&self, nic: u32) {
        self.bound_device.store(nic, Ordering::Relaxed);
    }

    pub fn linger(&self) -> LingerOption {
        *self.linger.lock()
    }

    pub fn set_linger(&self, linger: LingerOption) {
        *self.linger.lock() = linger;
    }

    /// `SO_SNDTIMEO`; `None` means block forever.
    pub fn send_timeout(&self) -> Option<Duration> {
        *self.send_timeout.lock()
    }

    pub fn set_send_timeout(&self, timeout: Option<Duration>) {
        *self.send_timeout.lock() = timeout;
    }

    /// `SO_RCVTIMEO`; `None` means block forever.
    pub fn receive_timeout(&self) -> Option<Duration> {
        *self.receive_timeout.lock()
    }

    pub fn set_receive_timeout(&self, timeout: Option<Duration>) {
        *self.receive_timeout.lock() = timeout;
    }

    /// Take the pending error (`SO_ERROR` semantics: reading clears it).
    pub fn take_last_error(&self) -> Option<EndpointError> {
        self.last_error.lock().take()
    }

    pub fn set_last_error(&self, err: Option<EndpointError>) {
        *self.last_error.lock() = err;
    }

    /// Append an error to the error queue, if the endpoint asked for them.
    ///
    /// Errors are only queued while `IP_RECVERR` or `IPV6_RECVERR` is enabled.
    pub fn queue_err(&self, err: SockError) {
        if self.ip_recv_error() || self.ipv6_recv_error() {
            self.error_queue.lock().push_back(err);
        }
    }

    /// A copy of the oldest queued error, if any.
    pub fn peek_err(&self) -> Option<SockError> {
        self.error_queue.lock().front().cloned()
    }

    /// Remove and return the oldest queued error.
    pub fn dequeue_err(&self) -> Option<SockError> {
        self.error_queue.lock().pop_front()
    }

    /// Number of queued errors.
    pub fn error_queue_len(&self) -> usize {
        self.error_queue.lock().len()
    }
}
