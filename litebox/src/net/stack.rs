// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The network namespace and stack an endpoint lives in, as seen from the socket layer.
//!
//! The socket layer only needs a narrow view of these: interface lookups for ioctls and
//! `SO_BINDTODEVICE`, protocol defaults, buffer-size limits, and the packet filter's
//! administrative interface.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::net::IpAddr;

use bitflags::bitflags;

use super::{NetworkProtocol, errors::EndpointError};

/// Minimum, default and maximum of a socket buffer size, in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferSizeLimits {
    pub min: i64,
    pub default: i64,
    pub max: i64,
}

bitflags! {
    /// Interface flags, using the Linux `IFF_*` bit values.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct InterfaceFlags: u32 {
        const UP = 0x1;
        const BROADCAST = 0x2;
        const LOOPBACK = 0x8;
        const RUNNING = 0x40;
        const PROMISC = 0x100;
        const MULTICAST = 0x1000;
        const LOWER_UP = 0x10000;
    }
}

/// A network interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    /// ARP hardware type (`ARPHRD_*`).
    pub device_type: u16,
    pub flags: InterfaceFlags,
    /// Hardware address; empty if the interface has none.
    pub addr: Vec<u8>,
    pub mtu: u32,
}

/// An address assigned to an interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub addr: IpAddr,
    pub prefix_len: u8,
}

/// The netfilter-style packet filter's administrative interface.
///
/// Only raw sockets reach this; the socket layer validates sizes and forwards the guest's buffers
/// untouched.
pub trait PacketFilter: Send + Sync {
    /// Serve a `*T_SO_GET_*` query. `optval` is the guest's buffer, which doubles as input.
    fn get(
        &self,
        proto: NetworkProtocol,
        name: i32,
        optval: &[u8],
    ) -> Result<Vec<u8>, EndpointError>;

    /// Apply a `*T_SO_SET_REPLACE` table.
    fn set(&self, proto: NetworkProtocol, optval: &[u8]) -> Result<(), EndpointError>;
}

/// A network stack, as far as the socket layer needs to know.
pub trait NetworkStack: Send + Sync {
    /// All interfaces, keyed by index.
    fn interfaces(&self) -> BTreeMap<u32, Interface>;

    /// Addresses assigned to the interface with index `idx`.
    fn interface_addresses(&self, idx: u32) -> Vec<InterfaceAddress>;

    /// The configured default TTL (or hop limit) for `proto`, if the stack knows it.
    fn default_ttl(&self, proto: NetworkProtocol) -> Option<u8>;

    fn send_buffer_limits(&self) -> BufferSizeLimits;

    fn receive_buffer_limits(&self) -> BufferSizeLimits;

    /// The packet filter, if one is attached.
    fn packet_filter(&self) -> Option<&dyn PacketFilter> {
        None
    }

    /// Find an interface index by name.
    fn interface_index(&self, name: &str) -> Option<u32> {
        self.interfaces()
            .into_iter()
            .find_map(|(idx, iface)| (iface.name == name).then_some(idx))
    }
}

/// A network namespace, which owns a stack and counts the sockets living in it.
pub trait NetworkNamespace: Send + Sync {
    /// Take a reference on behalf of a new socket.
    fn inc_ref(&self);

    /// Drop a reference taken with [`inc_ref`](Self::inc_ref).
    fn dec_ref(&self);

    /// The namespace's stack, if it has one.
    fn stack(&self) -> Option<&dyn NetworkStack>;
}
