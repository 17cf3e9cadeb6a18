// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The contract between a socket layer and the transport endpoints that actually move data.
//!
//! An [`Endpoint`] is a single transport-level object (a TCP connection, a UDP or raw socket, a
//! link-layer packet socket). It never blocks: operations that cannot make progress report
//! [`EndpointError::WouldBlock`] (or [`EndpointError::ConnectStarted`]) and the endpoint later
//! announces readiness through the [`Pollee`](crate::event::polling::Pollee) it was created with.
//! Building blocking, cancellable, Linux-flavoured semantics on top of this is the socket layer's
//! job, not the endpoint's.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::net::{Ipv4Addr, Ipv6Addr};
use core::time::Duration;

use bitflags::bitflags;

use crate::event::{Events, polling::Pollee};

pub mod errors;
mod options;
mod stack;

#[cfg(test)]
mod tests;

pub use errors::EndpointError;
pub use options::{LingerOption, SockError, SockErrorCause, SockErrorOrigin, SocketOptions};
pub use stack::{
    BufferSizeLimits, Interface, InterfaceAddress, InterfaceFlags, NetworkNamespace,
    NetworkStack, PacketFilter,
};

/// The behavioural class of an endpoint, used to pick between stream and packet semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketKind {
    Stream,
    Datagram,
    SeqPacket,
    Raw,
    Rdm,
}

impl SocketKind {
    /// Packet-based endpoints deliver one message per receive and never merge messages.
    pub fn is_packet_based(self) -> bool {
        !matches!(self, SocketKind::Stream)
    }
}

/// The transport protocol behind an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportProtocol {
    Tcp,
    Udp,
    Icmp,
    Raw,
    Packet,
}

/// The network protocol an address or error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkProtocol {
    Ipv4,
    Ipv6,
}

/// A hardware (link-layer) address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LinkAddress(pub [u8; 6]);

/// The address part of a [`FullAddress`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Address {
    /// No address; for IP this is the wildcard ("any") address.
    #[default]
    Unspecified,
    V4(Ipv4Addr),
    V6(Ipv6Addr),
    Link(LinkAddress),
}

impl Address {
    /// Whether this is the empty (wildcard) address.
    pub fn is_unspecified(&self) -> bool {
        matches!(self, Address::Unspecified)
    }
}

/// An endpoint-level address: interface, address and port.
///
/// For link-layer endpoints the port holds the link protocol number (host byte order).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FullAddress {
    /// Interface index, or 0 for "any interface".
    pub nic: u32,
    pub addr: Address,
    pub port: u16,
}

/// How a received link-layer frame relates to this host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PacketType {
    #[default]
    Host,
    OtherHost,
    Outgoing,
    Broadcast,
    Multicast,
}

/// Link-layer details of a received packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct LinkPacketInfo {
    /// Link protocol number in host byte order.
    pub protocol: u16,
    pub pkt_type: PacketType,
}

/// `IP_PKTINFO` data attached to a received IPv4 packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IpPacketInfo {
    pub nic: u32,
    pub local_addr: Ipv4Addr,
    pub destination_addr: Ipv4Addr,
}

/// `IPV6_PKTINFO` data attached to a received IPv6 packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv6PacketInfo {
    pub addr: Ipv6Addr,
    pub nic: u32,
}

/// Ancillary data an endpoint reports alongside a receive.
///
/// A field is only populated when the endpoint's corresponding receive option is enabled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReceivableControlMessages {
    /// Receive time, relative to the Unix epoch.
    pub timestamp: Option<Duration>,
    pub tos: Option<u8>,
    pub tclass: Option<u32>,
    pub ip_packet_info: Option<IpPacketInfo>,
    pub ipv6_packet_info: Option<Ipv6PacketInfo>,
    pub hop_limit: Option<u32>,
    pub ttl: Option<u32>,
    pub original_dst_address: Option<FullAddress>,
    pub sock_err: Option<SockError>,
}

/// Ancillary data a sender may attach to a write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendableControlMessages {
    pub ttl: Option<u32>,
    pub hop_limit: Option<u32>,
}

/// Options for [`Endpoint::read`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadOptions {
    /// Leave the data in the receive queue.
    pub peek: bool,
    /// Report the sender in [`ReadResult::remote_addr`].
    pub need_remote_addr: bool,
    /// Report [`ReadResult::link_packet_info`].
    pub need_link_packet_info: bool,
}

/// The outcome of a successful [`Endpoint::read`].
#[derive(Clone, Debug, Default)]
pub struct ReadResult {
    /// Bytes copied into the destination.
    pub count: usize,
    /// Size of the message; larger than `count` when a packet did not fit.
    pub total: usize,
    pub control_messages: ReceivableControlMessages,
    pub remote_addr: FullAddress,
    pub link_packet_info: LinkPacketInfo,
}

/// Options for [`Endpoint::write`].
#[derive(Clone, Copy, Debug, Default)]
pub struct WriteOptions {
    /// Destination for unconnected packet endpoints.
    pub to: Option<FullAddress>,
    /// More data follows (`MSG_MORE`).
    pub more: bool,
    /// End of record (`MSG_EOR`).
    pub end_of_record: bool,
    pub control_messages: SendableControlMessages,
}

bitflags! {
    /// Which directions [`Endpoint::shutdown`] closes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ShutdownFlags: u8 {
        const READ = 1;
        const WRITE = 2;
    }
}

/// What an endpoint hands back from a successful [`Endpoint::accept`].
pub struct AcceptedEndpoint {
    pub endpoint: Box<dyn Endpoint>,
    /// The notification queue the new endpoint reports readiness through.
    pub pollee: Arc<Pollee>,
    /// The peer, when requested.
    pub peer: Option<FullAddress>,
}

/// TCP connection states, as tracked by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TcpState {
    Initial,
    Bound,
    Connecting,
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    Error,
}

/// UDP endpoint states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UdpState {
    Initial,
    Bound,
    Connected,
    Closed,
}

/// Protocol-specific endpoint state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointState {
    Tcp(TcpState),
    Udp(UdpState),
    /// Protocols without a reportable state (ICMP, raw, packet).
    Stateless,
}

impl EndpointState {
    /// Whether the endpoint has not yet been bound, connected or listened on.
    pub fn is_initial(self) -> bool {
        matches!(
            self,
            EndpointState::Tcp(TcpState::Initial) | EndpointState::Udp(UdpState::Initial)
        )
    }
}

/// Congestion-control phase reported in [`TcpInfo`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CongestionState {
    #[default]
    Open,
    Disorder,
    RtoRecovery,
    FastRecovery,
    SackRecovery,
}

/// A snapshot of a TCP connection, for `TCP_INFO`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TcpInfo {
    pub state: TcpState,
    pub cc_state: CongestionState,
    pub rto: Duration,
    pub rtt: Duration,
    pub rtt_var: Duration,
    pub snd_ssthresh: u32,
    pub snd_cwnd: u32,
    pub reorder_seen: bool,
}

/// Path MTU discovery strategy.
///
/// [`IntOption::MtuDiscover`] carries one of these as its discriminant.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PmtuDiscovery {
    Want = 0,
    Dont = 1,
    Do = 2,
    Probe = 3,
}

impl PmtuDiscovery {
    /// Decode an [`IntOption::MtuDiscover`] value.
    pub fn from_raw(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::Want),
            1 => Some(Self::Dont),
            2 => Some(Self::Do),
            3 => Some(Self::Probe),
            _ => None,
        }
    }
}

impl From<PmtuDiscovery> for i32 {
    fn from(v: PmtuDiscovery) -> i32 {
        match v {
            PmtuDiscovery::Want => 0,
            PmtuDiscovery::Dont => 1,
            PmtuDiscovery::Do => 2,
            PmtuDiscovery::Probe => 3,
        }
    }
}

/// A multicast group membership change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MembershipRequest {
    pub nic: u32,
    pub interface_addr: Address,
    pub multicast_addr: Address,
}

/// A packet-socket ring request (`tpacket_req`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RingRequest {
    pub block_size: u32,
    pub block_nr: u32,
    pub frame_size: u32,
    pub frame_nr: u32,
}

/// Packet-socket receive statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PacketStatistics {
    pub packets: u32,
    pub dropped: u32,
}

/// Integer-valued endpoint options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntOption {
    KeepaliveCount,
    Ipv4Tos,
    Ipv6TrafficClass,
    MaxSegment,
    /// A [`PmtuDiscovery`] discriminant.
    MtuDiscover,
    MulticastTtl,
    ReceiveQueueSize,
    SendQueueSize,
    Ipv4Ttl,
    Ipv6HopLimit,
    TcpSynCount,
    TcpWindowClamp,
    Ipv6Checksum,
    PacketMmapVersion,
    PacketMmapReserve,
}

/// Names of structured endpoint options, for [`Endpoint::get_sock_opt`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SockOptName {
    KeepaliveIdle,
    KeepaliveInterval,
    TcpUserTimeout,
    CongestionControl,
    TcpLingerTimeout,
    TcpDeferAccept,
    TcpInfo,
    MulticastInterface,
    Icmpv6Filter,
    OriginalDestination,
    PacketStatistics,
}

/// Structured endpoint options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SockOpt {
    KeepaliveIdle(Duration),
    KeepaliveInterval(Duration),
    TcpUserTimeout(Duration),
    CongestionControl(String),
    /// `None` disables the FIN-WAIT-2 timeout override.
    TcpLingerTimeout(Option<Duration>),
    TcpDeferAccept(Duration),
    TcpInfo(TcpInfo),
    MulticastInterface { nic: u32, addr: Ipv4Addr },
    AddMembership(MembershipRequest),
    RemoveMembership(MembershipRequest),
    Icmpv6Filter([u32; 8]),
    OriginalDestination(FullAddress),
    PacketStatistics(PacketStatistics),
    PacketRxRing(RingRequest),
    DetachFilter,
}

/// A link-layer endpoint's memory-mapped receive ring.
pub trait PacketMmap: Send + Sync {
    /// Whether a ring has been set up.
    fn has_ring(&self) -> bool;
    /// Whether the ring is currently mapped into the guest.
    fn is_mapped(&self) -> bool;
    /// Allocate the ring described by `req`.
    fn init_ring(&self, req: &RingRequest) -> Result<(), EndpointError>;
    /// Release any ring state, mapped or not.
    fn teardown_ring(&self);
    /// Map the ring into the guest.
    fn map_ring(&self) -> Result<(), EndpointError>;
}

/// A transport endpoint, as consumed by the socket layer.
///
/// Implementations synchronize internally; every method takes `&self`.
pub trait Endpoint: Send + Sync {
    /// Behavioural class of this endpoint.
    fn kind(&self) -> SocketKind;

    /// Transport protocol implemented by this endpoint.
    fn transport(&self) -> TransportProtocol;

    /// The subset of `mask` that is currently ready.
    fn readiness(&self, mask: Events) -> Events;

    /// Read into `dst` without blocking.
    fn read(&self, dst: &mut [u8], opts: ReadOptions) -> Result<ReadResult, EndpointError>;

    /// Write from `src` without blocking. Returns the number of bytes accepted.
    fn write(&self, src: &[u8], opts: &WriteOptions) -> Result<usize, EndpointError>;

    /// Start (or poll the status of) a connection to `addr`.
    fn connect(&self, addr: &FullAddress) -> Result<(), EndpointError>;

    /// Dissociate from the connected peer.
    fn disconnect(&self) -> Result<(), EndpointError>;

    fn bind(&self, addr: &FullAddress) -> Result<(), EndpointError>;

    fn listen(&self, backlog: i32) -> Result<(), EndpointError>;

    /// Accept a pending connection without blocking.
    fn accept(&self, peer_requested: bool) -> Result<AcceptedEndpoint, EndpointError>;

    fn shutdown(&self, flags: ShutdownFlags) -> Result<(), EndpointError>;

    /// Release the endpoint. No I/O is issued after this; only [`state`](Self::state) may still
    /// be queried while a lingering close waits for the connection to wind down.
    fn close(&self);

    fn local_address(&self) -> Result<FullAddress, EndpointError>;

    fn remote_address(&self) -> Result<FullAddress, EndpointError>;

    fn get_sock_opt(&self, name: SockOptName) -> Result<SockOpt, EndpointError>;

    fn set_sock_opt(&self, opt: &SockOpt) -> Result<(), EndpointError>;

    fn get_sock_opt_int(&self, opt: IntOption) -> Result<i32, EndpointError>;

    fn set_sock_opt_int(&self, opt: IntOption, value: i32) -> Result<(), EndpointError>;

    /// The option block shared between the endpoint and the socket layer.
    fn socket_options(&self) -> &SocketOptions;

    fn state(&self) -> EndpointState;

    /// Hint that `copied` bytes were just consumed by the application, so the receive buffer can
    /// be tuned.
    fn moderate_recv_buf(&self, copied: usize) {
        let _ = copied;
    }

    /// The receive ring of a link-layer endpoint, if it supports one.
    fn packet_mmap(&self) -> Option<&dyn PacketMmap> {
        None
    }
}

bitflags! {
    /// Flags for the `receive` family of calls (`MSG_*`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ReceiveFlags: u32 {
        /// `MSG_OOB`: requests receipt of out-of-band data
        const OOB = 0x1;
        /// `MSG_PEEK`: requests to peek at incoming messages
        const PEEK = 0x2;
        /// `MSG_CTRUNC`: (output) control data was truncated
        const CTRUNC = 0x8;
        /// `MSG_TRUNC`: truncate the message, or (output) the message was truncated
        const TRUNC = 0x20;
        /// `MSG_DONTWAIT`: non-blocking operation
        const DONTWAIT = 0x40;
        /// `MSG_WAITALL`: wait for the full amount of data
        const WAITALL = 0x100;
        /// `MSG_ERRQUEUE`: destination for error messages
        const ERRQUEUE = 0x2000;
        /// `MSG_CMSG_CLOEXEC`: close-on-exec for the associated file descriptor
        const CMSG_CLOEXEC = 0x40000000;
        /// <https://docs.rs/bitflags/*/bitflags/#externally-defined-flags>
        const _ = !0;
    }
}

bitflags! {
    /// Flags for the `send` family of calls (`MSG_*`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SendFlags: u32 {
        /// `MSG_OOB`: sends out-of-band data.
        const OOB = 0x1;
        /// `MSG_DONTROUTE`: send the message directly to the interface, bypassing routing.
        const DONTROUTE = 0x4;
        /// `MSG_DONTWAIT`: non-blocking operation, do not wait for buffer space to become available.
        const DONTWAIT = 0x40;
        /// `MSG_EOR`: indicates the end of a record for message-oriented sockets.
        const EOR = 0x80;
        /// `MSG_CONFIRM`: requests confirmation of the message delivery.
        const CONFIRM = 0x800;
        /// `MSG_NOSIGNAL`: prevents the sending of SIGPIPE signals when writing to a socket that is closed.
        const NOSIGNAL = 0x4000;
        /// `MSG_MORE`: indicates that more data will follow.
        const MORE = 0x8000;
        /// <https://docs.rs/bitflags/*/bitflags/#externally-defined-flags>
        const _ = !0;
    }
}

