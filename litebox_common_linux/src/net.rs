// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Linux socket ABI: option names, wire structures, ioctl numbers, and `sockaddr` encoding.
//!
//! Option names are plain constants rather than enums because several levels reuse the same
//! number for a getter and a setter (e.g., `IPT_SO_GET_INFO` and `IPT_SO_SET_REPLACE`), and
//! because the setters must classify names they do not implement.

use alloc::vec::Vec;
use core::net::{Ipv4Addr, Ipv6Addr};

use litebox::net::{Address, FullAddress, LinkAddress};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::AddressFamily;
use crate::errno::Errno;

pub const SIZEOF_INT32: usize = 4;
pub const SIZEOF_LINGER: usize = size_of::<crate::Linger>();
pub const SIZEOF_TIMEVAL: usize = size_of::<crate::TimeVal>();
pub const SIZEOF_UCRED: usize = size_of::<crate::Ucred>();
pub const SIZEOF_SOCKADDR_IN: usize = size_of::<SockAddrIn>();
pub const SIZEOF_SOCKADDR_IN6: usize = size_of::<SockAddrIn6>();
pub const SIZEOF_SOCKADDR_LL: usize = size_of::<SockAddrLl>();
pub const SIZEOF_IP_MREQ: usize = size_of::<IpMreq>();
pub const SIZEOF_IP_MREQN: usize = size_of::<IpMreqn>();
pub const SIZEOF_IPV6_MREQ: usize = size_of::<Ipv6Mreq>();
pub const SIZEOF_TPACKET_REQ: usize = size_of::<TpacketReq>();
pub const SIZEOF_ICMP6_FILTER: usize = size_of::<Icmp6Filter>();
pub const SIZEOF_IFREQ: usize = size_of::<IfReq>();
/// Size of the family field that starts every `sockaddr`.
pub const SIZEOF_SA_FAMILY: usize = 2;
pub const SIZEOF_CMSGHDR: usize = size_of::<CmsgHdr>();

pub const IFNAMSIZ: usize = 16;
pub const TCP_CA_NAME_MAX: usize = 16;
pub const MAX_TCP_KEEPIDLE: i32 = 32767;
pub const MAX_TCP_KEEPINTVL: i32 = 32767;
pub const MAX_TCP_KEEPCNT: i32 = 127;
/// Fallback TTL when the stack cannot report its default.
pub const DEFAULT_TTL: i32 = 64;

// Option and control-message levels.
pub const SOL_IP: i32 = 0;
pub const SOL_SOCKET: i32 = 1;
pub const SOL_TCP: i32 = 6;
pub const SOL_IPV6: i32 = 41;

pub const SCM_RIGHTS: i32 = 1;
pub const SCM_CREDENTIALS: i32 = 2;

// SOL_SOCKET
pub const SO_DEBUG: i32 = 1;
pub const SO_REUSEADDR: i32 = 2;
pub const SO_TYPE: i32 = 3;
pub const SO_ERROR: i32 = 4;
pub const SO_DONTROUTE: i32 = 5;
pub const SO_BROADCAST: i32 = 6;
pub const SO_SNDBUF: i32 = 7;
pub const SO_RCVBUF: i32 = 8;
pub const SO_KEEPALIVE: i32 = 9;
pub const SO_OOBINLINE: i32 = 10;
pub const SO_NO_CHECK: i32 = 11;
pub const SO_PRIORITY: i32 = 12;
pub const SO_LINGER: i32 = 13;
pub const SO_BSDCOMPAT: i32 = 14;
pub const SO_REUSEPORT: i32 = 15;
pub const SO_PASSCRED: i32 = 16;
pub const SO_PEERCRED: i32 = 17;
pub const SO_RCVLOWAT: i32 = 18;
pub const SO_SNDLOWAT: i32 = 19;
pub const SO_RCVTIMEO: i32 = 20;
pub const SO_SNDTIMEO: i32 = 21;
pub const SO_BINDTODEVICE: i32 = 25;
pub const SO_ATTACH_FILTER: i32 = 26;
pub const SO_DETACH_FILTER: i32 = 27;
pub const SO_PEERNAME: i32 = 28;
pub const SO_TIMESTAMP: i32 = 29;
pub const SO_ACCEPTCONN: i32 = 30;
pub const SO_PEERSEC: i32 = 31;
pub const SO_SNDBUFFORCE: i32 = 32;
pub const SO_RCVBUFFORCE: i32 = 33;
pub const SO_PASSSEC: i32 = 34;
pub const SO_TIMESTAMPNS: i32 = 35;
pub const SO_MARK: i32 = 36;
pub const SO_TIMESTAMPING: i32 = 37;
pub const SO_PROTOCOL: i32 = 38;
pub const SO_DOMAIN: i32 = 39;
pub const SO_RXQ_OVFL: i32 = 40;
pub const SO_WIFI_STATUS: i32 = 41;
pub const SO_PEEK_OFF: i32 = 42;
pub const SO_NOFCS: i32 = 43;
pub const SO_LOCK_FILTER: i32 = 44;
pub const SO_SELECT_ERR_QUEUE: i32 = 45;
pub const SO_BUSY_POLL: i32 = 46;
pub const SO_MAX_PACING_RATE: i32 = 47;
pub const SO_BPF_EXTENSIONS: i32 = 48;
pub const SO_INCOMING_CPU: i32 = 49;
pub const SO_ATTACH_BPF: i32 = 50;
pub const SO_ATTACH_REUSEPORT_CBPF: i32 = 51;
pub const SO_ATTACH_REUSEPORT_EBPF: i32 = 52;
pub const SO_CNX_ADVICE: i32 = 53;
pub const SO_MEMINFO: i32 = 55;
pub const SO_INCOMING_NAPI_ID: i32 = 56;
pub const SO_COOKIE: i32 = 57;
pub const SO_PEERGROUPS: i32 = 59;
pub const SO_ZEROCOPY: i32 = 60;
pub const SO_TXTIME: i32 = 61;
pub const SO_BINDTOIFINDEX: i32 = 62;
pub const SO_TIMESTAMP_NEW: i32 = 63;
pub const SO_TIMESTAMPNS_NEW: i32 = 64;
pub const SO_TIMESTAMPING_NEW: i32 = 65;
pub const SO_RCVTIMEO_NEW: i32 = 66;
pub const SO_SNDTIMEO_NEW: i32 = 67;
pub const SO_DETACH_REUSEPORT_BPF: i32 = 68;
pub const SO_PREFER_BUSY_POLL: i32 = 69;
pub const SO_BUSY_POLL_BUDGET: i32 = 70;
pub const SO_NETNS_COOKIE: i32 = 71;
pub const SO_BUF_LOCK: i32 = 72;
pub const SO_RESERVE_MEM: i32 = 73;
pub const SO_TXREHASH: i32 = 74;
pub const SO_RCVMARK: i32 = 75;
pub const SO_PASSPIDFD: i32 = 76;
pub const SO_PEERPIDFD: i32 = 77;
pub const SO_DEVMEM_LINEAR: i32 = 78;
pub const SO_DEVMEM_DMABUF: i32 = 79;
pub const SO_DEVMEM_DONTNEED: i32 = 80;
pub const SO_RCVPRIORITY: i32 = 82;
pub const SCM_TIMESTAMP: i32 = SO_TIMESTAMP;

// SOL_TCP
pub const TCP_NODELAY: i32 = 1;
pub const TCP_MAXSEG: i32 = 2;
pub const TCP_CORK: i32 = 3;
pub const TCP_KEEPIDLE: i32 = 4;
pub const TCP_KEEPINTVL: i32 = 5;
pub const TCP_KEEPCNT: i32 = 6;
pub const TCP_SYNCNT: i32 = 7;
pub const TCP_LINGER2: i32 = 8;
pub const TCP_DEFER_ACCEPT: i32 = 9;
pub const TCP_WINDOW_CLAMP: i32 = 10;
pub const TCP_INFO: i32 = 11;
pub const TCP_QUICKACK: i32 = 12;
pub const TCP_CONGESTION: i32 = 13;
pub const TCP_MD5SIG: i32 = 14;
pub const TCP_THIN_LINEAR_TIMEOUTS: i32 = 16;
pub const TCP_THIN_DUPACK: i32 = 17;
pub const TCP_USER_TIMEOUT: i32 = 18;
pub const TCP_REPAIR: i32 = 19;
pub const TCP_REPAIR_QUEUE: i32 = 20;
pub const TCP_QUEUE_SEQ: i32 = 21;
pub const TCP_REPAIR_OPTIONS: i32 = 22;
pub const TCP_FASTOPEN: i32 = 23;
pub const TCP_TIMESTAMP: i32 = 24;
pub const TCP_NOTSENT_LOWAT: i32 = 25;
pub const TCP_CC_INFO: i32 = 26;
pub const TCP_SAVE_SYN: i32 = 27;
pub const TCP_SAVED_SYN: i32 = 28;
pub const TCP_REPAIR_WINDOW: i32 = 29;
pub const TCP_FASTOPEN_CONNECT: i32 = 30;
pub const TCP_ULP: i32 = 31;
pub const TCP_MD5SIG_EXT: i32 = 32;
pub const TCP_FASTOPEN_KEY: i32 = 33;
pub const TCP_FASTOPEN_NO_COOKIE: i32 = 34;
pub const TCP_ZEROCOPY_RECEIVE: i32 = 35;
pub const TCP_INQ: i32 = 36;
pub const TCP_TX_DELAY: i32 = 37;

// SOL_IP
pub const IP_TOS: i32 = 1;
pub const IP_TTL: i32 = 2;
pub const IP_HDRINCL: i32 = 3;
pub const IP_OPTIONS: i32 = 4;
pub const IP_ROUTER_ALERT: i32 = 5;
pub const IP_RECVOPTS: i32 = 6;
pub const IP_RETOPTS: i32 = 7;
pub const IP_PKTINFO: i32 = 8;
pub const IP_MTU_DISCOVER: i32 = 10;
pub const IP_RECVERR: i32 = 11;
pub const IP_RECVTTL: i32 = 12;
pub const IP_RECVTOS: i32 = 13;
pub const IP_FREEBIND: i32 = 15;
pub const IP_IPSEC_POLICY: i32 = 16;
pub const IP_XFRM_POLICY: i32 = 17;
pub const IP_PASSSEC: i32 = 18;
pub const IP_TRANSPARENT: i32 = 19;
pub const IP_RECVORIGDSTADDR: i32 = 20;
pub const IP_MINTTL: i32 = 21;
pub const IP_NODEFRAG: i32 = 22;
pub const IP_CHECKSUM: i32 = 23;
pub const IP_BIND_ADDRESS_NO_PORT: i32 = 24;
pub const IP_RECVFRAGSIZE: i32 = 25;
pub const IP_RECVERR_RFC4884: i32 = 26;
pub const IP_MULTICAST_IF: i32 = 32;
pub const IP_MULTICAST_TTL: i32 = 33;
pub const IP_MULTICAST_LOOP: i32 = 34;
pub const IP_ADD_MEMBERSHIP: i32 = 35;
pub const IP_DROP_MEMBERSHIP: i32 = 36;
pub const IP_UNBLOCK_SOURCE: i32 = 37;
pub const IP_BLOCK_SOURCE: i32 = 38;
pub const IP_ADD_SOURCE_MEMBERSHIP: i32 = 39;
pub const IP_DROP_SOURCE_MEMBERSHIP: i32 = 40;
pub const IP_MSFILTER: i32 = 41;
pub const MCAST_JOIN_GROUP: i32 = 42;
pub const MCAST_BLOCK_SOURCE: i32 = 43;
pub const MCAST_UNBLOCK_SOURCE: i32 = 44;
pub const MCAST_LEAVE_GROUP: i32 = 45;
pub const MCAST_JOIN_SOURCE_GROUP: i32 = 46;
pub const MCAST_LEAVE_SOURCE_GROUP: i32 = 47;
pub const MCAST_MSFILTER: i32 = 48;
pub const IP_MULTICAST_ALL: i32 = 49;
pub const IP_UNICAST_IF: i32 = 50;
pub const IP_LOCAL_PORT_RANGE: i32 = 51;
pub const SO_ORIGINAL_DST: i32 = 80;

pub const IP_PMTUDISC_DONT: i32 = 0;
pub const IP_PMTUDISC_WANT: i32 = 1;
pub const IP_PMTUDISC_DO: i32 = 2;
pub const IP_PMTUDISC_PROBE: i32 = 3;
pub const IP_PMTUDISC_INTERFACE: i32 = 4;
pub const IP_PMTUDISC_OMIT: i32 = 5;

// Netfilter, on SOL_IP / SOL_IPV6 of raw sockets.
pub const IPT_SO_SET_REPLACE: i32 = 64;
pub const IPT_SO_SET_ADD_COUNTERS: i32 = 65;
pub const IPT_SO_GET_INFO: i32 = 64;
pub const IPT_SO_GET_ENTRIES: i32 = 65;
pub const IPT_SO_GET_REVISION_MATCH: i32 = 66;
pub const IPT_SO_GET_REVISION_TARGET: i32 = 67;
pub const IP6T_SO_SET_REPLACE: i32 = 64;
pub const IP6T_SO_SET_ADD_COUNTERS: i32 = 65;
pub const IP6T_SO_GET_INFO: i32 = 64;
pub const IP6T_SO_GET_ENTRIES: i32 = 65;
pub const IP6T_SO_GET_REVISION_MATCH: i32 = 68;
pub const IP6T_SO_GET_REVISION_TARGET: i32 = 69;
pub const IP6T_ORIGINAL_DST: i32 = 80;
/// `sizeof(struct ipt_getinfo)`
pub const SIZEOF_IPT_GETINFO: usize = 84;
/// `sizeof(struct ipt_get_entries)`
pub const SIZEOF_IPT_GET_ENTRIES: usize = 40;
/// `sizeof(struct xt_get_revision)`
pub const SIZEOF_XT_GET_REVISION: usize = 30;
/// `sizeof(struct ipt_replace)`, which matches `struct ip6t_replace`
pub const SIZEOF_IPT_REPLACE: usize = 96;

// SOL_IPV6
pub const IPV6_ADDRFORM: i32 = 1;
pub const IPV6_2292PKTINFO: i32 = 2;
pub const IPV6_2292HOPOPTS: i32 = 3;
pub const IPV6_2292DSTOPTS: i32 = 4;
pub const IPV6_2292RTHDR: i32 = 5;
pub const IPV6_2292PKTOPTIONS: i32 = 6;
pub const IPV6_CHECKSUM: i32 = 7;
pub const IPV6_2292HOPLIMIT: i32 = 8;
pub const IPV6_FLOWINFO: i32 = 11;
pub const IPV6_UNICAST_HOPS: i32 = 16;
pub const IPV6_MULTICAST_IF: i32 = 17;
pub const IPV6_MULTICAST_HOPS: i32 = 18;
pub const IPV6_MULTICAST_LOOP: i32 = 19;
pub const IPV6_ADD_MEMBERSHIP: i32 = 20;
pub const IPV6_DROP_MEMBERSHIP: i32 = 21;
pub const IPV6_ROUTER_ALERT: i32 = 22;
pub const IPV6_MTU_DISCOVER: i32 = 23;
pub const IPV6_MTU: i32 = 24;
pub const IPV6_RECVERR: i32 = 25;
pub const IPV6_V6ONLY: i32 = 26;
pub const IPV6_JOIN_ANYCAST: i32 = 27;
pub const IPV6_LEAVE_ANYCAST: i32 = 28;
pub const IPV6_MULTICAST_ALL: i32 = 29;
pub const IPV6_ROUTER_ALERT_ISOLATE: i32 = 30;
pub const IPV6_RECVERR_RFC4884: i32 = 31;
pub const IPV6_FLOWLABEL_MGR: i32 = 32;
pub const IPV6_FLOWINFO_SEND: i32 = 33;
pub const IPV6_IPSEC_POLICY: i32 = 34;
pub const IPV6_XFRM_POLICY: i32 = 35;
pub const IPV6_RECVPKTINFO: i32 = 49;
pub const IPV6_PKTINFO: i32 = 50;
pub const IPV6_RECVHOPLIMIT: i32 = 51;
pub const IPV6_HOPLIMIT: i32 = 52;
pub const IPV6_RECVHOPOPTS: i32 = 53;
pub const IPV6_HOPOPTS: i32 = 54;
pub const IPV6_RTHDRDSTOPTS: i32 = 55;
pub const IPV6_RECVRTHDR: i32 = 56;
pub const IPV6_RTHDR: i32 = 57;
pub const IPV6_RECVDSTOPTS: i32 = 58;
pub const IPV6_DSTOPTS: i32 = 59;
pub const IPV6_RECVPATHMTU: i32 = 60;
pub const IPV6_PATHMTU: i32 = 61;
pub const IPV6_DONTFRAG: i32 = 62;
pub const IPV6_RECVTCLASS: i32 = 66;
pub const IPV6_TCLASS: i32 = 67;
pub const IPV6_AUTOFLOWLABEL: i32 = 70;
pub const IPV6_ADDR_PREFERENCES: i32 = 72;
pub const IPV6_MINHOPCOUNT: i32 = 73;
pub const IPV6_RECVORIGDSTADDR: i32 = 74;
pub const IPV6_TRANSPARENT: i32 = 75;
pub const IPV6_UNICAST_IF: i32 = 76;
pub const IPV6_RECVFRAGSIZE: i32 = 77;
pub const IPV6_FREEBIND: i32 = 78;

// SOL_ICMPV6
pub const ICMPV6_FILTER: i32 = 1;

// SOL_PACKET
pub const PACKET_ADD_MEMBERSHIP: i32 = 1;
pub const PACKET_DROP_MEMBERSHIP: i32 = 2;
pub const PACKET_RX_RING: i32 = 5;
pub const PACKET_STATISTICS: i32 = 6;
pub const PACKET_AUXDATA: i32 = 8;
pub const PACKET_VERSION: i32 = 10;
pub const PACKET_HDRLEN: i32 = 11;
pub const PACKET_RESERVE: i32 = 12;
pub const TPACKET_V1: i32 = 0;
pub const TPACKET_V2: i32 = 1;
/// `sizeof(struct tpacket_hdr)`
pub const TPACKET_V1_HDRLEN: i32 = 32;
/// `sizeof(struct tpacket2_hdr)`
pub const TPACKET_V2_HDRLEN: i32 = 32;

pub const PACKET_HOST: u8 = 0;
pub const PACKET_BROADCAST: u8 = 1;
pub const PACKET_MULTICAST: u8 = 2;
pub const PACKET_OTHERHOST: u8 = 3;
pub const PACKET_OUTGOING: u8 = 4;

// `sock_extended_err` origins.
pub const SO_EE_ORIGIN_NONE: u8 = 0;
pub const SO_EE_ORIGIN_LOCAL: u8 = 1;
pub const SO_EE_ORIGIN_ICMP: u8 = 2;
pub const SO_EE_ORIGIN_ICMP6: u8 = 3;

// `tcp_info` states and congestion-avoidance states.
pub const TCP_ESTABLISHED: u32 = 1;
pub const TCP_SYN_SENT: u32 = 2;
pub const TCP_SYN_RECV: u32 = 3;
pub const TCP_FIN_WAIT1: u32 = 4;
pub const TCP_FIN_WAIT2: u32 = 5;
pub const TCP_TIME_WAIT: u32 = 6;
pub const TCP_CLOSE: u32 = 7;
pub const TCP_CLOSE_WAIT: u32 = 8;
pub const TCP_LAST_ACK: u32 = 9;
pub const TCP_LISTEN: u32 = 10;
pub const TCP_CLOSING: u32 = 11;
pub const TCP_CA_OPEN: u8 = 0;
pub const TCP_CA_DISORDER: u8 = 1;
pub const TCP_CA_RECOVERY: u8 = 3;
pub const TCP_CA_LOSS: u8 = 4;

// ioctls
pub const TIOCOUTQ: u32 = 0x5411;
pub const TIOCINQ: u32 = 0x541B;
pub const SIOCGSTAMP: u32 = 0x8906;
pub const SIOCGIFNAME: u32 = 0x8910;
pub const SIOCGIFCONF: u32 = 0x8912;
pub const SIOCGIFFLAGS: u32 = 0x8913;
pub const SIOCGIFADDR: u32 = 0x8915;
pub const SIOCGIFDSTADDR: u32 = 0x8917;
pub const SIOCGIFBRDADDR: u32 = 0x8919;
pub const SIOCGIFNETMASK: u32 = 0x891b;
pub const SIOCGIFMETRIC: u32 = 0x891d;
pub const SIOCGIFMTU: u32 = 0x8921;
pub const SIOCGIFHWADDR: u32 = 0x8927;
pub const SIOCGIFINDEX: u32 = 0x8933;
pub const SIOCGIFTXQLEN: u32 = 0x8942;
pub const SIOCETHTOOL: u32 = 0x8946;
pub const SIOCGIFMAP: u32 = 0x8970;

/// `struct cmsghdr`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct CmsgHdr {
    /// Length of the header plus data, excluding trailing padding.
    pub len: u64,
    pub level: i32,
    pub type_: i32,
}

/// `CMSG_ALIGN`
pub const fn cmsg_align(len: usize) -> usize {
    (len + size_of::<u64>() - 1) & !(size_of::<u64>() - 1)
}

/// `CMSG_SPACE`
pub const fn cmsg_space(data_len: usize) -> usize {
    SIZEOF_CMSGHDR + cmsg_align(data_len)
}

/// `struct sockaddr_in`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct SockAddrIn {
    pub family: u16,
    /// Network byte order.
    pub port: [u8; 2],
    pub addr: [u8; 4],
    pub zero: [u8; 8],
}

/// `struct sockaddr_in6`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct SockAddrIn6 {
    pub family: u16,
    /// Network byte order.
    pub port: [u8; 2],
    pub flowinfo: u32,
    pub addr: [u8; 16],
    pub scope_id: u32,
}

/// `struct sockaddr_ll`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct SockAddrLl {
    pub family: u16,
    /// Network byte order.
    pub protocol: [u8; 2],
    pub ifindex: i32,
    pub hatype: u16,
    pub pkttype: u8,
    pub halen: u8,
    pub addr: [u8; 8],
}

/// `struct in_pktinfo`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct InPktinfo {
    pub ifindex: i32,
    pub spec_dst: [u8; 4],
    pub addr: [u8; 4],
}

/// `struct in6_pktinfo`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct In6Pktinfo {
    pub addr: [u8; 16],
    pub ifindex: u32,
}

/// `struct sock_extended_err`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct SockExtendedErr {
    pub errno: u32,
    pub origin: u8,
    pub type_: u8,
    pub code: u8,
    pub pad: u8,
    pub info: u32,
    pub data: u32,
}

/// `struct ip_mreq`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct IpMreq {
    pub multiaddr: [u8; 4],
    pub interface: [u8; 4],
}

/// `struct ip_mreqn`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct IpMreqn {
    pub multiaddr: [u8; 4],
    pub address: [u8; 4],
    pub ifindex: i32,
}

/// `struct ipv6_mreq`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct Ipv6Mreq {
    pub multiaddr: [u8; 16],
    pub ifindex: i32,
}

/// `struct tpacket_req`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct TpacketReq {
    pub block_size: u32,
    pub block_nr: u32,
    pub frame_size: u32,
    pub frame_nr: u32,
}

/// `struct tpacket_stats`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct TpacketStats {
    pub packets: u32,
    pub drops: u32,
}

/// `struct icmp6_filter`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct Icmp6Filter {
    pub data: [u32; 8],
}

/// `struct ifreq`: an interface name followed by a 24-byte union.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct IfReq {
    pub name: [u8; IFNAMSIZ],
    pub data: [u8; 24],
}

impl IfReq {
    /// The interface name, up to the first NUL.
    pub fn name(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(IFNAMSIZ);
        &self.name[..end]
    }

    /// Store `name`, truncated so a terminating NUL always fits.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; IFNAMSIZ];
        let n = name.len().min(IFNAMSIZ - 1);
        self.name[..n].copy_from_slice(&name.as_bytes()[..n]);
    }
}

/// `struct tcp_info`, in the layout the guest's headers expect.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct TcpInfo {
    pub state: u8,
    pub ca_state: u8,
    pub retransmits: u8,
    pub probes: u8,
    pub backoff: u8,
    pub options: u8,
    pub window_scale: u8,
    pub delivery_rate_app_limited: u8,
    pub rto: u32,
    pub ato: u32,
    pub snd_mss: u32,
    pub rcv_mss: u32,
    pub unacked: u32,
    pub sacked: u32,
    pub lost: u32,
    pub retrans: u32,
    pub fackets: u32,
    pub last_data_sent: u32,
    pub last_ack_sent: u32,
    pub last_data_recv: u32,
    pub last_ack_recv: u32,
    pub pmtu: u32,
    pub rcv_ssthresh: u32,
    pub rtt: u32,
    pub rtt_var: u32,
    pub snd_ssthresh: u32,
    pub snd_cwnd: u32,
    pub advmss: u32,
    pub reordering: u32,
    pub rcv_rtt: u32,
    pub rcv_space: u32,
    pub total_retrans: u32,
    pub pacing_rate: u64,
    pub max_pacing_rate: u64,
    pub bytes_acked: u64,
    pub bytes_received: u64,
    pub segs_out: u32,
    pub segs_in: u32,
    pub not_sent_bytes: u32,
    pub min_rtt: u32,
    pub data_segs_in: u32,
    pub data_segs_out: u32,
    pub delivery_rate: u64,
    pub busy_time: u64,
    pub rwnd_limited: u64,
    pub snd_buf_limited: u64,
    pub delivered: u32,
    pub delivered_ce: u32,
    pub bytes_sent: u64,
    pub bytes_retrans: u64,
    pub dsack_dups: u32,
    pub reord_seen: u32,
}

/// Read a native-endian `i32` from the start of an option buffer.
pub fn read_i32(optval: &[u8]) -> Result<i32, Errno> {
    i32::read_from_prefix(optval)
        .map(|(v, _)| v)
        .map_err(|_| Errno::EINVAL)
}

/// Read a native-endian `u32` from the start of an option buffer.
pub fn read_u32(optval: &[u8]) -> Result<u32, Errno> {
    u32::read_from_prefix(optval)
        .map(|(v, _)| v)
        .map_err(|_| Errno::EINVAL)
}

/// Read a structure from the start of an option buffer.
pub fn read_struct<T: FromBytes>(optval: &[u8]) -> Result<T, Errno> {
    T::read_from_prefix(optval)
        .map(|(v, _)| v)
        .map_err(|_| Errno::EINVAL)
}

fn family_of(sockaddr: &[u8]) -> Result<u16, Errno> {
    u16::read_from_prefix(sockaddr)
        .map(|(v, _)| v)
        .map_err(|_| Errno::EINVAL)
}

/// Whether `addr` is an IPv6 unicast link-local address, which carries an interface scope.
fn is_link_local(addr: &Ipv6Addr) -> bool {
    addr.segments()[0] & 0xffc0 == 0xfe80
}

/// Parse a guest `sockaddr` into an endpoint address and the family it was written in.
///
/// The IP "any" addresses become [`Address::Unspecified`].
pub fn address_and_family(sockaddr: &[u8]) -> Result<(FullAddress, u16), Errno> {
    let family = family_of(sockaddr)?;
    match AddressFamily::try_from(family) {
        Ok(AddressFamily::INET) => {
            let a: SockAddrIn = read_struct(sockaddr)?;
            let ip = Ipv4Addr::from(a.addr);
            Ok((
                FullAddress {
                    nic: 0,
                    addr: if ip.is_unspecified() {
                        Address::Unspecified
                    } else {
                        Address::V4(ip)
                    },
                    port: u16::from_be_bytes(a.port),
                },
                family,
            ))
        }
        Ok(AddressFamily::INET6) => {
            let a: SockAddrIn6 = read_struct(sockaddr)?;
            let ip = Ipv6Addr::from(a.addr);
            Ok((
                FullAddress {
                    nic: if is_link_local(&ip) { a.scope_id } else { 0 },
                    addr: if ip.is_unspecified() {
                        Address::Unspecified
                    } else {
                        Address::V6(ip)
                    },
                    port: u16::from_be_bytes(a.port),
                },
                family,
            ))
        }
        Ok(AddressFamily::PACKET) => {
            let a = parse_link_address(sockaddr)?;
            if usize::from(a.halen) != size_of::<LinkAddress>() {
                return Err(Errno::EINVAL);
            }
            Ok((link_full_address(&a), family))
        }
        Ok(AddressFamily::UNSPEC) => Ok((FullAddress::default(), family)),
        _ => Err(Errno::EAFNOSUPPORT),
    }
}

/// Parse a `sockaddr_ll`, which must be complete.
pub fn parse_link_address(sockaddr: &[u8]) -> Result<SockAddrLl, Errno> {
    if sockaddr.len() < SIZEOF_SOCKADDR_LL {
        return Err(Errno::EINVAL);
    }
    read_struct(sockaddr)
}

/// The endpoint address a `sockaddr_ll` names: interface, hardware address, and link protocol.
pub fn link_full_address(a: &SockAddrLl) -> FullAddress {
    let mut hw = [0u8; 6];
    hw.copy_from_slice(&a.addr[..6]);
    FullAddress {
        nic: a.ifindex.cast_unsigned(),
        addr: Address::Link(LinkAddress(hw)),
        port: u16::from_be_bytes(a.protocol),
    }
}

/// Encode an endpoint address as a guest `sockaddr` of `family`.
///
/// An IPv4 address reported to an `AF_INET6` socket is returned in its IPv4-mapped form.
pub fn convert_address(family: AddressFamily, addr: &FullAddress) -> Vec<u8> {
    match family {
        AddressFamily::INET6 => {
            let ip = match addr.addr {
                Address::V6(ip) => ip,
                Address::V4(ip) => ip.to_ipv6_mapped(),
                Address::Unspecified | Address::Link(_) => Ipv6Addr::UNSPECIFIED,
            };
            SockAddrIn6 {
                family: AddressFamily::INET6.into(),
                port: addr.port.to_be_bytes(),
                flowinfo: 0,
                addr: ip.octets(),
                scope_id: if is_link_local(&ip) { addr.nic } else { 0 },
            }
            .as_bytes()
            .to_vec()
        }
        AddressFamily::PACKET => {
            let mut out = SockAddrLl {
                family: AddressFamily::PACKET.into(),
                protocol: addr.port.to_be_bytes(),
                ifindex: addr.nic.cast_signed(),
                ..SockAddrLl::default()
            };
            if let Address::Link(LinkAddress(hw)) = addr.addr {
                out.halen = 6;
                out.addr[..6].copy_from_slice(&hw);
            }
            out.as_bytes().to_vec()
        }
        _ => {
            let ip = match addr.addr {
                Address::V4(ip) => ip,
                Address::V6(ip) => ip.to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED),
                Address::Unspecified | Address::Link(_) => Ipv4Addr::UNSPECIFIED,
            };
            SockAddrIn {
                family: AddressFamily::INET.into(),
                port: addr.port.to_be_bytes(),
                addr: ip.octets(),
                zero: [0; 8],
            }
            .as_bytes()
            .to_vec()
        }
    }
}

/// Minimum `sockaddr` length accepted for a socket of `family`.
pub fn min_sockaddr_len(family: AddressFamily) -> usize {
    match family {
        AddressFamily::INET => SIZEOF_SOCKADDR_IN,
        AddressFamily::INET6 => SIZEOF_SOCKADDR_IN6,
        AddressFamily::PACKET => SIZEOF_SOCKADDR_LL,
        _ => SIZEOF_SA_FAMILY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_struct_sizes() {
        assert_eq!(SIZEOF_SOCKADDR_IN, 16);
        assert_eq!(SIZEOF_SOCKADDR_IN6, 28);
        assert_eq!(SIZEOF_SOCKADDR_LL, 20);
        assert_eq!(size_of::<InPktinfo>(), 12);
        assert_eq!(size_of::<In6Pktinfo>(), 20);
        assert_eq!(size_of::<SockExtendedErr>(), 16);
        assert_eq!(SIZEOF_IP_MREQ, 8);
        assert_eq!(SIZEOF_IP_MREQN, 12);
        assert_eq!(SIZEOF_IPV6_MREQ, 20);
        assert_eq!(SIZEOF_TPACKET_REQ, 16);
        assert_eq!(size_of::<TpacketStats>(), 8);
        assert_eq!(SIZEOF_ICMP6_FILTER, 32);
        assert_eq!(SIZEOF_IFREQ, 40);
        assert_eq!(size_of::<TcpInfo>(), 224);
        assert_eq!(SIZEOF_CMSGHDR, 16);
    }

    #[test]
    fn cmsg_space_rounds_to_eight() {
        assert_eq!(cmsg_align(1), 8);
        assert_eq!(cmsg_align(16), 16);
        assert_eq!(cmsg_space(4), 24);
        assert_eq!(cmsg_space(size_of::<crate::TimeVal>()), 32);
    }

    #[test]
    fn inet_any_parses_as_unspecified() {
        let raw = SockAddrIn {
            family: 2,
            port: 8080u16.to_be_bytes(),
            ..SockAddrIn::default()
        };
        let (addr, family) = address_and_family(raw.as_bytes()).unwrap();
        assert_eq!(family, 2);
        assert_eq!(addr.addr, Address::Unspecified);
        assert_eq!(addr.port, 8080);
    }

    #[test]
    fn short_inet6_address_is_rejected() {
        let raw = SockAddrIn6 {
            family: 10,
            ..SockAddrIn6::default()
        };
        assert_eq!(
            address_and_family(&raw.as_bytes()[..20]),
            Err(Errno::EINVAL)
        );
    }

    #[test]
    fn unknown_family_is_not_supported() {
        assert_eq!(address_and_family(&[1, 0, 0, 0]), Err(Errno::EAFNOSUPPORT));
        assert_eq!(address_and_family(&[0]), Err(Errno::EINVAL));
    }

    #[test]
    fn inet_address_round_trips() {
        let addr = FullAddress {
            nic: 0,
            addr: Address::V4(Ipv4Addr::new(192, 168, 1, 7)),
            port: 53,
        };
        let bytes = convert_address(AddressFamily::INET, &addr);
        assert_eq!(bytes.len(), SIZEOF_SOCKADDR_IN);
        assert_eq!(address_and_family(&bytes).unwrap(), (addr, 2));
    }

    #[test]
    fn v4_address_on_inet6_socket_is_mapped() {
        let addr = FullAddress {
            nic: 0,
            addr: Address::V4(Ipv4Addr::new(10, 1, 2, 3)),
            port: 1,
        };
        let bytes = convert_address(AddressFamily::INET6, &addr);
        let (parsed, family) = address_and_family(&bytes).unwrap();
        assert_eq!(family, 10);
        assert_eq!(
            parsed.addr,
            Address::V6(Ipv4Addr::new(10, 1, 2, 3).to_ipv6_mapped())
        );
    }

    #[test]
    fn link_local_inet6_keeps_scope() {
        let ip: Ipv6Addr = "fe80::1".parse().unwrap();
        let addr = FullAddress {
            nic: 3,
            addr: Address::V6(ip),
            port: 7,
        };
        let bytes = convert_address(AddressFamily::INET6, &addr);
        assert_eq!(address_and_family(&bytes).unwrap().0, addr);
    }

    #[test]
    fn link_address_encoding() {
        let addr = FullAddress {
            nic: 2,
            addr: Address::Link(LinkAddress([1, 2, 3, 4, 5, 6])),
            port: 0x0800,
        };
        let bytes = convert_address(AddressFamily::PACKET, &addr);
        let ll = parse_link_address(&bytes).unwrap();
        assert_eq!(ll.protocol, [0x08, 0x00]);
        assert_eq!(ll.halen, 6);
        assert_eq!(link_full_address(&ll), addr);
    }

    #[test]
    fn ifreq_names_are_nul_terminated() {
        let mut ifr = IfReq::default();
        ifr.set_name("a-very-long-interface-name");
        assert_eq!(ifr.name().len(), IFNAMSIZ - 1);
        ifr.set_name("lo");
        assert_eq!(ifr.name(), b"lo");
    }
}
