// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! `getsockopt(2)` and `setsockopt(2)`.
//!
//! Options are decoded from the guest's byte buffers and applied either to the endpoint's shared
//! [`SocketOptions`](litebox::net::SocketOptions) block, to the endpoint's typed option surface,
//! or to state the socket keeps itself (`SO_TIMESTAMP`, `TCP_INQ`). Options Linux knows about but
//! that are not implemented are accepted and reported to a [`SockOptMetrics`] sink.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::net::Ipv4Addr;
use core::time::Duration;

use litebox::net::{
    Address, CongestionState, EndpointError, EndpointState, IntOption, LingerOption,
    MembershipRequest, NetworkProtocol, PmtuDiscovery, RingRequest, SockOpt, SockOptName,
    TcpState, UdpState,
};
use litebox::utils::{ReinterpretSignedExt as _, ReinterpretUnsignedExt as _, TruncateExt as _};
use litebox_common_linux::{
    AddressFamily, Linger, SockType, SocketOptionLevel, TimeVal, Ucred,
    errno::Errno,
    net::{
        self as linux, IpMreq, IpMreqn, Ipv6Mreq, TpacketReq, TpacketStats, read_i32, read_struct,
        read_u32,
    },
};
use zerocopy::IntoBytes;

use super::net::{Socket, tcp_state_to_linux};

/// Credentials of the task making the call, for `SO_PEERCRED` and privileged options.
#[derive(Clone, Copy, Debug, Default)]
pub struct Caller {
    pub pid: i32,
    pub uid: u32,
    pub gid: u32,
    /// Holds `CAP_NET_ADMIN`.
    pub net_admin: bool,
}

/// Why an option was accepted without effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionUse {
    /// A Linux option that is not implemented.
    Unsupported,
    /// An option name this layer does not recognize.
    Unknown,
}

/// Sink for options that are accepted but have no effect.
pub trait SockOptMetrics: Send + Sync {
    fn record(&self, level: i32, name: i32, kind: OptionUse);
}

/// A [`SockOptMetrics`] that drops everything.
pub struct NoopMetrics;

impl SockOptMetrics for NoopMetrics {
    fn record(&self, _level: i32, _name: i32, _kind: OptionUse) {}
}

/// Apply a requested `SO_SNDBUF`/`SO_RCVBUF` size the way Linux does: cap at `max` (unless
/// forced), then double to account for bookkeeping overhead, never going below `min`.
pub fn clamp_buf_size(v: i64, min: i64, max: i64, ignore_max: bool) -> i64 {
    let v = if !ignore_max && v > max { max } else { v };
    if v < i64::from(i32::MAX / 2) {
        (2 * v).max(min)
    } else {
        i64::from(i32::MAX)
    }
}

/// Options that take either an `int` or a single byte.
pub fn int_or_char(optval: &[u8]) -> Result<i32, Errno> {
    match optval.len() {
        0 => Err(Errno::EINVAL),
        1..4 => Ok(i32::from(optval[0])),
        _ => read_i32(optval),
    }
}

const SOCKET_UNSUPPORTED: &[i32] = &[
    linux::SO_DEBUG,
    linux::SO_TYPE,
    linux::SO_ERROR,
    linux::SO_DONTROUTE,
    linux::SO_PRIORITY,
    linux::SO_BSDCOMPAT,
    linux::SO_PEERCRED,
    linux::SO_SNDLOWAT,
    linux::SO_ATTACH_FILTER,
    linux::SO_PEERNAME,
    linux::SO_TIMESTAMPNS,
    linux::SO_TIMESTAMPING,
    linux::SO_ACCEPTCONN,
    linux::SO_PEERSEC,
    linux::SO_SNDBUFFORCE,
    linux::SO_PASSSEC,
    linux::SO_MARK,
    linux::SO_PROTOCOL,
    linux::SO_DOMAIN,
    linux::SO_RXQ_OVFL,
    linux::SO_WIFI_STATUS,
    linux::SO_PEEK_OFF,
    linux::SO_NOFCS,
    linux::SO_LOCK_FILTER,
    linux::SO_SELECT_ERR_QUEUE,
    linux::SO_BUSY_POLL,
    linux::SO_MAX_PACING_RATE,
    linux::SO_BPF_EXTENSIONS,
    linux::SO_INCOMING_CPU,
    linux::SO_ATTACH_BPF,
    linux::SO_ATTACH_REUSEPORT_CBPF,
    linux::SO_ATTACH_REUSEPORT_EBPF,
    linux::SO_CNX_ADVICE,
    linux::SO_MEMINFO,
    linux::SO_INCOMING_NAPI_ID,
    linux::SO_COOKIE,
    linux::SO_PEERGROUPS,
    linux::SO_ZEROCOPY,
    linux::SO_TXTIME,
    linux::SO_BINDTOIFINDEX,
    linux::SO_TIMESTAMP_NEW,
    linux::SO_TIMESTAMPNS_NEW,
    linux::SO_TIMESTAMPING_NEW,
    linux::SO_RCVTIMEO_NEW,
    linux::SO_SNDTIMEO_NEW,
    linux::SO_DETACH_REUSEPORT_BPF,
    linux::SO_PREFER_BUSY_POLL,
    linux::SO_BUSY_POLL_BUDGET,
    linux::SO_NETNS_COOKIE,
    linux::SO_BUF_LOCK,
    linux::SO_RESERVE_MEM,
    linux::SO_TXREHASH,
    linux::SO_RCVMARK,
    linux::SO_PASSPIDFD,
    linux::SO_PEERPIDFD,
    linux::SO_DEVMEM_LINEAR,
    linux::SO_DEVMEM_DMABUF,
    linux::SO_DEVMEM_DONTNEED,
    linux::SO_RCVPRIORITY,
];

const TCP_UNSUPPORTED: &[i32] = &[
    linux::TCP_INFO,
    linux::TCP_MD5SIG,
    linux::TCP_THIN_LINEAR_TIMEOUTS,
    linux::TCP_THIN_DUPACK,
    linux::TCP_REPAIR,
    linux::TCP_REPAIR_QUEUE,
    linux::TCP_QUEUE_SEQ,
    linux::TCP_REPAIR_OPTIONS,
    linux::TCP_FASTOPEN,
    linux::TCP_TIMESTAMP,
    linux::TCP_NOTSENT_LOWAT,
    linux::TCP_CC_INFO,
    linux::TCP_SAVE_SYN,
    linux::TCP_SAVED_SYN,
    linux::TCP_REPAIR_WINDOW,
    linux::TCP_FASTOPEN_CONNECT,
    linux::TCP_ULP,
    linux::TCP_MD5SIG_EXT,
    linux::TCP_FASTOPEN_KEY,
    linux::TCP_FASTOPEN_NO_COOKIE,
    linux::TCP_ZEROCOPY_RECEIVE,
    linux::TCP_TX_DELAY,
];

const IP_UNSUPPORTED: &[i32] = &[
    linux::IP_RECVOPTS,
    linux::IP_RETOPTS,
    linux::IP_ROUTER_ALERT,
    linux::IP_FREEBIND,
    linux::IP_PASSSEC,
    linux::IP_TRANSPARENT,
    linux::IP_MINTTL,
    linux::IP_NODEFRAG,
    linux::IP_BIND_ADDRESS_NO_PORT,
    linux::IP_UNICAST_IF,
    linux::IP_MULTICAST_ALL,
    linux::IP_CHECKSUM,
    linux::IP_RECVFRAGSIZE,
    linux::IP_RECVERR_RFC4884,
    linux::IP_LOCAL_PORT_RANGE,
    linux::IP_OPTIONS,
    linux::IP_MSFILTER,
    linux::IP_BLOCK_SOURCE,
    linux::IP_UNBLOCK_SOURCE,
    linux::IP_ADD_SOURCE_MEMBERSHIP,
    linux::IP_DROP_SOURCE_MEMBERSHIP,
    linux::MCAST_LEAVE_GROUP,
    linux::MCAST_JOIN_SOURCE_GROUP,
    linux::MCAST_LEAVE_SOURCE_GROUP,
    linux::MCAST_BLOCK_SOURCE,
    linux::MCAST_UNBLOCK_SOURCE,
    linux::MCAST_MSFILTER,
    linux::IP_IPSEC_POLICY,
    linux::IP_XFRM_POLICY,
    linux::IPT_SO_SET_ADD_COUNTERS,
];

const IPV6_UNSUPPORTED: &[i32] = &[
    linux::IPV6_IPSEC_POLICY,
    linux::IPV6_JOIN_ANYCAST,
    linux::IPV6_LEAVE_ANYCAST,
    linux::IPV6_PKTINFO,
    linux::IPV6_ROUTER_ALERT,
    linux::IPV6_XFRM_POLICY,
    linux::MCAST_BLOCK_SOURCE,
    linux::MCAST_JOIN_GROUP,
    linux::MCAST_JOIN_SOURCE_GROUP,
    linux::MCAST_LEAVE_GROUP,
    linux::MCAST_LEAVE_SOURCE_GROUP,
    linux::MCAST_UNBLOCK_SOURCE,
];

/// Accepted with no effect and not reported.
const IPV6_IGNORED: &[i32] = &[
    linux::IPV6_MULTICAST_LOOP,
    linux::IPV6_MULTICAST_HOPS,
    linux::IPV6_MTU,
    linux::IPV6_MINHOPCOUNT,
    linux::IPV6_RECVERR_RFC4884,
    linux::IPV6_MULTICAST_ALL,
    linux::IPV6_AUTOFLOWLABEL,
    linux::IPV6_DONTFRAG,
    linux::IPV6_ROUTER_ALERT_ISOLATE,
    linux::IPV6_MTU_DISCOVER,
    linux::IPV6_FLOWINFO_SEND,
    linux::IPV6_ADDR_PREFERENCES,
    linux::IPV6_MULTICAST_IF,
    linux::IPV6_UNICAST_IF,
    linux::IPV6_ADDRFORM,
    linux::IPV6_2292PKTINFO,
    linux::IPV6_2292HOPLIMIT,
    linux::IPV6_2292RTHDR,
    linux::IPV6_2292PKTOPTIONS,
    linux::IPV6_2292DSTOPTS,
    linux::IPV6_2292HOPOPTS,
    linux::IPV6_RECVRTHDR,
    linux::IPV6_RECVHOPOPTS,
    linux::IPV6_RECVDSTOPTS,
    linux::IPV6_FLOWINFO,
    linux::IPV6_RECVPATHMTU,
    linux::IPV6_TRANSPARENT,
    linux::IPV6_FREEBIND,
    linux::IPV6_HOPOPTS,
    linux::IPV6_RTHDRDSTOPTS,
    linux::IPV6_RTHDR,
    linux::IPV6_DSTOPTS,
    linux::MCAST_MSFILTER,
    linux::IPV6_FLOWLABEL_MGR,
    linux::IPV6_RECVFRAGSIZE,
];

/// An `int` result, once `optval` is known to hold one.
fn get_int(optval: &[u8], f: impl FnOnce() -> Result<i32, Errno>) -> Result<Vec<u8>, Errno> {
    if optval.len() < linux::SIZEOF_INT32 {
        return Err(Errno::EINVAL);
    }
    Ok(f()?.to_ne_bytes().to_vec())
}

fn get_bool(optval: &[u8], v: bool) -> Result<Vec<u8>, Errno> {
    get_int(optval, || Ok(i32::from(v)))
}

fn secs(d: Duration) -> i32 {
    i32::try_from(d.as_secs()).unwrap_or(i32::MAX)
}

fn micros(d: Duration) -> u32 {
    u32::try_from(d.as_micros()).unwrap_or(u32::MAX)
}

fn linux_tcp_info(info: &litebox::net::TcpInfo) -> linux::TcpInfo {
    linux::TcpInfo {
        state: tcp_state_to_linux(info.state).truncate(),
        ca_state: match info.cc_state {
            CongestionState::Open => linux::TCP_CA_OPEN,
            CongestionState::Disorder => linux::TCP_CA_DISORDER,
            CongestionState::RtoRecovery => linux::TCP_CA_LOSS,
            CongestionState::FastRecovery | CongestionState::SackRecovery => {
                linux::TCP_CA_RECOVERY
            }
        },
        rto: micros(info.rto),
        rtt: micros(info.rtt),
        rtt_var: micros(info.rtt_var),
        snd_ssthresh: info.snd_ssthresh,
        snd_cwnd: info.snd_cwnd,
        reord_seen: u32::from(info.reorder_seen),
        ..linux::TcpInfo::default()
    }
}

fn pmtu_to_linux(v: PmtuDiscovery) -> i32 {
    match v {
        PmtuDiscovery::Dont => linux::IP_PMTUDISC_DONT,
        PmtuDiscovery::Want => linux::IP_PMTUDISC_WANT,
        PmtuDiscovery::Do => linux::IP_PMTUDISC_DO,
        PmtuDiscovery::Probe => linux::IP_PMTUDISC_PROBE,
    }
}

fn ipv4_or_any(octets: [u8; 4]) -> Address {
    let addr = Ipv4Addr::from(octets);
    if addr.is_unspecified() {
        Address::Unspecified
    } else {
        Address::V4(addr)
    }
}

/// Decode an `ip_mreqn`, an `ip_mreq`, or (when `allow_addr`) a bare interface `in_addr`.
fn parse_ipv4_mreq(optval: &[u8], allow_addr: bool) -> Result<MembershipRequest, Errno> {
    if optval.len() < size_of::<u32>() {
        return Err(Errno::EINVAL);
    }
    if optval.len() < linux::SIZEOF_IP_MREQ {
        if !allow_addr {
            return Err(Errno::EINVAL);
        }
        let addr: [u8; 4] = read_struct(optval)?;
        return Ok(MembershipRequest {
            nic: 0,
            interface_addr: ipv4_or_any(addr),
            multicast_addr: Address::Unspecified,
        });
    }
    if optval.len() >= linux::SIZEOF_IP_MREQN {
        let req: IpMreqn = read_struct(optval)?;
        return Ok(MembershipRequest {
            nic: req.ifindex.reinterpret_as_unsigned(),
            interface_addr: ipv4_or_any(req.address),
            multicast_addr: Address::V4(Ipv4Addr::from(req.multiaddr)),
        });
    }
    let req: IpMreq = read_struct(optval)?;
    Ok(MembershipRequest {
        nic: 0,
        interface_addr: ipv4_or_any(req.interface),
        multicast_addr: Address::V4(Ipv4Addr::from(req.multiaddr)),
    })
}

fn parse_ipv6_mreq(optval: &[u8]) -> Result<MembershipRequest, Errno> {
    if optval.len() < linux::SIZEOF_IPV6_MREQ {
        return Err(Errno::EINVAL);
    }
    let req: Ipv6Mreq = read_struct(optval)?;
    Ok(MembershipRequest {
        nic: req.ifindex.reinterpret_as_unsigned(),
        interface_addr: Address::Unspecified,
        multicast_addr: Address::V6(req.multiaddr.into()),
    })
}

impl<Platform: litebox::platform::Provider> Socket<Platform> {
    fn record_unused(&self, level: i32, name: i32, kind: OptionUse) {
        self.metrics.record(level, name, kind);
        log_unsupported!(self.platform, "socket option {kind:?}: level {level} name {name}");
    }

    fn default_ttl(&self, proto: NetworkProtocol) -> i32 {
        self.with_stack(|stack| Ok(stack.default_ttl(proto)))
            .ok()
            .flatten()
            .map_or(linux::DEFAULT_TTL, i32::from)
    }

    /// `getsockopt(2)`: the bytes to copy back, never longer than `optval`.
    pub fn get_sock_opt(
        &self,
        caller: &Caller,
        level: i32,
        name: i32,
        optval: &[u8],
    ) -> Result<Vec<u8>, Errno> {
        let mut out = match SocketOptionLevel::try_from(level) {
            Ok(SocketOptionLevel::SOCKET) => self.get_socket_opt(caller, name, optval),
            Ok(SocketOptionLevel::TCP) => self.get_tcp_opt(name, optval),
            Ok(SocketOptionLevel::IPV6) => self.get_ipv6_opt(name, optval),
            Ok(SocketOptionLevel::IP) => self.get_ip_opt(name, optval),
            Ok(SocketOptionLevel::ICMPV6) => self.get_icmpv6_opt(name, optval),
            Ok(SocketOptionLevel::PACKET) => self.get_packet_opt(name, optval),
            Ok(SocketOptionLevel::UDP | SocketOptionLevel::RAW) | Err(_) => {
                Err(Errno::ENOPROTOOPT)
            }
        }?;
        out.truncate(optval.len());
        Ok(out)
    }

    /// `setsockopt(2)`.
    pub fn set_sock_opt(
        &self,
        caller: &Caller,
        level: i32,
        name: i32,
        optval: &[u8],
    ) -> Result<(), Errno> {
        match SocketOptionLevel::try_from(level) {
            Ok(SocketOptionLevel::SOCKET) => self.set_socket_opt(caller, name, optval),
            Ok(SocketOptionLevel::TCP) => self.set_tcp_opt(name, optval),
            Ok(SocketOptionLevel::ICMPV6) => self.set_icmpv6_opt(name, optval),
            Ok(SocketOptionLevel::IPV6) => self.set_ipv6_opt(name, optval),
            Ok(SocketOptionLevel::IP) => self.set_ip_opt(name, optval),
            Ok(SocketOptionLevel::PACKET) => self.set_packet_opt(name, optval),
            Ok(SocketOptionLevel::UDP | SocketOptionLevel::RAW) | Err(_) => {
                self.record_unused(level, name, OptionUse::Unknown);
                Ok(())
            }
        }
    }

    fn get_socket_opt(&self, caller: &Caller, name: i32, optval: &[u8]) -> Result<Vec<u8>, Errno> {
        let so = self.endpoint.socket_options();
        match name {
            linux::SO_ERROR => get_int(optval, || {
                Ok(so.take_last_error().map_or(0, |e| i32::from(Errno::from(e))))
            }),
            linux::SO_PEERCRED => {
                if self.ty.family != AddressFamily::UNIX || optval.len() < linux::SIZEOF_UCRED {
                    return Err(Errno::EINVAL);
                }
                let cred = Ucred {
                    pid: caller.pid,
                    uid: caller.uid,
                    gid: caller.gid,
                };
                Ok(cred.as_bytes().to_vec())
            }
            linux::SO_PASSCRED => get_bool(optval, so.pass_cred()),
            linux::SO_SNDBUF => get_int(optval, || {
                Ok(i32::try_from(so.send_buffer_size()).unwrap_or(i32::MAX))
            }),
            linux::SO_RCVBUF => get_int(optval, || {
                Ok(i32::try_from(so.receive_buffer_size()).unwrap_or(i32::MAX))
            }),
            linux::SO_REUSEADDR => get_bool(optval, so.reuse_address()),
            linux::SO_REUSEPORT => get_bool(optval, so.reuse_port()),
            linux::SO_BINDTODEVICE => {
                let nic = so.bound_device();
                if nic == 0 {
                    return Ok(Vec::new());
                }
                if optval.len() < linux::IFNAMSIZ {
                    return Err(Errno::EINVAL);
                }
                self.with_stack(|stack| {
                    let iface = stack.interfaces().remove(&nic).ok_or(Errno::ENODEV)?;
                    let mut name = iface.name.into_bytes();
                    name.push(0);
                    Ok(name)
                })
            }
            linux::SO_BROADCAST => get_bool(optval, so.broadcast()),
            linux::SO_KEEPALIVE => get_bool(optval, so.keep_alive()),
            linux::SO_LINGER => {
                if optval.len() < linux::SIZEOF_LINGER {
                    return Err(Errno::EINVAL);
                }
                let linger = so.linger();
                Ok(Linger {
                    l_onoff: i32::from(linger.enabled),
                    l_linger: secs(linger.timeout),
                }
                .as_bytes()
                .to_vec())
            }
            linux::SO_SNDTIMEO | linux::SO_RCVTIMEO => {
                if optval.len() < linux::SIZEOF_TIMEVAL {
                    return Err(Errno::EINVAL);
                }
                let timeout = if name == linux::SO_SNDTIMEO {
                    so.send_timeout()
                } else {
                    so.receive_timeout()
                };
                Ok(TimeVal::from_timeout(timeout).as_bytes().to_vec())
            }
            linux::SO_OOBINLINE => get_bool(optval, so.oob_inline()),
            linux::SO_NO_CHECK => get_bool(optval, so.no_checksum()),
            linux::SO_ACCEPTCONN => get_bool(optval, so.accept_conn()),
            linux::SO_RCVLOWAT => get_int(optval, || Ok(so.rcv_lowat())),
            linux::SO_TIMESTAMP => get_bool(optval, self.read_state.lock().timestamp_enabled),
            linux::SO_TYPE => get_int(optval, || {
                Ok(u32::from(self.ty.sock_type).reinterpret_as_signed())
            }),
            linux::SO_DOMAIN => get_int(optval, || Ok(i32::from(u16::from(self.ty.family)))),
            linux::SO_PROTOCOL => get_int(optval, || Ok(self.ty.protocol)),
            _ => Err(Errno::ENOPROTOOPT),
        }
    }

    fn set_socket_opt(&self, caller: &Caller, name: i32, optval: &[u8]) -> Result<(), Errno> {
        let so = self.endpoint.socket_options();
        match name {
            linux::SO_SNDBUF => {
                // Sizes are unsigned, so a negative request asks for the maximum.
                let v = read_u32(optval)?;
                let limits = so.send_buffer_limits();
                so.set_send_buffer_size(clamp_buf_size(
                    i64::from(v),
                    limits.min,
                    limits.max,
                    false,
                ));
            }
            linux::SO_RCVBUF | linux::SO_RCVBUFFORCE => {
                let force = name == linux::SO_RCVBUFFORCE;
                if force && !caller.net_admin {
                    return Err(Errno::EPERM);
                }
                let v = read_u32(optval)?;
                let limits = so.receive_buffer_limits();
                so.set_receive_buffer_size(clamp_buf_size(
                    i64::from(v),
                    limits.min,
                    limits.max,
                    force,
                ));
            }
            linux::SO_REUSEADDR => so.set_reuse_address(read_i32(optval)? != 0),
            linux::SO_REUSEPORT => so.set_reuse_port(read_i32(optval)? != 0),
            linux::SO_BROADCAST => so.set_broadcast(read_i32(optval)? != 0),
            linux::SO_PASSCRED => so.set_pass_cred(read_i32(optval)? != 0),
            linux::SO_KEEPALIVE => so.set_keep_alive(read_i32(optval)? != 0),
            linux::SO_OOBINLINE => so.set_oob_inline(read_i32(optval)? != 0),
            linux::SO_NO_CHECK => so.set_no_checksum(read_i32(optval)? != 0),
            linux::SO_RCVLOWAT => {
                let v = read_i32(optval)?;
                so.set_rcv_lowat(if v < 0 { i32::MAX } else { v });
            }
            linux::SO_TIMESTAMP => {
                self.read_state.lock().timestamp_enabled = read_i32(optval)? != 0;
            }
            linux::SO_BINDTODEVICE => {
                let end = optval.iter().position(|&b| b == 0).unwrap_or(optval.len());
                let name = &optval[..end];
                if name.is_empty() {
                    so.set_bound_device(0);
                    return Ok(());
                }
                let name = core::str::from_utf8(name).map_err(|_| Errno::ENODEV)?;
                let nic =
                    self.with_stack(|stack| stack.interface_index(name).ok_or(Errno::ENODEV))?;
                so.set_bound_device(nic);
            }
            linux::SO_SNDTIMEO | linux::SO_RCVTIMEO => {
                if optval.len() < linux::SIZEOF_TIMEVAL {
                    return Err(Errno::EINVAL);
                }
                let timeout = read_struct::<TimeVal>(optval)?.to_timeout()?;
                if name == linux::SO_SNDTIMEO {
                    so.set_send_timeout(timeout);
                } else {
                    so.set_receive_timeout(timeout);
                }
            }
            linux::SO_LINGER => {
                if optval.len() < linux::SIZEOF_LINGER {
                    return Err(Errno::EINVAL);
                }
                let linger: Linger = read_struct(optval)?;
                so.set_linger(LingerOption {
                    enabled: linger.l_onoff != 0,
                    timeout: Duration::from_secs(u64::from(
                        linger.l_linger.max(0).reinterpret_as_unsigned(),
                    )),
                });
            }
            linux::SO_DETACH_FILTER => self.endpoint.set_sock_opt(&SockOpt::DetachFilter)?,
            _ if SOCKET_UNSUPPORTED.contains(&name) => {
                self.record_unused(linux::SOL_SOCKET, name, OptionUse::Unsupported);
            }
            _ => self.record_unused(linux::SOL_SOCKET, name, OptionUse::Unknown),
        }
        Ok(())
    }

    fn get_tcp_opt(&self, name: i32, optval: &[u8]) -> Result<Vec<u8>, Errno> {
        if !self.is_tcp() {
            return Err(Errno::ENOPROTOOPT);
        }
        let so = self.endpoint.socket_options();
        let ep = &self.endpoint;
        match name {
            linux::TCP_NODELAY => get_bool(optval, !so.delay()),
            linux::TCP_CORK => get_bool(optval, so.cork()),
            linux::TCP_QUICKACK => get_bool(optval, so.quick_ack()),
            linux::TCP_MAXSEG => get_int(optval, || Ok(ep.get_sock_opt_int(IntOption::MaxSegment)?)),
            linux::TCP_KEEPIDLE => get_int(optval, || {
                let SockOpt::KeepaliveIdle(d) = ep.get_sock_opt(SockOptName::KeepaliveIdle)? else {
                    return Err(Errno::EINVAL);
                };
                Ok(secs(d))
            }),
            linux::TCP_KEEPINTVL => get_int(optval, || {
                let SockOpt::KeepaliveInterval(d) =
                    ep.get_sock_opt(SockOptName::KeepaliveInterval)?
                else {
                    return Err(Errno::EINVAL);
                };
                Ok(secs(d))
            }),
            linux::TCP_KEEPCNT => {
                get_int(optval, || Ok(ep.get_sock_opt_int(IntOption::KeepaliveCount)?))
            }
            linux::TCP_USER_TIMEOUT => get_int(optval, || {
                let SockOpt::TcpUserTimeout(d) = ep.get_sock_opt(SockOptName::TcpUserTimeout)?
                else {
                    return Err(Errno::EINVAL);
                };
                Ok(i32::try_from(d.as_millis()).unwrap_or(i32::MAX))
            }),
            linux::TCP_INQ => get_bool(optval, self.read_state.lock().inq_enabled),
            linux::TCP_INFO => {
                let SockOpt::TcpInfo(info) = ep.get_sock_opt(SockOptName::TcpInfo)? else {
                    return Err(Errno::EINVAL);
                };
                Ok(linux_tcp_info(&info).as_bytes().to_vec())
            }
            linux::TCP_CONGESTION => {
                if optval.is_empty() {
                    return Err(Errno::EINVAL);
                }
                let SockOpt::CongestionControl(cc) =
                    ep.get_sock_opt(SockOptName::CongestionControl)?
                else {
                    return Err(Errno::EINVAL);
                };
                let mut out = vec![0u8; linux::TCP_CA_NAME_MAX.min(optval.len())];
                let n = cc.len().min(out.len());
                out[..n].copy_from_slice(&cc.as_bytes()[..n]);
                Ok(out)
            }
            linux::TCP_LINGER2 => get_int(optval, || {
                let SockOpt::TcpLingerTimeout(d) = ep.get_sock_opt(SockOptName::TcpLingerTimeout)?
                else {
                    return Err(Errno::EINVAL);
                };
                Ok(d.map_or(-1, secs))
            }),
            linux::TCP_DEFER_ACCEPT => get_int(optval, || {
                let SockOpt::TcpDeferAccept(d) = ep.get_sock_opt(SockOptName::TcpDeferAccept)?
                else {
                    return Err(Errno::EINVAL);
                };
                Ok(secs(d))
            }),
            linux::TCP_SYNCNT => {
                get_int(optval, || Ok(ep.get_sock_opt_int(IntOption::TcpSynCount)?))
            }
            linux::TCP_WINDOW_CLAMP => {
                get_int(optval, || Ok(ep.get_sock_opt_int(IntOption::TcpWindowClamp)?))
            }
            _ => Err(Errno::ENOPROTOOPT),
        }
    }

    fn set_tcp_opt(&self, name: i32, optval: &[u8]) -> Result<(), Errno> {
        if !self.is_tcp() {
            return Err(Errno::ENOPROTOOPT);
        }
        let so = self.endpoint.socket_options();
        let ep = &self.endpoint;
        match name {
            linux::TCP_NODELAY => so.set_delay(read_i32(optval)? == 0),
            linux::TCP_CORK => so.set_cork(read_i32(optval)? != 0),
            linux::TCP_QUICKACK => so.set_quick_ack(read_i32(optval)? != 0),
            linux::TCP_MAXSEG => ep.set_sock_opt_int(IntOption::MaxSegment, read_i32(optval)?)?,
            linux::TCP_KEEPIDLE | linux::TCP_KEEPINTVL => {
                let v = read_i32(optval)?;
                let max = if name == linux::TCP_KEEPIDLE {
                    linux::MAX_TCP_KEEPIDLE
                } else {
                    linux::MAX_TCP_KEEPINTVL
                };
                if !(1..=max).contains(&v) {
                    return Err(Errno::EINVAL);
                }
                let d = Duration::from_secs(u64::from(v.reinterpret_as_unsigned()));
                ep.set_sock_opt(&if name == linux::TCP_KEEPIDLE {
                    SockOpt::KeepaliveIdle(d)
                } else {
                    SockOpt::KeepaliveInterval(d)
                })?;
            }
            linux::TCP_KEEPCNT => {
                let v = read_i32(optval)?;
                if !(1..=linux::MAX_TCP_KEEPCNT).contains(&v) {
                    return Err(Errno::EINVAL);
                }
                ep.set_sock_opt_int(IntOption::KeepaliveCount, v)?;
            }
            linux::TCP_USER_TIMEOUT => {
                let v = read_i32(optval)?;
                if v < 0 {
                    return Err(Errno::EINVAL);
                }
                ep.set_sock_opt(&SockOpt::TcpUserTimeout(Duration::from_millis(u64::from(
                    v.reinterpret_as_unsigned(),
                ))))?;
            }
            linux::TCP_CONGESTION => {
                let cc = String::from_utf8_lossy(optval).into_owned();
                ep.set_sock_opt(&SockOpt::CongestionControl(cc))?;
            }
            linux::TCP_LINGER2 => {
                let v = read_i32(optval)?;
                let d = (v >= 0).then(|| Duration::from_secs(u64::from(v.reinterpret_as_unsigned())));
                ep.set_sock_opt(&SockOpt::TcpLingerTimeout(d))?;
            }
            linux::TCP_DEFER_ACCEPT => {
                let v = read_i32(optval)?.max(0);
                ep.set_sock_opt(&SockOpt::TcpDeferAccept(Duration::from_secs(u64::from(
                    v.reinterpret_as_unsigned(),
                ))))?;
            }
            linux::TCP_SYNCNT => ep.set_sock_opt_int(IntOption::TcpSynCount, read_i32(optval)?)?,
            linux::TCP_WINDOW_CLAMP => {
                ep.set_sock_opt_int(IntOption::TcpWindowClamp, read_i32(optval)?)?;
            }
            linux::TCP_INQ => self.read_state.lock().inq_enabled = read_i32(optval)? != 0,
            _ if TCP_UNSUPPORTED.contains(&name) => {
                self.record_unused(linux::SOL_TCP, name, OptionUse::Unsupported);
            }
            _ => self.record_unused(linux::SOL_TCP, name, OptionUse::Unknown),
        }
        Ok(())
    }

    fn get_ip_opt(&self, name: i32, optval: &[u8]) -> Result<Vec<u8>, Errno> {
        let so = self.endpoint.socket_options();
        let ep = &self.endpoint;
        match name {
            linux::IP_TTL => get_int(optval, || {
                let v = ep.get_sock_opt_int(IntOption::Ipv4Ttl)?;
                Ok(if v == 0 {
                    self.default_ttl(NetworkProtocol::Ipv4)
                } else {
                    v
                })
            }),
            linux::IP_RECVTTL => get_bool(optval, so.receive_ttl()),
            linux::IP_MULTICAST_TTL => {
                get_int(optval, || Ok(ep.get_sock_opt_int(IntOption::MulticastTtl)?))
            }
            linux::IP_MULTICAST_IF => {
                if optval.len() < size_of::<u32>() {
                    return Err(Errno::EINVAL);
                }
                let SockOpt::MulticastInterface { addr, .. } =
                    ep.get_sock_opt(SockOptName::MulticastInterface)?
                else {
                    return Err(Errno::EINVAL);
                };
                Ok(addr.octets().to_vec())
            }
            linux::IP_MULTICAST_LOOP => get_bool(optval, so.multicast_loop()),
            linux::IP_TOS => {
                if optval.is_empty() {
                    return Ok(Vec::new());
                }
                let v = ep.get_sock_opt_int(IntOption::Ipv4Tos)?;
                if optval.len() < linux::SIZEOF_INT32 {
                    Ok(vec![v.reinterpret_as_unsigned().truncate()])
                } else {
                    Ok(v.to_ne_bytes().to_vec())
                }
            }
            linux::IP_RECVTOS => get_bool(optval, so.receive_tos()),
            linux::IP_RECVERR => get_bool(optval, so.ip_recv_error()),
            linux::IP_PKTINFO => get_bool(optval, so.receive_packet_info()),
            linux::IP_HDRINCL => get_bool(optval, so.hdr_included()),
            linux::IP_RECVORIGDSTADDR => get_bool(optval, so.receive_original_dst_address()),
            linux::SO_ORIGINAL_DST => {
                if optval.len() < linux::SIZEOF_SOCKADDR_IN {
                    return Err(Errno::EINVAL);
                }
                let SockOpt::OriginalDestination(addr) =
                    ep.get_sock_opt(SockOptName::OriginalDestination)?
                else {
                    return Err(Errno::EINVAL);
                };
                Ok(linux::convert_address(AddressFamily::INET, &addr))
            }
            linux::IP_MTU_DISCOVER => get_int(optval, || {
                let v = ep.get_sock_opt_int(IntOption::MtuDiscover)?;
                let v = PmtuDiscovery::from_raw(v).ok_or(Errno::EINVAL)?;
                Ok(pmtu_to_linux(v))
            }),
            linux::IPT_SO_GET_INFO
            | linux::IPT_SO_GET_ENTRIES
            | linux::IPT_SO_GET_REVISION_MATCH
            | linux::IPT_SO_GET_REVISION_TARGET => {
                self.netfilter_get(NetworkProtocol::Ipv4, name, optval)
            }
            _ => Err(Errno::ENOPROTOOPT),
        }
    }

    fn set_ip_opt(&self, name: i32, optval: &[u8]) -> Result<(), Errno> {
        let so = self.endpoint.socket_options();
        let ep = &self.endpoint;
        match name {
            linux::IP_MULTICAST_TTL => {
                let mut v = int_or_char(optval)?;
                if v == -1 {
                    v = 1;
                }
                if !(0..=255).contains(&v) {
                    return Err(Errno::EINVAL);
                }
                ep.set_sock_opt_int(IntOption::MulticastTtl, v)?;
            }
            linux::IP_ADD_MEMBERSHIP => {
                ep.set_sock_opt(&SockOpt::AddMembership(parse_ipv4_mreq(optval, false)?))?;
            }
            linux::IP_DROP_MEMBERSHIP => {
                ep.set_sock_opt(&SockOpt::RemoveMembership(parse_ipv4_mreq(optval, false)?))?;
            }
            linux::IP_MULTICAST_IF => {
                let req = parse_ipv4_mreq(optval, true)?;
                let addr = match req.interface_addr {
                    Address::V4(addr) => addr,
                    _ => Ipv4Addr::UNSPECIFIED,
                };
                ep.set_sock_opt(&SockOpt::MulticastInterface { nic: req.nic, addr })?;
            }
            linux::IP_MULTICAST_LOOP => so.set_multicast_loop(int_or_char(optval)? != 0),
            linux::MCAST_JOIN_GROUP => return Err(Errno::EINVAL),
            linux::IP_TTL => {
                let v = read_i32(optval)?;
                let v = match v {
                    -1 => 0,
                    1..=255 => v,
                    _ => return Err(Errno::EINVAL),
                };
                ep.set_sock_opt_int(IntOption::Ipv4Ttl, v)?;
            }
            linux::IP_RECVTTL => so.set_receive_ttl(read_i32(optval)? != 0),
            linux::IP_TOS => {
                if optval.is_empty() {
                    return Ok(());
                }
                ep.set_sock_opt_int(IntOption::Ipv4Tos, int_or_char(optval)?)?;
            }
            linux::IP_RECVTOS => so.set_receive_tos(read_i32(optval)? != 0),
            linux::IP_RECVERR => so.set_ip_recv_error(read_i32(optval)? != 0),
            linux::IP_PKTINFO => so.set_receive_packet_info(read_i32(optval)? != 0),
            linux::IP_HDRINCL => so.set_hdr_included(read_i32(optval)? != 0),
            linux::IP_RECVORIGDSTADDR => {
                if optval.is_empty() {
                    return Ok(());
                }
                so.set_receive_original_dst_address(read_i32(optval)? != 0);
            }
            linux::IPT_SO_SET_REPLACE => self.netfilter_set(NetworkProtocol::Ipv4, optval)?,
            linux::IP_MTU_DISCOVER => {
                let v = match read_i32(optval)? {
                    linux::IP_PMTUDISC_DONT => PmtuDiscovery::Dont,
                    linux::IP_PMTUDISC_WANT => PmtuDiscovery::Want,
                    linux::IP_PMTUDISC_DO => PmtuDiscovery::Do,
                    linux::IP_PMTUDISC_PROBE => PmtuDiscovery::Probe,
                    linux::IP_PMTUDISC_INTERFACE | linux::IP_PMTUDISC_OMIT => return Ok(()),
                    _ => return Err(Errno::EOPNOTSUPP),
                };
                ep.set_sock_opt_int(IntOption::MtuDiscover, i32::from(v))?;
            }
            _ if IP_UNSUPPORTED.contains(&name) => {
                self.record_unused(linux::SOL_IP, name, OptionUse::Unsupported);
            }
            _ => self.record_unused(linux::SOL_IP, name, OptionUse::Unknown),
        }
        Ok(())
    }

    fn get_ipv6_opt(&self, name: i32, optval: &[u8]) -> Result<Vec<u8>, Errno> {
        if self.ty.family != AddressFamily::INET6 {
            return Err(Errno::EOPNOTSUPP);
        }
        let so = self.endpoint.socket_options();
        let ep = &self.endpoint;
        match name {
            linux::IPV6_CHECKSUM => {
                get_int(optval, || Ok(ep.get_sock_opt_int(IntOption::Ipv6Checksum)?))
            }
            linux::IPV6_V6ONLY => get_bool(optval, so.v6_only()),
            linux::IPV6_UNICAST_HOPS => get_int(optval, || {
                let v = ep.get_sock_opt_int(IntOption::Ipv6HopLimit)?;
                Ok(if v == -1 {
                    self.default_ttl(NetworkProtocol::Ipv6)
                } else {
                    v
                })
            }),
            linux::IPV6_RECVHOPLIMIT => get_bool(optval, so.receive_hop_limit()),
            linux::IPV6_TCLASS => {
                if optval.is_empty() {
                    return Ok(Vec::new());
                }
                let v = ep.get_sock_opt_int(IntOption::Ipv6TrafficClass)?;
                Ok(v.reinterpret_as_unsigned().to_ne_bytes().to_vec())
            }
            linux::IPV6_RECVTCLASS => get_bool(optval, so.receive_tclass()),
            linux::IPV6_RECVERR => get_bool(optval, so.ipv6_recv_error()),
            linux::IPV6_RECVORIGDSTADDR => get_bool(optval, so.receive_original_dst_address()),
            linux::IPV6_RECVPKTINFO => get_bool(optval, so.receive_ipv6_packet_info()),
            linux::IP6T_ORIGINAL_DST => {
                if optval.len() < linux::SIZEOF_SOCKADDR_IN6 {
                    return Err(Errno::EINVAL);
                }
                let SockOpt::OriginalDestination(addr) =
                    ep.get_sock_opt(SockOptName::OriginalDestination)?
                else {
                    return Err(Errno::EINVAL);
                };
                Ok(linux::convert_address(AddressFamily::INET6, &addr))
            }
            linux::IP6T_SO_GET_INFO
            | linux::IP6T_SO_GET_ENTRIES
            | linux::IP6T_SO_GET_REVISION_MATCH
            | linux::IP6T_SO_GET_REVISION_TARGET => {
                self.netfilter_get(NetworkProtocol::Ipv6, name, optval)
            }
            _ => Err(Errno::ENOPROTOOPT),
        }
    }

    fn set_ipv6_opt(&self, name: i32, optval: &[u8]) -> Result<(), Errno> {
        if self.ty.family != AddressFamily::INET6 {
            return Err(Errno::ENOPROTOOPT);
        }
        let so = self.endpoint.socket_options();
        let ep = &self.endpoint;
        match name {
            linux::IPV6_CHECKSUM => {
                ep.set_sock_opt_int(IntOption::Ipv6Checksum, read_i32(optval)?)?;
            }
            linux::IPV6_V6ONLY => {
                let v = read_i32(optval)?;
                let initial = match ep.state() {
                    EndpointState::Tcp(state) => state == TcpState::Initial,
                    EndpointState::Udp(state) => state == UdpState::Initial,
                    EndpointState::Stateless => true,
                };
                if !initial {
                    return Err(Errno::EINVAL);
                }
                so.set_v6_only(v != 0);
            }
            linux::IPV6_ADD_MEMBERSHIP => {
                ep.set_sock_opt(&SockOpt::AddMembership(parse_ipv6_mreq(optval)?))?;
            }
            linux::IPV6_DROP_MEMBERSHIP => {
                ep.set_sock_opt(&SockOpt::RemoveMembership(parse_ipv6_mreq(optval)?))?;
            }
            linux::IPV6_RECVORIGDSTADDR => {
                so.set_receive_original_dst_address(read_i32(optval)? != 0);
            }
            linux::IPV6_RECVPKTINFO => so.set_receive_ipv6_packet_info(read_i32(optval)? != 0),
            linux::IPV6_UNICAST_HOPS => {
                let v = read_i32(optval)?;
                if !(-1..=255).contains(&v) {
                    return Err(Errno::EINVAL);
                }
                ep.set_sock_opt_int(IntOption::Ipv6HopLimit, v)?;
            }
            linux::IPV6_RECVHOPLIMIT => so.set_receive_hop_limit(int_or_char(optval)? != 0),
            linux::IPV6_RECVTCLASS => so.set_receive_tclass(int_or_char(optval)? != 0),
            linux::IPV6_TCLASS => {
                let v = read_i32(optval)?;
                if !(-1..=255).contains(&v) {
                    return Err(Errno::EINVAL);
                }
                ep.set_sock_opt_int(IntOption::Ipv6TrafficClass, v.max(0))?;
            }
            linux::IPV6_RECVERR => {
                if optval.is_empty() {
                    return Ok(());
                }
                so.set_ipv6_recv_error(int_or_char(optval)? != 0);
            }
            linux::IP6T_SO_SET_REPLACE => self.netfilter_set(NetworkProtocol::Ipv6, optval)?,
            _ if IPV6_UNSUPPORTED.contains(&name) => {
                self.record_unused(linux::SOL_IPV6, name, OptionUse::Unsupported);
            }
            _ if IPV6_IGNORED.contains(&name) => {}
            _ => self.record_unused(linux::SOL_IPV6, name, OptionUse::Unknown),
        }
        Ok(())
    }

    fn get_icmpv6_opt(&self, name: i32, _optval: &[u8]) -> Result<Vec<u8>, Errno> {
        if self.ty.family != AddressFamily::INET6 {
            return Err(Errno::EOPNOTSUPP);
        }
        if name != linux::ICMPV6_FILTER {
            return Err(Errno::ENOPROTOOPT);
        }
        let SockOpt::Icmpv6Filter(data) = self.endpoint.get_sock_opt(SockOptName::Icmpv6Filter)?
        else {
            return Err(Errno::EINVAL);
        };
        Ok(linux::Icmp6Filter { data }.as_bytes().to_vec())
    }

    fn set_icmpv6_opt(&self, name: i32, optval: &[u8]) -> Result<(), Errno> {
        if self.ty.family != AddressFamily::INET6 {
            return Err(Errno::ENOPROTOOPT);
        }
        if name == linux::ICMPV6_FILTER {
            if optval.len() < linux::SIZEOF_ICMP6_FILTER {
                return Err(Errno::EINVAL);
            }
            let filter: linux::Icmp6Filter = read_struct(optval)?;
            self.endpoint
                .set_sock_opt(&SockOpt::Icmpv6Filter(filter.data))?;
        }
        Ok(())
    }

    fn get_packet_opt(&self, name: i32, optval: &[u8]) -> Result<Vec<u8>, Errno> {
        match name {
            linux::PACKET_HDRLEN => {
                let version = read_i32(optval)?;
                get_int(optval, || match version {
                    linux::TPACKET_V1 => Ok(linux::TPACKET_V1_HDRLEN),
                    linux::TPACKET_V2 => Ok(linux::TPACKET_V2_HDRLEN),
                    _ => Err(Errno::EINVAL),
                })
            }
            linux::PACKET_STATISTICS => {
                let SockOpt::PacketStatistics(stats) =
                    self.endpoint.get_sock_opt(SockOptName::PacketStatistics)?
                else {
                    return Err(Errno::EINVAL);
                };
                Ok(TpacketStats {
                    packets: stats.packets,
                    drops: stats.dropped,
                }
                .as_bytes()
                .to_vec())
            }
            _ => Err(Errno::ENOPROTOOPT),
        }
    }

    fn set_packet_opt(&self, name: i32, optval: &[u8]) -> Result<(), Errno> {
        let ep = &self.endpoint;
        match name {
            linux::PACKET_RX_RING => {
                if optval.len() < linux::SIZEOF_TPACKET_REQ {
                    return Err(Errno::EINVAL);
                }
                let req: TpacketReq = read_struct(optval)?;
                let req = RingRequest {
                    block_size: req.block_size,
                    block_nr: req.block_nr,
                    frame_size: req.frame_size,
                    frame_nr: req.frame_nr,
                };
                ep.set_sock_opt(&SockOpt::PacketRxRing(req))?;
                let ring = ep.packet_mmap().ok_or(Errno::EOPNOTSUPP)?;
                if ring.is_mapped() {
                    return Err(Errno::EBUSY);
                }
                if req.frame_nr != 0 && req.block_nr != 0
                    && let Err(e) = ring.init_ring(&req)
                {
                    ring.teardown_ring();
                    return Err(e.into());
                }
            }
            linux::PACKET_VERSION => {
                ep.set_sock_opt_int(IntOption::PacketMmapVersion, read_i32(optval)?)?;
            }
            linux::PACKET_RESERVE => {
                ep.set_sock_opt_int(IntOption::PacketMmapReserve, read_i32(optval)?)?;
            }
            linux::PACKET_ADD_MEMBERSHIP | linux::PACKET_AUXDATA => {}
            _ => return Err(Errno::EOPNOTSUPP),
        }
        Ok(())
    }

    /// Only raw sockets of the filter's own family reach the packet filter.
    fn is_raw_of(&self, proto: NetworkProtocol) -> bool {
        let family = match proto {
            NetworkProtocol::Ipv4 => AddressFamily::INET,
            NetworkProtocol::Ipv6 => AddressFamily::INET6,
        };
        self.ty.sock_type == SockType::Raw && self.ty.family == family
    }

    fn netfilter_get(
        &self,
        proto: NetworkProtocol,
        name: i32,
        optval: &[u8],
    ) -> Result<Vec<u8>, Errno> {
        let min = match name {
            linux::IPT_SO_GET_INFO => linux::SIZEOF_IPT_GETINFO,
            linux::IPT_SO_GET_ENTRIES => linux::SIZEOF_IPT_GET_ENTRIES,
            _ => linux::SIZEOF_XT_GET_REVISION,
        };
        if optval.len() < min {
            return Err(Errno::EINVAL);
        }
        if !self.is_raw_of(proto) {
            return Err(Errno::ENOPROTOOPT);
        }
        self.with_stack(|stack| {
            let filter = stack.packet_filter().ok_or(Errno::ENOPROTOOPT)?;
            Ok(filter.get(proto, name, optval)?)
        })
    }

    fn netfilter_set(&self, proto: NetworkProtocol, optval: &[u8]) -> Result<(), Errno> {
        if optval.len() < linux::SIZEOF_IPT_REPLACE {
            return Err(Errno::EINVAL);
        }
        if !self.is_raw_of(proto) {
            return Err(Errno::ENOPROTOOPT);
        }
        self.with_stack(|stack| {
            let filter = stack.packet_filter().ok_or(Errno::ENOPROTOOPT)?;
            filter.set(proto, optval).map_err(|e| match e {
                EndpointError::InvalidOptionValue => Errno::EINVAL,
                e => e.into(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sizes_double_within_limits() {
        assert_eq!(clamp_buf_size(1024, 4096, 1 << 20, false), 4096);
        assert_eq!(clamp_buf_size(8192, 4096, 1 << 20, false), 16384);
        assert_eq!(clamp_buf_size(1 << 24, 4096, 1 << 20, false), 1 << 21);
        assert_eq!(clamp_buf_size(1 << 24, 4096, 1 << 20, true), 1 << 25);
        assert_eq!(
            clamp_buf_size(i64::from(i32::MAX), 4096, 1 << 20, true),
            i64::from(i32::MAX)
        );
    }

    #[test]
    fn int_or_char_widths() {
        assert_eq!(int_or_char(&[]), Err(Errno::EINVAL));
        assert_eq!(int_or_char(&[7]), Ok(7));
        assert_eq!(int_or_char(&[7, 1, 0]), Ok(7));
        assert_eq!(int_or_char(&300i32.to_ne_bytes()), Ok(300));
    }

    #[test]
    fn ipv4_membership_forms() {
        let mreqn = IpMreqn {
            multiaddr: [224, 0, 0, 1],
            address: [0, 0, 0, 0],
            ifindex: 2,
        };
        let req = parse_ipv4_mreq(mreqn.as_bytes(), false).unwrap();
        assert_eq!(req.nic, 2);
        assert_eq!(req.interface_addr, Address::Unspecified);
        assert_eq!(req.multicast_addr, Address::V4(Ipv4Addr::new(224, 0, 0, 1)));

        let mreq = IpMreq {
            multiaddr: [224, 0, 0, 2],
            interface: [10, 0, 0, 2],
        };
        let req = parse_ipv4_mreq(mreq.as_bytes(), false).unwrap();
        assert_eq!(req.nic, 0);
        assert_eq!(req.interface_addr, Address::V4(Ipv4Addr::new(10, 0, 0, 2)));

        assert_eq!(parse_ipv4_mreq(&[10, 0, 0, 2], false), Err(Errno::EINVAL));
        let req = parse_ipv4_mreq(&[10, 0, 0, 2], true).unwrap();
        assert_eq!(req.interface_addr, Address::V4(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(parse_ipv4_mreq(&[1, 2], true), Err(Errno::EINVAL));
    }

    #[test]
    fn tcp_info_units() {
        let info = linux_tcp_info(&litebox::net::TcpInfo {
            state: TcpState::Established,
            cc_state: CongestionState::FastRecovery,
            rto: Duration::from_millis(200),
            rtt: Duration::from_micros(1500),
            rtt_var: Duration::from_micros(750),
            snd_ssthresh: 10,
            snd_cwnd: 20,
            reorder_seen: true,
        });
        assert_eq!(u32::from(info.state), linux::TCP_ESTABLISHED);
        assert_eq!(info.ca_state, linux::TCP_CA_RECOVERY);
        assert_eq!(info.rto, 200_000);
        assert_eq!(info.rtt, 1500);
        assert_eq!(info.rtt_var, 750);
        assert_eq!(info.reord_seen, 1);
    }
}
