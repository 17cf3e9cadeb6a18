// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Ancillary data (`cmsghdr` records) for `recvmsg` and `sendmsg`.

use alloc::vec::Vec;
use core::time::Duration;

use litebox::net::{
    FullAddress, IpPacketInfo, Ipv6PacketInfo, NetworkProtocol, ReceivableControlMessages,
    SockError, SockErrorOrigin,
};
use litebox_common_linux::{
    AddressFamily, TimeVal,
    errno::Errno,
    net::{
        CmsgHdr, In6Pktinfo, InPktinfo, IP_PKTINFO, IP_RECVERR, IP_RECVORIGDSTADDR, IP_TOS, IP_TTL,
        IPV6_HOPLIMIT, IPV6_PKTINFO, IPV6_RECVERR, IPV6_RECVORIGDSTADDR, IPV6_TCLASS,
        SCM_CREDENTIALS, SCM_RIGHTS, SCM_TIMESTAMP, SIZEOF_CMSGHDR, SO_EE_ORIGIN_ICMP,
        SO_EE_ORIGIN_ICMP6, SO_EE_ORIGIN_LOCAL, SO_EE_ORIGIN_NONE, SOL_IP, SOL_IPV6, SOL_SOCKET,
        SOL_TCP, SockExtendedErr, TCP_INQ, cmsg_align, convert_address, read_i32, read_struct,
    },
};
use zerocopy::IntoBytes;

/// Control messages produced by one receive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlMessages {
    /// `SCM_TIMESTAMP`
    pub timestamp: Option<Duration>,
    /// `TCP_INQ`: bytes still queued after this receive.
    pub inq: Option<i32>,
    pub tos: Option<u8>,
    pub tclass: Option<u32>,
    pub ip_packet_info: Option<IpPacketInfo>,
    pub ipv6_packet_info: Option<Ipv6PacketInfo>,
    pub hop_limit: Option<u32>,
    pub ttl: Option<u32>,
    pub original_dst_address: Option<FullAddress>,
    pub sock_err: Option<SockError>,
}

impl ControlMessages {
    /// Take what the endpoint reported; the timestamp only if `SO_TIMESTAMP` is on.
    pub(crate) fn from_endpoint(cm: ReceivableControlMessages, timestamp_enabled: bool) -> Self {
        Self {
            timestamp: cm.timestamp.filter(|_| timestamp_enabled),
            inq: None,
            tos: cm.tos,
            tclass: cm.tclass,
            ip_packet_info: cm.ip_packet_info,
            ipv6_packet_info: cm.ipv6_packet_info,
            hop_limit: cm.hop_limit,
            ttl: cm.ttl,
            original_dst_address: cm.original_dst_address,
            sock_err: cm.sock_err,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Serialize into `cmsghdr` records for a buffer of `capacity` bytes.
    ///
    /// Returns the bytes to copy out and whether anything was cut (`MSG_CTRUNC`).
    pub fn pack(&self, family: AddressFamily, capacity: usize) -> (Vec<u8>, bool) {
        let mut w = CmsgWriter::new(capacity);
        if let Some(ts) = self.timestamp {
            w.put(SOL_SOCKET, SCM_TIMESTAMP, TimeVal::from(ts).as_bytes());
        }
        if let Some(inq) = self.inq {
            w.put(SOL_TCP, TCP_INQ, &inq.to_ne_bytes());
        }
        if let Some(tos) = self.tos {
            w.put(SOL_IP, IP_TOS, &[tos]);
        }
        if let Some(tclass) = self.tclass {
            w.put(SOL_IPV6, IPV6_TCLASS, &tclass.to_ne_bytes());
        }
        if let Some(info) = self.ip_packet_info {
            let pkt = InPktinfo {
                ifindex: info.nic.cast_signed(),
                spec_dst: info.local_addr.octets(),
                addr: info.destination_addr.octets(),
            };
            w.put(SOL_IP, IP_PKTINFO, pkt.as_bytes());
        }
        if let Some(info) = self.ipv6_packet_info {
            let pkt = In6Pktinfo {
                addr: info.addr.octets(),
                ifindex: info.nic,
            };
            w.put(SOL_IPV6, IPV6_PKTINFO, pkt.as_bytes());
        }
        if let Some(hops) = self.hop_limit {
            w.put(SOL_IPV6, IPV6_HOPLIMIT, &hops.to_ne_bytes());
        }
        if let Some(ttl) = self.ttl {
            w.put(SOL_IP, IP_TTL, &ttl.to_ne_bytes());
        }
        if let Some(dst) = &self.original_dst_address {
            let sockaddr = convert_address(family, dst);
            if family == AddressFamily::INET {
                w.put(SOL_IP, IP_RECVORIGDSTADDR, &sockaddr);
            } else {
                w.put(SOL_IPV6, IPV6_RECVORIGDSTADDR, &sockaddr);
            }
        }
        if let Some(err) = &self.sock_err {
            let (level, name, family) = match err.net_proto {
                NetworkProtocol::Ipv4 => (SOL_IP, IP_RECVERR, AddressFamily::INET),
                NetworkProtocol::Ipv6 => (SOL_IPV6, IPV6_RECVERR, AddressFamily::INET6),
            };
            let ee = SockExtendedErr {
                errno: i32::from(Errno::from(err.err)).cast_unsigned(),
                origin: match err.cause.origin {
                    SockErrorOrigin::None => SO_EE_ORIGIN_NONE,
                    SockErrorOrigin::Local => SO_EE_ORIGIN_LOCAL,
                    SockErrorOrigin::Icmp => SO_EE_ORIGIN_ICMP,
                    SockErrorOrigin::Icmp6 => SO_EE_ORIGIN_ICMP6,
                },
                type_: err.cause.type_,
                code: err.cause.code,
                pad: 0,
                info: err.cause.info,
                data: 0,
            };
            let mut data = ee.as_bytes().to_vec();
            data.extend_from_slice(&convert_address(family, &err.offender));
            w.put(level, name, &data);
        }
        w.finish()
    }
}

/// Appends `cmsghdr` records up to a fixed capacity, the way `put_cmsg` does.
struct CmsgWriter {
    buf: Vec<u8>,
    capacity: usize,
    truncated: bool,
}

impl CmsgWriter {
    fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
            truncated: false,
        }
    }

    fn put(&mut self, level: i32, type_: i32, data: &[u8]) {
        let space = self.capacity - self.buf.len();
        if space < SIZEOF_CMSGHDR {
            self.truncated = true;
            return;
        }
        let mut len = SIZEOF_CMSGHDR + data.len();
        if len > space {
            len = space;
            self.truncated = true;
        }
        let hdr = CmsgHdr {
            len: u64::try_from(len).unwrap_or(u64::MAX),
            level,
            type_,
        };
        self.buf.extend_from_slice(hdr.as_bytes());
        self.buf
            .extend_from_slice(&data[..len - SIZEOF_CMSGHDR]);
        let padded = cmsg_align(len).min(space);
        self.buf.resize(self.buf.len() + (padded - len), 0);
    }

    fn finish(self) -> (Vec<u8>, bool) {
        (self.buf, self.truncated)
    }
}

/// What `sendmsg` control data asks for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendControl {
    /// `SCM_RIGHTS` or `SCM_CREDENTIALS` was present, which IP sockets reject.
    pub has_unix: bool,
    /// `IP_TTL`
    pub ttl: Option<u32>,
    /// `IPV6_HOPLIMIT`
    pub hop_limit: Option<u32>,
}

impl SendControl {
    /// Parse the guest's `msg_control` buffer.
    pub fn parse(control: &[u8]) -> Result<Self, Errno> {
        let mut out = Self::default();
        let mut off = 0;
        while control.len() - off >= SIZEOF_CMSGHDR {
            let hdr: CmsgHdr = read_struct(&control[off..])?;
            let len = usize::try_from(hdr.len).map_err(|_| Errno::EINVAL)?;
            if len < SIZEOF_CMSGHDR || len > control.len() - off {
                return Err(Errno::EINVAL);
            }
            let data = &control[off + SIZEOF_CMSGHDR..off + len];
            match (hdr.level, hdr.type_) {
                (SOL_SOCKET, SCM_RIGHTS | SCM_CREDENTIALS) => out.has_unix = true,
                (SOL_IP, IP_TTL) => {
                    let ttl = read_i32(data)?;
                    if !(1..=255).contains(&ttl) {
                        return Err(Errno::EINVAL);
                    }
                    out.ttl = Some(ttl.cast_unsigned());
                }
                (SOL_IPV6, IPV6_HOPLIMIT) => {
                    let hops = read_i32(data)?;
                    if !(-1..=255).contains(&hops) {
                        return Err(Errno::EINVAL);
                    }
                    out.hop_limit = (hops >= 0).then_some(hops.cast_unsigned());
                }
                _ => {}
            }
            off = off.saturating_add(cmsg_align(len)).min(control.len());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::net::Ipv4Addr;
    use litebox_common_linux::net::cmsg_space;

    fn record(level: i32, type_: i32, data: &[u8]) -> Vec<u8> {
        let mut out = CmsgHdr {
            len: u64::try_from(SIZEOF_CMSGHDR + data.len()).unwrap(),
            level,
            type_,
        }
        .as_bytes()
        .to_vec();
        out.extend_from_slice(data);
        out.resize(cmsg_space(data.len()), 0);
        out
    }

    #[test]
    fn timestamp_needs_so_timestamp() {
        let cm = ReceivableControlMessages {
            timestamp: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        assert!(ControlMessages::from_endpoint(cm.clone(), false).is_empty());
        let cm = ControlMessages::from_endpoint(cm, true);
        assert_eq!(cm.timestamp, Some(Duration::from_secs(5)));
    }

    #[test]
    fn pack_orders_records() {
        let cm = ControlMessages {
            ttl: Some(64),
            tos: Some(0x10),
            ..Default::default()
        };
        let (buf, truncated) = cm.pack(AddressFamily::INET, 256);
        assert!(!truncated);
        assert_eq!(buf.len(), cmsg_space(1) + cmsg_space(4));

        let first: CmsgHdr = read_struct(&buf).unwrap();
        assert_eq!((first.level, first.type_), (SOL_IP, IP_TOS));
        assert_eq!(first.len, u64::try_from(SIZEOF_CMSGHDR + 1).unwrap());
        assert_eq!(buf[SIZEOF_CMSGHDR], 0x10);

        let second: CmsgHdr = read_struct(&buf[cmsg_space(1)..]).unwrap();
        assert_eq!((second.level, second.type_), (SOL_IP, IP_TTL));
        assert_eq!(read_i32(&buf[cmsg_space(1) + SIZEOF_CMSGHDR..]).unwrap(), 64);
    }

    #[test]
    fn pack_truncates() {
        let cm = ControlMessages {
            ip_packet_info: Some(IpPacketInfo {
                nic: 2,
                local_addr: Ipv4Addr::new(10, 0, 0, 2),
                destination_addr: Ipv4Addr::new(10, 0, 0, 255),
            }),
            ..Default::default()
        };
        let (buf, truncated) = cm.pack(AddressFamily::INET, SIZEOF_CMSGHDR + 4);
        assert!(truncated);
        assert_eq!(buf.len(), SIZEOF_CMSGHDR + 4);
        let hdr: CmsgHdr = read_struct(&buf).unwrap();
        assert_eq!(hdr.len, u64::try_from(SIZEOF_CMSGHDR + 4).unwrap());

        let (buf, truncated) = cm.pack(AddressFamily::INET, SIZEOF_CMSGHDR - 1);
        assert!(truncated);
        assert!(buf.is_empty());
    }

    #[test]
    fn parse_send_control() {
        let mut control = record(SOL_IP, IP_TTL, &7i32.to_ne_bytes());
        control.extend(record(SOL_IPV6, IPV6_HOPLIMIT, &(-1i32).to_ne_bytes()));
        let parsed = SendControl::parse(&control).unwrap();
        assert_eq!(
            parsed,
            SendControl {
                has_unix: false,
                ttl: Some(7),
                hop_limit: None,
            }
        );

        let control = record(SOL_SOCKET, SCM_RIGHTS, &3i32.to_ne_bytes());
        assert!(SendControl::parse(&control).unwrap().has_unix);
    }

    #[test]
    fn parse_rejects_bad_ttl_and_lengths() {
        let control = record(SOL_IP, IP_TTL, &0i32.to_ne_bytes());
        assert_eq!(SendControl::parse(&control), Err(Errno::EINVAL));

        let mut control = record(SOL_IP, IP_TTL, &1i32.to_ne_bytes());
        control[0] = 200;
        assert_eq!(SendControl::parse(&control), Err(Errno::EINVAL));
    }
}
