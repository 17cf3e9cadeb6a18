// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Socket `ioctl(2)`s: queue sizes, the receive timestamp, and interface queries.

use core::net::IpAddr;

use litebox::net::{Interface, InterfaceFlags, IntOption, NetworkStack};
use litebox::utils::TruncateExt as _;
use litebox_common_linux::{
    AddressFamily, TimeVal,
    errno::Errno,
    net::{self as linux, IfReq, SIZEOF_IFREQ, read_struct},
};
use zerocopy::IntoBytes;

use super::net::Socket;

/// Linux `IFF_*` bits reported by `SIOCGIFFLAGS`.
const IFF_UP: u32 = 0x1;
const IFF_LOOPBACK: u32 = 0x8;
const IFF_RUNNING: u32 = 0x40;
const IFF_PROMISC: u32 = 0x100;
const IFF_LOWER_UP: u32 = 0x10000;

/// The user memory an ioctl operates on, already copied in.
pub enum IoctlArg<'a> {
    /// A fixed-size argument (`int`, `timeval`, `ifreq`), copied back out after the call.
    Buffer(&'a mut [u8]),
    /// `struct ifconf`: the length field, and the buffer unless the guest passed `NULL`.
    IfConf {
        len: &'a mut i32,
        buf: Option<&'a mut [u8]>,
    },
}

fn write_int(arg: IoctlArg<'_>, v: i32) -> Result<(), Errno> {
    match arg {
        IoctlArg::Buffer(buf) if buf.len() >= size_of::<i32>() => {
            buf[..size_of::<i32>()].copy_from_slice(&v.to_ne_bytes());
            Ok(())
        }
        _ => Err(Errno::EFAULT),
    }
}

fn linux_flags(flags: InterfaceFlags) -> u32 {
    let mut out = 0;
    if flags.contains(InterfaceFlags::UP) {
        out |= IFF_UP | IFF_LOWER_UP;
    }
    if flags.contains(InterfaceFlags::RUNNING) {
        out |= IFF_RUNNING;
    }
    if flags.contains(InterfaceFlags::PROMISC) {
        out |= IFF_PROMISC;
    }
    if flags.contains(InterfaceFlags::LOOPBACK) {
        out |= IFF_LOOPBACK;
    }
    out
}

/// Netmask of a prefix length, in network byte order.
fn netmask(prefix_len: u8) -> [u8; 4] {
    let bits = 32u32.saturating_sub(u32::from(prefix_len));
    u32::MAX.checked_shl(bits).unwrap_or(0).to_be_bytes()
}

fn set_inet_addr(req: &mut IfReq, addr: [u8; 4]) {
    req.data[..2].copy_from_slice(&u16::from(AddressFamily::INET).to_ne_bytes());
    req.data[4..8].copy_from_slice(&addr);
}

/// Answer an interface query in place.
fn ifreq_ioctl(stack: &dyn NetworkStack, request: u32, req: &mut IfReq) -> Result<(), Errno> {
    let interfaces = stack.interfaces();
    let (index, iface): (u32, &Interface) = if request == linux::SIOCGIFNAME {
        let index: i32 = read_struct(&req.data)?;
        let index = u32::try_from(index).map_err(|_| Errno::ENODEV)?;
        let iface = interfaces.get(&index).ok_or(Errno::ENODEV)?;
        (index, iface)
    } else {
        let name = req.name();
        interfaces
            .iter()
            .find(|(_, iface)| iface.name.as_bytes() == name)
            .map(|(&index, iface)| (index, iface))
            .ok_or(Errno::ENODEV)?
    };
    let first_v4 = || {
        stack
            .interface_addresses(index)
            .into_iter()
            .find_map(|a| match a.addr {
                IpAddr::V4(v4) => Some((v4.octets(), a.prefix_len)),
                IpAddr::V6(_) => None,
            })
    };

    match request {
        linux::SIOCGIFNAME => req.set_name(&iface.name),
        linux::SIOCGIFINDEX => {
            req.data[..4].copy_from_slice(&index.to_ne_bytes());
        }
        linux::SIOCGIFHWADDR => {
            req.data[..2].copy_from_slice(&iface.device_type.to_ne_bytes());
            let n = iface.addr.len().min(req.data.len() - 2);
            req.data[2..2 + n].copy_from_slice(&iface.addr[..n]);
        }
        linux::SIOCGIFFLAGS => {
            let flags: u16 = linux_flags(iface.flags).truncate();
            req.data[..2].copy_from_slice(&flags.to_ne_bytes());
        }
        linux::SIOCGIFADDR => {
            if let Some((addr, _)) = first_v4() {
                set_inet_addr(req, addr);
            }
        }
        linux::SIOCGIFMETRIC => req.data[..4].copy_from_slice(&0i32.to_ne_bytes()),
        linux::SIOCGIFMTU => req.data[..4].copy_from_slice(&iface.mtu.to_ne_bytes()),
        linux::SIOCGIFMAP | linux::SIOCGIFTXQLEN | linux::SIOCGIFDSTADDR | linux::SIOCGIFBRDADDR => {}
        linux::SIOCGIFNETMASK => {
            if let Some((_, prefix_len)) = first_v4() {
                set_inet_addr(req, netmask(prefix_len));
            }
        }
        linux::SIOCETHTOOL => return Err(Errno::EOPNOTSUPP),
        _ => return Err(Errno::ENOTTY),
    }
    Ok(())
}

/// Fill an `ifconf` with one `ifreq` per IPv4 address.
fn ifconf_ioctl(stack: &dyn NetworkStack, len: &mut i32, buf: Option<&mut [u8]>) {
    let mut entries = alloc::vec::Vec::new();
    for (index, iface) in stack.interfaces() {
        for a in stack.interface_addresses(index) {
            if let IpAddr::V4(v4) = a.addr {
                let mut req = IfReq::default();
                req.set_name(&iface.name);
                set_inet_addr(&mut req, v4.octets());
                entries.push(req);
            }
        }
    }
    let Some(buf) = buf else {
        *len = i32::try_from(entries.len() * SIZEOF_IFREQ).unwrap_or(i32::MAX);
        return;
    };
    let room = usize::try_from(*len).unwrap_or(0).min(buf.len());
    let mut written = 0;
    for req in &entries {
        if written + SIZEOF_IFREQ > room {
            break;
        }
        buf[written..written + SIZEOF_IFREQ].copy_from_slice(req.as_bytes());
        written += SIZEOF_IFREQ;
    }
    *len = i32::try_from(written).unwrap_or(i32::MAX);
}

impl<Platform: litebox::platform::Provider> Socket<Platform> {
    /// `ioctl(2)` on a socket.
    pub fn ioctl(&self, request: u32, arg: IoctlArg<'_>) -> Result<(), Errno> {
        match request {
            linux::SIOCGSTAMP => {
                let ts = self.read_state.lock().last_timestamp.ok_or(Errno::ENOENT)?;
                let IoctlArg::Buffer(buf) = arg else {
                    return Err(Errno::EFAULT);
                };
                let tv = TimeVal::from(ts);
                let bytes = tv.as_bytes();
                if buf.len() < bytes.len() {
                    return Err(Errno::EFAULT);
                }
                buf[..bytes.len()].copy_from_slice(bytes);
                Ok(())
            }
            linux::TIOCINQ => {
                let v = self.endpoint.get_sock_opt_int(IntOption::ReceiveQueueSize)?;
                write_int(arg, v)
            }
            linux::TIOCOUTQ => {
                let v = self.endpoint.get_sock_opt_int(IntOption::SendQueueSize)?;
                write_int(arg, v)
            }
            linux::SIOCGIFFLAGS
            | linux::SIOCGIFADDR
            | linux::SIOCGIFBRDADDR
            | linux::SIOCGIFDSTADDR
            | linux::SIOCGIFHWADDR
            | linux::SIOCGIFINDEX
            | linux::SIOCGIFMAP
            | linux::SIOCGIFMETRIC
            | linux::SIOCGIFMTU
            | linux::SIOCGIFNAME
            | linux::SIOCGIFNETMASK
            | linux::SIOCGIFTXQLEN
            | linux::SIOCETHTOOL => {
                let IoctlArg::Buffer(buf) = arg else {
                    return Err(Errno::EFAULT);
                };
                if buf.len() < SIZEOF_IFREQ {
                    return Err(Errno::EFAULT);
                }
                let mut req: IfReq = read_struct(buf)?;
                self.with_stack(|stack| ifreq_ioctl(stack, request, &mut req))?;
                buf[..SIZEOF_IFREQ].copy_from_slice(req.as_bytes());
                Ok(())
            }
            linux::SIOCGIFCONF => {
                let IoctlArg::IfConf { len, buf } = arg else {
                    return Err(Errno::EFAULT);
                };
                self.with_stack(|stack| {
                    ifconf_ioctl(stack, len, buf);
                    Ok(())
                })
            }
            _ => {
                log_unsupported!(self.platform, "socket ioctl {request:#x}");
                Err(Errno::ENOTTY)
            }
        }
    }
}
