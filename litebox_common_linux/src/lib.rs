// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Common Linux-y items suitable for LiteBox

#![no_std]
#![allow(non_camel_case_types)]

extern crate alloc;

use int_enum::IntEnum;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub mod errno;
pub mod net;

#[repr(u16)]
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntEnum)]
pub enum AddressFamily {
    UNSPEC = 0,
    UNIX = 1,
    INET = 2,
    INET6 = 10,
    NETLINK = 16,
    PACKET = 17,
}

impl AddressFamily {
    /// Whether this is one of the IP families.
    pub fn is_inet(self) -> bool {
        matches!(self, AddressFamily::INET | AddressFamily::INET6)
    }
}

#[repr(u32)]
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntEnum)]
pub enum SockType {
    Stream = 1,
    Datagram = 2,
    Raw = 3,
    Rdm = 4,
    SeqPacket = 5,
    Packet = 10,
}

impl SockType {
    /// Packet-based socket types preserve message boundaries.
    pub fn is_packet_based(self) -> bool {
        matches!(
            self,
            SockType::Datagram | SockType::SeqPacket | SockType::Rdm | SockType::Raw
        )
    }
}

bitflags::bitflags! {
    /// Flags that may be or-ed into the type argument of `socket(2)` and the flags of `accept4(2)`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SockFlags: core::ffi::c_uint {
        const NONBLOCK = 0o4000;
        const CLOEXEC = 0o2000000;
        /// <https://docs.rs/bitflags/*/bitflags/#externally-defined-flags>
        const _ = !0;
    }
}

/// IP protocol numbers used to pick an endpoint.
#[repr(u8)]
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntEnum)]
pub enum Protocol {
    ICMP = 1,
    TCP = 6,
    UDP = 17,
    ICMPV6 = 58,
    RAW = 255,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntEnum)]
pub enum SocketOptionLevel {
    IP = 0,
    SOCKET = 1,
    TCP = 6,
    UDP = 17,
    IPV6 = 41,
    ICMPV6 = 58,
    RAW = 255,
    PACKET = 263,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntEnum)]
pub enum ShutdownHow {
    Read = 0,
    Write = 1,
    ReadWrite = 2,
}

// Following libc's definition of time_t and suseconds_t.
// They are not same as isize on all architectures, e.g.,
// `suseconds_t` is i64 on riscv32:
// https://github.com/rust-lang/libc/blob/151c3a971e423c76e7acb54aa2d21a6e2706c4e6/src/unix/linux_like/linux/gnu/b32/mod.rs#L22
cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub type time_t = i64;
        pub type suseconds_t = i64;
    } else if #[cfg(target_arch = "aarch64")] {
        pub type time_t = i64;
        pub type suseconds_t = i64;
    } else {
        compile_error!("Unsupported architecture");
    }
}

/// `struct timeval`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct TimeVal {
    pub tv_sec: time_t,
    pub tv_usec: suseconds_t,
}

const MICROS_PER_SEC: i64 = 1_000_000;

impl TimeVal {
    /// Encode a socket timeout, where "never" is the all-zero value.
    pub fn from_timeout(timeout: Option<core::time::Duration>) -> Self {
        timeout.map_or(Self::default(), Self::from)
    }

    /// Decode a socket timeout (`SO_RCVTIMEO` / `SO_SNDTIMEO`).
    ///
    /// The all-zero value means "block forever"; a negative number of seconds means "do not
    /// block at all".
    pub fn to_timeout(self) -> Result<Option<core::time::Duration>, errno::Errno> {
        if self.tv_usec < 0 || self.tv_usec >= MICROS_PER_SEC {
            return Err(errno::Errno::EDOM);
        }
        if self.tv_sec < 0 {
            return Ok(Some(core::time::Duration::ZERO));
        }
        if self.tv_sec == 0 && self.tv_usec == 0 {
            return Ok(None);
        }
        core::time::Duration::try_from(self).map(Some)
    }
}

impl From<core::time::Duration> for TimeVal {
    fn from(d: core::time::Duration) -> Self {
        Self {
            tv_sec: time_t::try_from(d.as_secs()).unwrap_or(time_t::MAX),
            tv_usec: suseconds_t::from(d.subsec_micros()),
        }
    }
}

impl TryFrom<TimeVal> for core::time::Duration {
    type Error = errno::Errno;

    fn try_from(value: TimeVal) -> Result<Self, Self::Error> {
        if value.tv_usec < 0 || value.tv_usec >= MICROS_PER_SEC {
            Err(errno::Errno::EDOM)
        } else {
            Ok(core::time::Duration::new(
                u64::try_from(value.tv_sec).map_err(|_| errno::Errno::EDOM)?,
                u32::try_from(value.tv_usec * 1000).map_err(|_| errno::Errno::EDOM)?,
            ))
        }
    }
}

/// `struct linger`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct Linger {
    pub l_onoff: i32,
    pub l_linger: i32,
}

/// `struct ucred`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct Ucred {
    pub pid: i32,
    pub uid: u32,
    pub gid: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[test]
    fn abi_struct_sizes() {
        assert_eq!(size_of::<TimeVal>(), 16);
        assert_eq!(size_of::<Linger>(), 8);
        assert_eq!(size_of::<Ucred>(), 12);
    }

    #[test]
    fn timeval_timeouts() {
        let tv = TimeVal {
            tv_sec: 2,
            tv_usec: 500_000,
        };
        assert_eq!(tv.to_timeout().unwrap(), Some(Duration::from_millis(2500)));
        assert_eq!(TimeVal::default().to_timeout().unwrap(), None);
        assert_eq!(
            TimeVal {
                tv_sec: -1,
                tv_usec: 0
            }
            .to_timeout()
            .unwrap(),
            Some(Duration::ZERO)
        );
        assert_eq!(
            TimeVal {
                tv_sec: 0,
                tv_usec: 1_000_000
            }
            .to_timeout(),
            Err(errno::Errno::EDOM)
        );
        assert_eq!(TimeVal::from_timeout(Some(Duration::from_millis(2500))), tv);
        assert_eq!(TimeVal::from_timeout(None), TimeVal::default());
    }

    #[test]
    fn packet_based_types() {
        assert!(!SockType::Stream.is_packet_based());
        assert!(SockType::Datagram.is_packet_based());
        assert!(SockType::Raw.is_packet_based());
        assert_eq!(SockType::try_from(5).unwrap(), SockType::SeqPacket);
        assert_eq!(SocketOptionLevel::try_from(263).unwrap(), SocketOptionLevel::PACKET);
    }
}
