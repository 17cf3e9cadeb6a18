// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The [`super::Errno`] constants reachable from the socket layer.
//!
//! This particular module itself is private, but defines all of the below within the public
//! [`super::Errno`] type, so as to have them all be exposed, but still keep the table restricted
//! to this single file. Values and descriptions follow `/usr/bin/errno -l` on x86-64 Linux.

impl super::Errno {
    /// Human-friendly readable version of `self`.
    pub const fn as_str(self) -> &'static str {
        match self.value.get() {
            1 => "EPERM: Operation not permitted",
            2 => "ENOENT: No such file or directory",
            4 => "EINTR: Interrupted system call",
            9 => "EBADF: Bad file descriptor",
            11 => "EAGAIN/EWOULDBLOCK: Resource temporarily unavailable",
            12 => "ENOMEM: Cannot allocate memory",
            13 => "EACCES: Permission denied",
            14 => "EFAULT: Bad address",
            16 => "EBUSY: Device or resource busy",
            19 => "ENODEV: No such device",
            22 => "EINVAL: Invalid argument",
            25 => "ENOTTY: Inappropriate ioctl for device",
            32 => "EPIPE: Broken pipe",
            33 => "EDOM: Numerical argument out of domain",
            88 => "ENOTSOCK: Socket operation on non-socket",
            89 => "EDESTADDRREQ: Destination address required",
            90 => "EMSGSIZE: Message too long",
            92 => "ENOPROTOOPT: Protocol not available",
            93 => "EPROTONOSUPPORT: Protocol not supported",
            95 => "EOPNOTSUPP/ENOTSUP: Operation not supported",
            97 => "EAFNOSUPPORT: Address family not supported by protocol",
            98 => "EADDRINUSE: Address already in use",
            99 => "EADDRNOTAVAIL: Cannot assign requested address",
            100 => "ENETDOWN: Network is down",
            101 => "ENETUNREACH: Network is unreachable",
            103 => "ECONNABORTED: Software caused connection abort",
            104 => "ECONNRESET: Connection reset by peer",
            105 => "ENOBUFS: No buffer space available",
            106 => "EISCONN: Transport endpoint is already connected",
            107 => "ENOTCONN: Transport endpoint is not connected",
            110 => "ETIMEDOUT: Connection timed out",
            111 => "ECONNREFUSED: Connection refused",
            112 => "EHOSTDOWN: Host is down",
            113 => "EHOSTUNREACH: No route to host",
            114 => "EALREADY: Operation already in progress",
            115 => "EINPROGRESS: Operation now in progress",
            _ => "Unknown error",
        }
    }
}

impl super::Errno {
    /// Operation not permitted
    pub const EPERM: Self = Self::from_const(1);
    /// No such file or directory
    pub const ENOENT: Self = Self::from_const(2);
    /// Interrupted system call
    pub const EINTR: Self = Self::from_const(4);
    /// Bad file descriptor
    pub const EBADF: Self = Self::from_const(9);
    /// Resource temporarily unavailable
    pub const EAGAIN: Self = Self::from_const(11);
    /// Resource temporarily unavailable
    pub const EWOULDBLOCK: Self = Self::from_const(11);
    /// Cannot allocate memory
    pub const ENOMEM: Self = Self::from_const(12);
    /// Permission denied
    pub const EACCES: Self = Self::from_const(13);
    /// Bad address
    pub const EFAULT: Self = Self::from_const(14);
    /// Device or resource busy
    pub const EBUSY: Self = Self::from_const(16);
    /// No such device
    pub const ENODEV: Self = Self::from_const(19);
    /// Invalid argument
    pub const EINVAL: Self = Self::from_const(22);
    /// Inappropriate ioctl for device
    pub const ENOTTY: Self = Self::from_const(25);
    /// Broken pipe
    pub const EPIPE: Self = Self::from_const(32);
    /// Numerical argument out of domain
    pub const EDOM: Self = Self::from_const(33);
    /// Socket operation on non-socket
    pub const ENOTSOCK: Self = Self::from_const(88);
    /// Destination address required
    pub const EDESTADDRREQ: Self = Self::from_const(89);
    /// Message too long
    pub const EMSGSIZE: Self = Self::from_const(90);
    /// Protocol not available
    pub const ENOPROTOOPT: Self = Self::from_const(92);
    /// Protocol not supported
    pub const EPROTONOSUPPORT: Self = Self::from_const(93);
    /// Operation not supported
    pub const EOPNOTSUPP: Self = Self::from_const(95);
    /// Operation not supported
    pub const ENOTSUP: Self = Self::from_const(95);
    /// Address family not supported by protocol
    pub const EAFNOSUPPORT: Self = Self::from_const(97);
    /// Address already in use
    pub const EADDRINUSE: Self = Self::from_const(98);
    /// Cannot assign requested address
    pub const EADDRNOTAVAIL: Self = Self::from_const(99);
    /// Network is down
    pub const ENETDOWN: Self = Self::from_const(100);
    /// Network is unreachable
    pub const ENETUNREACH: Self = Self::from_const(101);
    /// Software caused connection abort
    pub const ECONNABORTED: Self = Self::from_const(103);
    /// Connection reset by peer
    pub const ECONNRESET: Self = Self::from_const(104);
    /// No buffer space available
    pub const ENOBUFS: Self = Self::from_const(105);
    /// Transport endpoint is already connected
    pub const EISCONN: Self = Self::from_const(106);
    /// Transport endpoint is not connected
    pub const ENOTCONN: Self = Self::from_const(107);
    /// Connection timed out
    pub const ETIMEDOUT: Self = Self::from_const(110);
    /// Connection refused
    pub const ECONNREFUSED: Self = Self::from_const(111);
    /// Host is down
    pub const EHOSTDOWN: Self = Self::from_const(112);
    /// No route to host
    pub const EHOSTUNREACH: Self = Self::from_const(113);
    /// Operation already in progress
    pub const EALREADY: Self = Self::from_const(114);
    /// Operation now in progress
    pub const EINPROGRESS: Self = Self::from_const(115);
    /// The maximum supported Errno
    pub const MAX: Self = Self::from_const(133);
}
