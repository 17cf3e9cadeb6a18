// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Sockets: Linux socket semantics (connect, bind, listen, accept, send/recv, shutdown, ...) on
//! top of a non-blocking transport [`Endpoint`].
//!
//! Every blocking call is built the same way: try the endpoint once, and if it would block (and
//! the caller allows blocking) wait on the socket's [`Pollee`] for the relevant readiness events,
//! retrying after each wake-up. Deadlines come from `SO_RCVTIMEO`/`SO_SNDTIMEO` on top of the
//! caller's [`WaitContext`], which also carries the task's interrupt check.

use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::net::Ipv4Addr;
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use litebox::event::{
    Events, IOPollable,
    observer::Observer,
    polling::{ObserverToken, Pollee, TryOpError},
    wait::{WaitContext, WaitError},
};
use litebox::net::{
    Address, Endpoint, EndpointError, EndpointState, FullAddress, IntOption, NetworkNamespace,
    NetworkProtocol, NetworkStack, PacketType, ReadOptions, ReadResult, ReceivableControlMessages,
    ReceiveFlags, SendFlags, SendableControlMessages, ShutdownFlags, SockError, TcpState,
    TransportProtocol, UdpState, WriteOptions,
};
use litebox_common_linux::{
    AddressFamily, ShutdownHow, SockFlags, SockType,
    errno::Errno,
    net::{
        PACKET_BROADCAST, PACKET_HOST, PACKET_MULTICAST, PACKET_OTHERHOST, PACKET_OUTGOING,
        SIZEOF_SA_FAMILY, SockAddrLl, TCP_CLOSE, TCP_CLOSE_WAIT, TCP_CLOSING, TCP_ESTABLISHED,
        TCP_FIN_WAIT1, TCP_FIN_WAIT2, TCP_LAST_ACK, TCP_LISTEN, TCP_SYN_RECV, TCP_SYN_SENT,
        TCP_TIME_WAIT, address_and_family, convert_address, link_full_address, min_sockaddr_len,
        parse_link_address, read_struct,
    },
};
use zerocopy::IntoBytes;

use super::cmsg::{ControlMessages, SendControl};
use super::sockopt::SockOptMetrics;

/// The immutable `(domain, type, protocol)` triple a socket was created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SocketType {
    pub family: AddressFamily,
    pub sock_type: SockType,
    pub protocol: i32,
}

/// Receive-side state owned by the socket rather than the endpoint.
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct ReadState {
    /// `SO_TIMESTAMP`
    pub(super) timestamp_enabled: bool,
    /// The last receive timestamp, for `SIOCGSTAMP`.
    pub(super) last_timestamp: Option<Duration>,
    /// `TCP_INQ`
    pub(super) inq_enabled: bool,
}

/// Result of [`Socket::write`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Everything was accepted.
    Complete(usize),
    /// Only this many bytes were accepted; the rest would have blocked.
    Partial(usize),
}

/// Result of [`Socket::recv_msg`].
#[derive(Clone, Debug)]
pub struct RecvMsgResult {
    /// Bytes received, or the full message length when `MSG_TRUNC` was requested on a packet
    /// socket.
    pub count: usize,
    /// Output flags (`MSG_TRUNC`, `MSG_ERRQUEUE`).
    pub flags: ReceiveFlags,
    /// The sender, as a guest `sockaddr`, when requested on a packet socket.
    pub sender: Option<Vec<u8>>,
    pub control: ControlMessages,
}

impl RecvMsgResult {
    fn empty() -> Self {
        Self {
            count: 0,
            flags: ReceiveFlags::empty(),
            sender: None,
            control: ControlMessages::default(),
        }
    }
}

/// A socket: one owned transport endpoint plus the Linux-facing state around it.
pub struct Socket<Platform: litebox::platform::Provider> {
    pub(super) platform: &'static Platform,
    pub(super) ty: SocketType,
    pub(super) endpoint: Box<dyn Endpoint>,
    pub(super) pollee: Arc<Pollee>,
    pub(super) namespace: Weak<dyn NetworkNamespace>,
    pub(super) metrics: Arc<dyn SockOptMetrics>,
    /// [`SockFlags`] bits
    status: AtomicU32,
    pub(super) read_state: spin::Mutex<ReadState>,
    /// Serializes stream reads; doubles as the discard buffer for `MSG_TRUNC`.
    scratch: spin::Mutex<Vec<u8>>,
    released: bool,
}

impl<Platform: litebox::platform::Provider> Socket<Platform> {
    /// Wrap `endpoint`, which reports readiness through `pollee`.
    ///
    /// Takes a reference on `namespace`, which is dropped again by [`Self::release`].
    pub fn new(
        platform: &'static Platform,
        ty: SocketType,
        endpoint: Box<dyn Endpoint>,
        pollee: Arc<Pollee>,
        namespace: Weak<dyn NetworkNamespace>,
        flags: SockFlags,
        metrics: Arc<dyn SockOptMetrics>,
    ) -> Self {
        if ty.sock_type == SockType::Stream {
            endpoint.socket_options().set_delay(true);
        }
        if let Some(ns) = namespace.upgrade() {
            ns.inc_ref();
        }
        Self {
            platform,
            ty,
            endpoint,
            pollee,
            namespace,
            metrics,
            status: AtomicU32::new((flags & (SockFlags::NONBLOCK | SockFlags::CLOEXEC)).bits()),
            read_state: spin::Mutex::new(ReadState::default()),
            scratch: spin::Mutex::new(Vec::new()),
            released: false,
        }
    }

    fn get_status(&self) -> SockFlags {
        SockFlags::from_bits_retain(self.status.load(Ordering::Relaxed))
    }

    pub fn is_nonblocking(&self) -> bool {
        self.get_status().contains(SockFlags::NONBLOCK)
    }

    pub fn set_nonblocking(&self, on: bool) {
        if on {
            self.status
                .fetch_or(SockFlags::NONBLOCK.bits(), Ordering::Relaxed);
        } else {
            self.status
                .fetch_and(!SockFlags::NONBLOCK.bits(), Ordering::Relaxed);
        }
    }

    pub fn is_cloexec(&self) -> bool {
        self.get_status().contains(SockFlags::CLOEXEC)
    }

    pub fn socket_type(&self) -> SocketType {
        self.ty
    }

    pub(super) fn is_tcp(&self) -> bool {
        self.endpoint.transport() == TransportProtocol::Tcp
    }

    /// Run `f` against the namespace's stack; `ENODEV` if there is none.
    pub(super) fn with_stack<R>(
        &self,
        f: impl FnOnce(&dyn NetworkStack) -> Result<R, Errno>,
    ) -> Result<R, Errno> {
        let ns = self.namespace.upgrade().ok_or(Errno::ENODEV)?;
        let stack = ns.stack().ok_or(Errno::ENODEV)?;
        f(stack)
    }

    /// Whether an address of `family` may be used with this socket.
    ///
    /// Unless `exact`, an IPv6 socket also takes IPv4 addresses while `IPV6_V6ONLY` is off.
    fn check_family(&self, family: u16, exact: bool) -> bool {
        if family == u16::from(self.ty.family) {
            return true;
        }
        !exact
            && family == u16::from(AddressFamily::INET)
            && self.ty.family == AddressFamily::INET6
            && !self.endpoint.socket_options().v6_only()
    }

    /// The IPv4 "any" address given to an IPv6 socket means `::ffff:0.0.0.0`.
    fn map_family(&self, family: u16, mut addr: FullAddress) -> FullAddress {
        if self.ty.family == AddressFamily::INET6
            && family == u16::from(AddressFamily::INET)
            && addr.addr.is_unspecified()
        {
            addr.addr = Address::V6(Ipv4Addr::UNSPECIFIED.to_ipv6_mapped());
        }
        addr
    }

    pub fn connect(&self, cx: &WaitContext<'_, Platform>, sockaddr: &[u8]) -> Result<(), Errno> {
        let (addr, family) = address_and_family(sockaddr)?;
        if family == u16::from(AddressFamily::UNSPEC) {
            return self.endpoint.disconnect().map_err(|e| match e {
                EndpointError::NotSupported => Errno::EAFNOSUPPORT,
                e => e.into(),
            });
        }
        if !self.check_family(family, false) {
            return Err(Errno::EINVAL);
        }
        let addr = self.map_family(family, addr);

        let translate = |e: EndpointError| match e {
            EndpointError::NoPortAvailable
                if matches!(self.ty.family, AddressFamily::INET | AddressFamily::INET6)
                    && self.ty.sock_type == SockType::Stream =>
            {
                Errno::EADDRNOTAVAIL
            }
            e => Errno::from(e),
        };
        if self.is_nonblocking() {
            return self.endpoint.connect(&addr).map_err(translate);
        }

        // Connecting again reports the outcome once the endpoint turns writable.
        let cx = cx.with_timeout(self.endpoint.socket_options().send_timeout());
        self.pollee
            .wait(&cx, false, Events::WRITABLE, || {
                match self.endpoint.connect(&addr) {
                    Ok(()) => Ok(()),
                    Err(EndpointError::ConnectStarted | EndpointError::AlreadyConnecting) => {
                        Err(TryOpError::TryAgain)
                    }
                    Err(e) => Err(TryOpError::Other(translate(e))),
                }
            })
            .map_err(|e| match e {
                TryOpError::WaitError(WaitError::TimedOut) => Errno::EINPROGRESS,
                e => e.into(),
            })
    }

    pub fn bind(&self, sockaddr: &[u8]) -> Result<(), Errno> {
        if sockaddr.len() < SIZEOF_SA_FAMILY {
            return Err(Errno::EINVAL);
        }
        let family = u16::from_ne_bytes([sockaddr[0], sockaddr[1]]);
        let addr = if family == u16::from(AddressFamily::PACKET) {
            link_full_address(&parse_link_address(sockaddr)?)
        } else {
            if min_sockaddr_len(self.ty.family) > sockaddr.len() {
                return Err(Errno::EINVAL);
            }
            let (addr, family) = address_and_family(sockaddr)?;
            if !self.check_family(family, true) {
                return Err(Errno::EAFNOSUPPORT);
            }
            self.map_family(family, addr)
        };
        self.endpoint.bind(&addr).map_err(|e| match e {
            EndpointError::NoPortAvailable => Errno::EADDRINUSE,
            e => e.into(),
        })
    }

    pub fn listen(&self, backlog: i32) -> Result<(), Errno> {
        self.endpoint.listen(backlog)?;
        if self.ty.family.is_inet()
            && self.is_tcp()
            && let Ok(local) = self.endpoint.local_address()
        {
            litebox::debug_log_println!(self.platform, "listen: tcp port {}", local.port);
        }
        Ok(())
    }

    /// Accept a pending connection.
    ///
    /// The new socket inherits this socket's type; `NONBLOCK` and `CLOEXEC` come from `flags`.
    /// The peer address is returned in guest form when `peer_requested`.
    pub fn accept(
        &self,
        cx: &WaitContext<'_, Platform>,
        flags: SockFlags,
        peer_requested: bool,
    ) -> Result<(Self, Option<Vec<u8>>), Errno> {
        let accepted = self.pollee.wait(
            cx,
            self.is_nonblocking(),
            Events::READABLE,
            || match self.endpoint.accept(peer_requested) {
                Ok(accepted) => Ok(accepted),
                Err(EndpointError::WouldBlock) => Err(TryOpError::TryAgain),
                Err(e) => Err(TryOpError::Other(e)),
            },
        )?;
        let peer = accepted
            .peer
            .filter(|_| peer_requested)
            .map(|peer| convert_address(self.ty.family, &peer));
        let socket = Self::new(
            self.platform,
            self.ty,
            accepted.endpoint,
            accepted.pollee,
            self.namespace.clone(),
            flags,
            self.metrics.clone(),
        );
        Ok((socket, peer))
    }

    /// `read(2)`: a single non-blocking read with no flags.
    pub fn read(&self, dst: &mut [u8], flags: u32) -> Result<usize, Errno> {
        if flags != 0 {
            return Err(Errno::EOPNOTSUPP);
        }
        if dst.is_empty() {
            return Ok(0);
        }
        match self.nonblocking_read(dst, false, false, false) {
            Ok(received) => Ok(received.count),
            Err(EndpointError::ClosedForReceive) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// `write(2)`: a single non-blocking write with no flags.
    pub fn write(&self, src: &[u8], flags: u32) -> Result<WriteOutcome, Errno> {
        if flags != 0 {
            return Err(Errno::EOPNOTSUPP);
        }
        let n = self.endpoint.write(src, &WriteOptions::default())?;
        if n < src.len() {
            Ok(WriteOutcome::Partial(n))
        } else {
            Ok(WriteOutcome::Complete(n))
        }
    }

    fn update_timestamp(&self, cm: &ReceivableControlMessages) {
        let mut state = self.read_state.lock();
        if !state.timestamp_enabled
            && let Some(ts) = cm.timestamp
        {
            state.last_timestamp = Some(ts);
        }
    }

    fn nonblocking_read(
        &self,
        dst: &mut [u8],
        peek: bool,
        trunc: bool,
        sender_requested: bool,
    ) -> Result<RecvMsgResult, EndpointError> {
        let opts = ReadOptions {
            peek,
            need_remote_addr: sender_requested,
            need_link_packet_info: self.ty.family == AddressFamily::PACKET,
        };
        if self.endpoint.kind().is_packet_based() {
            self.packet_read(dst, opts, trunc)
        } else {
            self.stream_read(dst, opts, trunc)
        }
    }

    fn packet_read(
        &self,
        dst: &mut [u8],
        opts: ReadOptions,
        trunc: bool,
    ) -> Result<RecvMsgResult, EndpointError> {
        let res = match self.endpoint.read(dst, opts) {
            Ok(res) => res,
            Err(EndpointError::BadBuffer) if dst.is_empty() => ReadResult::default(),
            Err(e) => return Err(e),
        };
        self.update_timestamp(&res.control_messages);

        let mut flags = ReceiveFlags::empty();
        if res.total > res.count {
            flags |= ReceiveFlags::TRUNC;
        }
        let sender = opts.need_remote_addr.then(|| self.packet_sender(&res));
        let timestamp_enabled = self.read_state.lock().timestamp_enabled;
        Ok(RecvMsgResult {
            count: if trunc { res.total } else { res.count },
            flags,
            sender,
            control: ControlMessages::from_endpoint(res.control_messages, timestamp_enabled),
        })
    }

    fn packet_sender(&self, res: &ReadResult) -> Vec<u8> {
        let sender = convert_address(self.ty.family, &res.remote_addr);
        if self.ty.family != AddressFamily::PACKET {
            return sender;
        }
        match read_struct::<SockAddrLl>(&sender) {
            Ok(mut ll) => {
                ll.protocol = res.link_packet_info.protocol.to_be_bytes();
                ll.pkttype = linux_packet_type(res.link_packet_info.pkt_type);
                ll.as_bytes().to_vec()
            }
            Err(_) => sender,
        }
    }

    fn stream_read(
        &self,
        dst: &mut [u8],
        opts: ReadOptions,
        trunc: bool,
    ) -> Result<RecvMsgResult, EndpointError> {
        let mut scratch = self.scratch.lock();
        if opts.peek && trunc {
            // Report how much could be read without consuming anything.
            let queued = self
                .endpoint
                .get_sock_opt_int(IntOption::ReceiveQueueSize)?;
            let mut out = RecvMsgResult::empty();
            out.count = dst.len().min(usize::try_from(queued).unwrap_or(0));
            return Ok(out);
        }
        let res = if trunc {
            scratch.clear();
            scratch.resize(dst.len(), 0);
            self.endpoint.read(&mut scratch, opts)
        } else {
            self.endpoint.read(dst, opts)
        };
        drop(scratch);
        let res = match res {
            Ok(res) => res,
            Err(EndpointError::BadBuffer) if dst.is_empty() => ReadResult::default(),
            Err(e) => return Err(e),
        };
        self.update_timestamp(&res.control_messages);
        if !opts.peek && res.count > 0 {
            self.endpoint.moderate_recv_buf(res.count);
        }

        let state = *self.read_state.lock();
        let mut control = ControlMessages::from_endpoint(res.control_messages, state.timestamp_enabled);
        if state.inq_enabled {
            let queued = self
                .endpoint
                .get_sock_opt_int(IntOption::ReceiveQueueSize)?;
            control.inq = Some(queued.max(0));
        }
        Ok(RecvMsgResult {
            count: res.count,
            flags: ReceiveFlags::empty(),
            sender: None,
            control,
        })
    }

    /// `recvmsg(2)`.
    ///
    /// Stream sockets accumulate until `dst` is full when `MSG_WAITALL` is set; packet sockets
    /// always return exactly one message. Data already copied is returned when the wait times out
    /// or is interrupted.
    pub fn recv_msg(
        &self,
        cx: &WaitContext<'_, Platform>,
        dst: &mut [u8],
        flags: ReceiveFlags,
        sender_requested: bool,
    ) -> Result<RecvMsgResult, Errno> {
        if flags.contains(ReceiveFlags::ERRQUEUE) {
            return self.recv_err(dst);
        }
        let packet_based = self.endpoint.kind().is_packet_based();
        let sender_requested = sender_requested && packet_based;
        let peek = flags.contains(ReceiveFlags::PEEK);
        let trunc = flags.contains(ReceiveFlags::TRUNC);
        let waitall = flags.contains(ReceiveFlags::WAITALL) && !peek && !packet_based;
        let dontwait = flags.contains(ReceiveFlags::DONTWAIT) || self.is_nonblocking();

        let cx = cx.with_timeout(self.endpoint.socket_options().receive_timeout());
        let mut total = 0;
        let mut last = None;
        let ret = self.pollee.wait(&cx, dontwait, Events::READABLE, || {
            match self.nonblocking_read(&mut dst[total..], peek, trunc, sender_requested) {
                Ok(received) => {
                    let n = received.count;
                    total += n;
                    last = Some(received);
                    if !waitall || n == 0 || total >= dst.len() {
                        Ok(())
                    } else {
                        Err(TryOpError::TryAgain)
                    }
                }
                Err(EndpointError::WouldBlock) => Err(TryOpError::TryAgain),
                Err(EndpointError::ClosedForReceive) => {
                    if packet_based && flags.contains(ReceiveFlags::DONTWAIT) {
                        Err(TryOpError::Other(Errno::EAGAIN))
                    } else {
                        Ok(())
                    }
                }
                Err(_) if total > 0 => Ok(()),
                Err(e) => Err(TryOpError::Other(e.into())),
            }
        });
        match ret {
            Ok(()) => {}
            Err(TryOpError::TryAgain | TryOpError::WaitError(_)) if total > 0 => {}
            Err(e) => return Err(e.into()),
        }
        let mut out = last.unwrap_or_else(RecvMsgResult::empty);
        out.count = total;
        Ok(out)
    }

    /// Pop the oldest queued error and re-derive `SO_ERROR` from the new head.
    fn dequeue_err_and_update(&self) -> Option<SockError> {
        let so = self.endpoint.socket_options();
        let err = so.dequeue_err()?;
        if let Some(head) = so.peek_err()
            && head.cause.origin.is_icmp()
        {
            so.set_last_error(Some(head.err));
        } else if err.cause.origin.is_icmp() {
            so.set_last_error(None);
        }
        Some(err)
    }

    fn recv_err(&self, dst: &mut [u8]) -> Result<RecvMsgResult, Errno> {
        let err = self.dequeue_err_and_update().ok_or(Errno::EAGAIN)?;
        let mut flags = ReceiveFlags::ERRQUEUE;
        if dst.len() < err.payload.len() {
            flags |= ReceiveFlags::TRUNC;
        }
        let n = dst.len().min(err.payload.len());
        dst[..n].copy_from_slice(&err.payload[..n]);
        let family = match err.net_proto {
            NetworkProtocol::Ipv4 => AddressFamily::INET,
            NetworkProtocol::Ipv6 => AddressFamily::INET6,
        };
        let sender = Some(convert_address(family, &err.dst));
        Ok(RecvMsgResult {
            count: n,
            flags,
            sender,
            control: ControlMessages {
                sock_err: Some(err),
                ..ControlMessages::default()
            },
        })
    }

    /// `sendmsg(2)`.
    ///
    /// Returns the number of bytes sent; an error is only reported if nothing was sent.
    pub fn send_msg(
        &self,
        cx: &WaitContext<'_, Platform>,
        src: &[u8],
        to: Option<&[u8]>,
        flags: SendFlags,
        control: &SendControl,
    ) -> Result<usize, Errno> {
        if control.has_unix {
            return Err(Errno::EINVAL);
        }
        let to = match to {
            Some(sockaddr) if !sockaddr.is_empty() => {
                let (addr, family) = address_and_family(sockaddr)?;
                if !self.check_family(family, false) {
                    return Err(Errno::EINVAL);
                }
                Some(self.map_family(family, addr))
            }
            _ => None,
        };
        let opts = WriteOptions {
            to,
            more: flags.contains(SendFlags::MORE),
            end_of_record: flags.contains(SendFlags::EOR),
            control_messages: SendableControlMessages {
                ttl: control.ttl,
                hop_limit: control.hop_limit,
            },
        };
        let dontwait = flags.contains(SendFlags::DONTWAIT) || self.is_nonblocking();

        let cx = cx.with_timeout(self.endpoint.socket_options().send_timeout());
        let mut total = 0;
        let ret = self.pollee.wait(&cx, dontwait, Events::WRITABLE, || {
            match self.endpoint.write(&src[total..], &opts) {
                Ok(n) => {
                    total += n;
                    if total >= src.len() {
                        Ok(())
                    } else {
                        Err(TryOpError::TryAgain)
                    }
                }
                Err(EndpointError::WouldBlock) => Err(TryOpError::TryAgain),
                Err(e) => Err(TryOpError::Other(e)),
            }
        });
        match ret {
            Ok(()) => Ok(total),
            Err(_) if total > 0 => Ok(total),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_sock_name(&self) -> Result<Vec<u8>, Errno> {
        let addr = self.endpoint.local_address()?;
        Ok(convert_address(self.ty.family, &addr))
    }

    pub fn get_peer_name(&self) -> Result<Vec<u8>, Errno> {
        let addr = self.endpoint.remote_address()?;
        Ok(convert_address(self.ty.family, &addr))
    }

    pub fn shutdown(&self, how: i32) -> Result<(), Errno> {
        let flags = match ShutdownHow::try_from(how).map_err(|_| Errno::EINVAL)? {
            ShutdownHow::Read => ShutdownFlags::READ,
            ShutdownHow::Write => ShutdownFlags::WRITE,
            ShutdownHow::ReadWrite => ShutdownFlags::READ | ShutdownFlags::WRITE,
        };
        self.endpoint.shutdown(flags)?;
        Ok(())
    }

    /// The Linux-visible state (`TCP_*` numbering), as reported in `/proc/net/*`.
    pub fn state(&self) -> u32 {
        if !self.ty.family.is_inet() {
            return 0;
        }
        match self.endpoint.state() {
            EndpointState::Tcp(state) => tcp_state_to_linux(state),
            EndpointState::Udp(UdpState::Connected) => TCP_ESTABLISHED,
            EndpointState::Udp(UdpState::Initial | UdpState::Bound | UdpState::Closed) => {
                TCP_CLOSE
            }
            EndpointState::Stateless => 0,
        }
    }

    /// The subset of `mask` that is ready.
    pub fn readiness(&self, mask: Events) -> Events {
        self.endpoint.readiness(mask)
    }

    /// Register an outer poller's observer on this socket's notification queue.
    pub fn register(&self, observer: Weak<dyn Observer<Events>>, mask: Events) -> ObserverToken {
        self.pollee.register(observer, mask)
    }

    pub fn unregister(&self, token: ObserverToken) {
        self.pollee.unregister(token);
    }

    /// Map a packet socket's receive ring into the guest.
    pub fn configure_mmap(&self) -> Result<(), Errno> {
        let ring = self
            .endpoint
            .packet_mmap()
            .filter(|ring| ring.has_ring())
            .ok_or(Errno::ENODEV)?;
        ring.map_ring()?;
        Ok(())
    }

    fn release_namespace(&self) {
        if let Some(ns) = self.namespace.upgrade() {
            ns.dec_ref();
        }
    }

    /// Close the socket.
    ///
    /// A TCP socket with `SO_LINGER` enabled and a non-zero timeout waits, up to that timeout,
    /// for the connection to leave `FIN_WAIT1`, `CLOSING` and `LAST_ACK`.
    pub fn release(mut self, cx: &WaitContext<'_, Platform>) {
        self.endpoint.close();
        let linger = self.endpoint.socket_options().linger();
        if self.ty.family.is_inet()
            && self.ty.sock_type == SockType::Stream
            && linger.enabled
            && !linger.timeout.is_zero()
        {
            let cx = cx.with_timeout(linger.timeout);
            let _ = self
                .pollee
                .wait(&cx, false, Events::HUP | Events::ERR, || {
                    match self.endpoint.state() {
                        EndpointState::Tcp(
                            TcpState::FinWait1 | TcpState::Closing | TcpState::LastAck,
                        ) => Err(TryOpError::<()>::TryAgain),
                        _ => Ok(()),
                    }
                });
        }
        self.release_namespace();
        self.released = true;
    }
}

impl<Platform: litebox::platform::Provider> Drop for Socket<Platform> {
    fn drop(&mut self) {
        if !self.released {
            self.endpoint.close();
            self.release_namespace();
        }
    }
}

impl<Platform: litebox::platform::Provider> IOPollable for Socket<Platform> {
    fn register_observer(
        &self,
        observer: Weak<dyn Observer<Events>>,
        mask: Events,
    ) -> ObserverToken {
        self.register(observer, mask)
    }

    fn unregister_observer(&self, token: ObserverToken) {
        self.unregister(token);
    }

    fn check_io_events(&self) -> Events {
        self.readiness(Events::all())
    }
}

/// Linux `TCP_*` state number for an endpoint state.
pub(super) fn tcp_state_to_linux(state: TcpState) -> u32 {
    match state {
        TcpState::Established => TCP_ESTABLISHED,
        TcpState::SynSent => TCP_SYN_SENT,
        TcpState::SynRecv => TCP_SYN_RECV,
        TcpState::FinWait1 => TCP_FIN_WAIT1,
        TcpState::FinWait2 => TCP_FIN_WAIT2,
        TcpState::TimeWait => TCP_TIME_WAIT,
        TcpState::CloseWait => TCP_CLOSE_WAIT,
        TcpState::LastAck => TCP_LAST_ACK,
        TcpState::Listen => TCP_LISTEN,
        TcpState::Closing => TCP_CLOSING,
        TcpState::Initial
        | TcpState::Bound
        | TcpState::Connecting
        | TcpState::Close
        | TcpState::Error => TCP_CLOSE,
    }
}

fn linux_packet_type(ty: PacketType) -> u8 {
    match ty {
        PacketType::Host => PACKET_HOST,
        PacketType::OtherHost => PACKET_OTHERHOST,
        PacketType::Outgoing => PACKET_OUTGOING,
        PacketType::Broadcast => PACKET_BROADCAST,
        PacketType::Multicast => PACKET_MULTICAST,
    }
}
