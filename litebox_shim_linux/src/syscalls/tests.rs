// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

extern crate std;

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use core::time::Duration;
use std::sync::Mutex;

use litebox::event::{Events, IOPollable, polling::Pollee, wait::WaitState};
use litebox::net::{
    AcceptedEndpoint, Address, BufferSizeLimits, Endpoint, EndpointError, EndpointState,
    FullAddress, IntOption, Interface, InterfaceAddress, InterfaceFlags, LingerOption,
    NetworkNamespace, NetworkProtocol, NetworkStack, PacketMmap, ReadOptions, ReadResult,
    ReceivableControlMessages, ReceiveFlags, RingRequest, SendFlags, ShutdownFlags, SockError,
    SockErrorCause,
    SockErrorOrigin, SockOpt, SockOptName, SocketKind, SocketOptions, TcpState,
    TransportProtocol, UdpState, WriteOptions,
};
use litebox::platform::mock::MockPlatform;
use litebox_common_linux::{
    AddressFamily, SockFlags, SockType, SocketOptionLevel,
    errno::Errno,
    net::{self as linux, IfReq, SockAddrIn, SockAddrIn6, TpacketReq, read_i32, read_struct},
};
use zerocopy::IntoBytes;

use super::IoctlArg;
use super::cmsg::SendControl;
use super::net::{Socket, SocketType, WriteOutcome};
use super::sockopt::{Caller, OptionUse, SockOptMetrics};

struct Chunk {
    data: Vec<u8>,
    from: FullAddress,
    cm: ReceivableControlMessages,
}

/// What the test can see and steer of a [`MockEndpoint`].
struct Shared {
    reads: VecDeque<Chunk>,
    eof: bool,
    /// Bytes that may still be written; `None` is unlimited.
    write_budget: Option<usize>,
    sent: Vec<(Option<FullAddress>, Vec<u8>)>,
    connect_script: VecDeque<Result<(), EndpointError>>,
    /// Once the script runs out, report that the connection is still being set up.
    connect_in_progress: bool,
    accept_queue: VecDeque<AcceptedEndpoint>,
    local: Option<FullAddress>,
    remote: Option<FullAddress>,
    state: EndpointState,
    ints: Vec<(IntOption, i32)>,
    opts: Vec<SockOpt>,
    closed: bool,
    ring_ready: bool,
    ring_mapped: bool,
    /// Fails the next ring allocation.
    ring_init_error: Option<EndpointError>,
    ring_teardowns: usize,
}

impl Shared {
    fn new(state: EndpointState) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            reads: VecDeque::new(),
            eof: false,
            write_budget: None,
            sent: Vec::new(),
            connect_script: VecDeque::new(),
            connect_in_progress: false,
            accept_queue: VecDeque::new(),
            local: None,
            remote: None,
            state,
            ints: Vec::new(),
            opts: Vec::new(),
            closed: false,
            ring_ready: false,
            ring_mapped: false,
            ring_init_error: None,
            ring_teardowns: 0,
        }))
    }
}

fn limits() -> BufferSizeLimits {
    BufferSizeLimits {
        min: 4096,
        default: 212_992,
        max: 4 << 20,
    }
}

struct MockEndpoint {
    kind: SocketKind,
    transport: TransportProtocol,
    shared: Arc<Mutex<Shared>>,
    options: SocketOptions,
}

impl MockEndpoint {
    fn new(kind: SocketKind, transport: TransportProtocol, shared: Arc<Mutex<Shared>>) -> Self {
        Self {
            kind,
            transport,
            shared,
            options: SocketOptions::new(limits(), limits()),
        }
    }
}

impl Endpoint for MockEndpoint {
    fn kind(&self) -> SocketKind {
        self.kind
    }

    fn transport(&self) -> TransportProtocol {
        self.transport
    }

    fn readiness(&self, mask: Events) -> Events {
        let s = self.shared.lock().unwrap();
        let mut ready = Events::empty();
        if !s.reads.is_empty() || s.eof || !s.accept_queue.is_empty() {
            ready |= Events::IN;
        }
        if s.write_budget != Some(0) {
            ready |= Events::OUT;
        }
        ready & mask
    }

    fn read(&self, dst: &mut [u8], opts: ReadOptions) -> Result<ReadResult, EndpointError> {
        let mut s = self.shared.lock().unwrap();
        if s.reads.is_empty() {
            return Err(if s.eof {
                EndpointError::ClosedForReceive
            } else {
                EndpointError::WouldBlock
            });
        }
        if self.kind.is_packet_based() {
            let chunk = s.reads.front().unwrap();
            let n = dst.len().min(chunk.data.len());
            dst[..n].copy_from_slice(&chunk.data[..n]);
            let res = ReadResult {
                count: n,
                total: chunk.data.len(),
                control_messages: chunk.cm.clone(),
                remote_addr: chunk.from,
                ..ReadResult::default()
            };
            if !opts.peek {
                s.reads.pop_front();
            }
            return Ok(res);
        }
        // A byte stream: drain queued chunks in order.
        let mut count = 0;
        let mut cm = ReceivableControlMessages::default();
        for chunk in &s.reads {
            let n = (dst.len() - count).min(chunk.data.len());
            dst[count..count + n].copy_from_slice(&chunk.data[..n]);
            count += n;
            if chunk.cm.timestamp.is_some() {
                cm.timestamp = chunk.cm.timestamp;
            }
        }
        if !opts.peek {
            let mut left = count;
            while left > 0 {
                let front = s.reads.front_mut().unwrap();
                if front.data.len() <= left {
                    left -= front.data.len();
                    s.reads.pop_front();
                } else {
                    front.data.drain(..left);
                    left = 0;
                }
            }
        }
        Ok(ReadResult {
            count,
            total: count,
            control_messages: cm,
            ..ReadResult::default()
        })
    }

    fn write(&self, src: &[u8], opts: &WriteOptions) -> Result<usize, EndpointError> {
        if let Some(FullAddress {
            addr: Address::V4(ip),
            ..
        }) = opts.to
            && ip.is_broadcast()
            && !self.options.broadcast()
        {
            return Err(EndpointError::BroadcastDisabled);
        }
        let mut s = self.shared.lock().unwrap();
        let n = s.write_budget.map_or(src.len(), |b| b.min(src.len()));
        if n == 0 && !src.is_empty() {
            return Err(EndpointError::WouldBlock);
        }
        if let Some(b) = &mut s.write_budget {
            *b -= n;
        }
        s.sent.push((opts.to, src[..n].to_vec()));
        Ok(n)
    }

    fn connect(&self, addr: &FullAddress) -> Result<(), EndpointError> {
        let mut s = self.shared.lock().unwrap();
        let outcome = match s.connect_script.pop_front() {
            Some(outcome) => outcome,
            None if s.connect_in_progress => Err(EndpointError::AlreadyConnecting),
            None => Ok(()),
        };
        if outcome.is_ok() {
            s.remote = Some(*addr);
            s.state = match self.transport {
                TransportProtocol::Tcp => EndpointState::Tcp(TcpState::Established),
                _ => EndpointState::Udp(UdpState::Connected),
            };
        }
        outcome
    }

    fn disconnect(&self) -> Result<(), EndpointError> {
        if self.transport == TransportProtocol::Tcp {
            return Err(EndpointError::NotSupported);
        }
        let mut s = self.shared.lock().unwrap();
        s.remote = None;
        s.state = EndpointState::Udp(UdpState::Bound);
        Ok(())
    }

    fn bind(&self, addr: &FullAddress) -> Result<(), EndpointError> {
        let mut s = self.shared.lock().unwrap();
        let mut addr = *addr;
        if addr.port == 0 {
            addr.port = 40000;
        }
        s.local = Some(addr);
        s.state = match self.transport {
            TransportProtocol::Tcp => EndpointState::Tcp(TcpState::Bound),
            _ => EndpointState::Udp(UdpState::Bound),
        };
        Ok(())
    }

    fn listen(&self, _backlog: i32) -> Result<(), EndpointError> {
        self.shared.lock().unwrap().state = EndpointState::Tcp(TcpState::Listen);
        self.options.set_accept_conn(true);
        Ok(())
    }

    fn accept(&self, _peer_requested: bool) -> Result<AcceptedEndpoint, EndpointError> {
        let mut s = self.shared.lock().unwrap();
        s.accept_queue.pop_front().ok_or(EndpointError::WouldBlock)
    }

    fn shutdown(&self, _flags: ShutdownFlags) -> Result<(), EndpointError> {
        Ok(())
    }

    fn close(&self) {
        let mut s = self.shared.lock().unwrap();
        s.closed = true;
        if s.state == EndpointState::Tcp(TcpState::Established) {
            s.state = EndpointState::Tcp(TcpState::FinWait1);
        }
    }

    fn local_address(&self) -> Result<FullAddress, EndpointError> {
        Ok(self.shared.lock().unwrap().local.unwrap_or_default())
    }

    fn remote_address(&self) -> Result<FullAddress, EndpointError> {
        self.shared
            .lock()
            .unwrap()
            .remote
            .ok_or(EndpointError::NotConnected)
    }

    fn get_sock_opt(&self, name: SockOptName) -> Result<SockOpt, EndpointError> {
        match name {
            SockOptName::KeepaliveIdle => Ok(SockOpt::KeepaliveIdle(Duration::from_secs(7200))),
            SockOptName::CongestionControl => Ok(SockOpt::CongestionControl("reno".into())),
            SockOptName::TcpLingerTimeout => Ok(SockOpt::TcpLingerTimeout(None)),
            _ => Err(EndpointError::UnknownProtocolOption),
        }
    }

    fn set_sock_opt(&self, opt: &SockOpt) -> Result<(), EndpointError> {
        self.shared.lock().unwrap().opts.push(opt.clone());
        Ok(())
    }

    fn get_sock_opt_int(&self, opt: IntOption) -> Result<i32, EndpointError> {
        let s = self.shared.lock().unwrap();
        if opt == IntOption::ReceiveQueueSize {
            let queued: usize = s.reads.iter().map(|c| c.data.len()).sum();
            return Ok(i32::try_from(queued).unwrap());
        }
        Ok(s
            .ints
            .iter()
            .rev()
            .find_map(|&(o, v)| (o == opt).then_some(v))
            .unwrap_or(0))
    }

    fn set_sock_opt_int(&self, opt: IntOption, value: i32) -> Result<(), EndpointError> {
        self.shared.lock().unwrap().ints.push((opt, value));
        Ok(())
    }

    fn socket_options(&self) -> &SocketOptions {
        &self.options
    }

    fn state(&self) -> EndpointState {
        self.shared.lock().unwrap().state
    }

    fn packet_mmap(&self) -> Option<&dyn PacketMmap> {
        (self.transport == TransportProtocol::Packet).then_some(self as &dyn PacketMmap)
    }
}

impl PacketMmap for MockEndpoint {
    fn has_ring(&self) -> bool {
        self.shared.lock().unwrap().ring_ready
    }

    fn is_mapped(&self) -> bool {
        self.shared.lock().unwrap().ring_mapped
    }

    fn init_ring(&self, _req: &RingRequest) -> Result<(), EndpointError> {
        let mut s = self.shared.lock().unwrap();
        if let Some(e) = s.ring_init_error.take() {
            return Err(e);
        }
        s.ring_ready = true;
        Ok(())
    }

    fn teardown_ring(&self) {
        let mut s = self.shared.lock().unwrap();
        s.ring_ready = false;
        s.ring_mapped = false;
        s.ring_teardowns += 1;
    }

    fn map_ring(&self) -> Result<(), EndpointError> {
        let mut s = self.shared.lock().unwrap();
        if !s.ring_ready {
            return Err(EndpointError::InvalidEndpointState);
        }
        s.ring_mapped = true;
        Ok(())
    }
}

struct MockStack;

impl NetworkStack for MockStack {
    fn interfaces(&self) -> BTreeMap<u32, Interface> {
        let mut out = BTreeMap::new();
        out.insert(
            1,
            Interface {
                name: String::from("lo"),
                device_type: 772,
                flags: InterfaceFlags::UP | InterfaceFlags::LOOPBACK | InterfaceFlags::RUNNING,
                addr: vec![0; 6],
                mtu: 65536,
            },
        );
        out.insert(
            2,
            Interface {
                name: String::from("eth0"),
                device_type: 1,
                flags: InterfaceFlags::UP | InterfaceFlags::BROADCAST | InterfaceFlags::RUNNING,
                addr: vec![0x02, 0x42, 0xac, 0x11, 0x00, 0x02],
                mtu: 1500,
            },
        );
        out
    }

    fn interface_addresses(&self, idx: u32) -> Vec<InterfaceAddress> {
        match idx {
            1 => vec![InterfaceAddress {
                addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
                prefix_len: 8,
            }],
            2 => vec![InterfaceAddress {
                addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
                prefix_len: 24,
            }],
            _ => Vec::new(),
        }
    }

    fn default_ttl(&self, _proto: NetworkProtocol) -> Option<u8> {
        Some(61)
    }

    fn send_buffer_limits(&self) -> BufferSizeLimits {
        limits()
    }

    fn receive_buffer_limits(&self) -> BufferSizeLimits {
        limits()
    }
}

struct MockNamespace {
    refs: AtomicI32,
    stack: MockStack,
}

impl NetworkNamespace for MockNamespace {
    fn inc_ref(&self) {
        self.refs.fetch_add(1, Ordering::SeqCst);
    }

    fn dec_ref(&self) {
        self.refs.fetch_sub(1, Ordering::SeqCst);
    }

    fn stack(&self) -> Option<&dyn NetworkStack> {
        Some(&self.stack)
    }
}

#[derive(Default)]
struct RecordingMetrics {
    seen: Mutex<Vec<(i32, i32, OptionUse)>>,
}

impl SockOptMetrics for RecordingMetrics {
    fn record(&self, level: i32, name: i32, kind: OptionUse) {
        self.seen.lock().unwrap().push((level, name, kind));
    }
}

struct Harness {
    platform: &'static MockPlatform,
    ns: Arc<MockNamespace>,
    shared: Arc<Mutex<Shared>>,
    pollee: Arc<Pollee>,
    metrics: Arc<RecordingMetrics>,
}

impl Harness {
    fn tcp() -> (Self, Socket<MockPlatform>) {
        Self::build(
            AddressFamily::INET,
            SockType::Stream,
            SocketKind::Stream,
            TransportProtocol::Tcp,
            EndpointState::Tcp(TcpState::Initial),
        )
    }

    fn udp() -> (Self, Socket<MockPlatform>) {
        Self::build(
            AddressFamily::INET,
            SockType::Datagram,
            SocketKind::Datagram,
            TransportProtocol::Udp,
            EndpointState::Udp(UdpState::Initial),
        )
    }

    fn build(
        family: AddressFamily,
        sock_type: SockType,
        kind: SocketKind,
        transport: TransportProtocol,
        state: EndpointState,
    ) -> (Self, Socket<MockPlatform>) {
        let platform = MockPlatform::new();
        let ns = Arc::new(MockNamespace {
            refs: AtomicI32::new(0),
            stack: MockStack,
        });
        let shared = Shared::new(state);
        let pollee = Arc::new(Pollee::new());
        let metrics = Arc::new(RecordingMetrics::default());
        let ns_dyn: Arc<dyn NetworkNamespace> = ns.clone();
        let namespace: Weak<dyn NetworkNamespace> = Arc::downgrade(&ns_dyn);
        let socket = Socket::new(
            platform,
            SocketType {
                family,
                sock_type,
                protocol: 0,
            },
            Box::new(MockEndpoint::new(kind, transport, shared.clone())),
            pollee.clone(),
            namespace,
            SockFlags::empty(),
            metrics.clone(),
        );
        let harness = Self {
            platform,
            ns,
            shared,
            pollee,
            metrics,
        };
        (harness, socket)
    }

    fn push(&self, data: &[u8]) {
        self.push_chunk(data, ReceivableControlMessages::default());
    }

    fn push_chunk(&self, data: &[u8], cm: ReceivableControlMessages) {
        self.shared.lock().unwrap().reads.push_back(Chunk {
            data: data.to_vec(),
            from: FullAddress {
                nic: 0,
                addr: Address::V4(Ipv4Addr::new(10, 0, 0, 9)),
                port: 5353,
            },
            cm,
        });
    }
}

fn sockaddr_in(ip: [u8; 4], port: u16) -> Vec<u8> {
    SockAddrIn {
        family: AddressFamily::INET.into(),
        port: port.to_be_bytes(),
        addr: ip,
        zero: [0; 8],
    }
    .as_bytes()
    .to_vec()
}

fn sockaddr_in6(ip: Ipv6Addr, port: u16) -> Vec<u8> {
    SockAddrIn6 {
        family: AddressFamily::INET6.into(),
        port: port.to_be_bytes(),
        flowinfo: 0,
        addr: ip.octets(),
        scope_id: 0,
    }
    .as_bytes()
    .to_vec()
}

fn int_opt(v: i32) -> [u8; 4] {
    v.to_ne_bytes()
}

fn get_int_opt(socket: &Socket<MockPlatform>, level: i32, name: i32) -> Result<i32, Errno> {
    let out = socket.get_sock_opt(&Caller::default(), level, name, &[0; 4])?;
    Ok(read_i32(&out).unwrap())
}

/// Spin until `pollee` has a registered waiter.
fn wait_for_waiter(pollee: &Pollee) {
    while pollee.observer_count() == 0 {
        std::thread::yield_now();
    }
}

fn icmp_error(err: EndpointError, payload: &[u8]) -> SockError {
    SockError {
        err,
        cause: SockErrorCause {
            origin: SockErrorOrigin::Icmp,
            type_: 3,
            code: 3,
            info: 0,
        },
        payload: payload.to_vec(),
        dst: FullAddress {
            nic: 0,
            addr: Address::V4(Ipv4Addr::new(10, 0, 0, 9)),
            port: 9,
        },
        offender: FullAddress {
            nic: 0,
            addr: Address::V4(Ipv4Addr::new(10, 0, 0, 1)),
            port: 0,
        },
        net_proto: NetworkProtocol::Ipv4,
    }
}

#[test]
fn bind_then_getsockname() {
    let (_h, socket) = Harness::udp();
    socket.bind(&sockaddr_in([0, 0, 0, 0], 0)).unwrap();
    let name: SockAddrIn = read_struct(&socket.get_sock_name().unwrap()).unwrap();
    assert_eq!(name.family, u16::from(AddressFamily::INET));
    assert_eq!(u16::from_be_bytes(name.port), 40000);
    assert_eq!(name.addr, [0, 0, 0, 0]);
}

#[test]
fn bind_checks_length_and_family() {
    let (_h, socket) = Harness::udp();
    assert_eq!(socket.bind(&[2]), Err(Errno::EINVAL));
    assert_eq!(socket.bind(&sockaddr_in([0; 4], 0)[..8]), Err(Errno::EINVAL));

    let v6 = SockAddrIn6 {
        family: AddressFamily::INET6.into(),
        ..SockAddrIn6::default()
    };
    assert_eq!(socket.bind(v6.as_bytes()), Err(Errno::EAFNOSUPPORT));
}

#[test]
fn receive_buffer_is_clamped_and_doubled() {
    let (_h, socket) = Harness::udp();
    let caller = Caller::default();
    let set = |v: i32| socket.set_sock_opt(&caller, linux::SOL_SOCKET, linux::SO_RCVBUF, &int_opt(v));
    let get = || get_int_opt(&socket, linux::SOL_SOCKET, linux::SO_RCVBUF).unwrap();

    set(1024).unwrap();
    assert_eq!(get(), 4096);
    set(100_000).unwrap();
    assert_eq!(get(), 200_000);
    set(1 << 30).unwrap();
    assert_eq!(get(), 8 << 20);
    // Sizes are read unsigned: -1 is a huge request, capped at the maximum.
    set(-1).unwrap();
    assert_eq!(get(), 8 << 20);
    socket
        .set_sock_opt(&caller, linux::SOL_SOCKET, linux::SO_SNDBUF, &int_opt(-1))
        .unwrap();
    assert_eq!(
        get_int_opt(&socket, linux::SOL_SOCKET, linux::SO_SNDBUF),
        Ok(8 << 20)
    );

    assert_eq!(
        socket.set_sock_opt(&caller, linux::SOL_SOCKET, linux::SO_RCVBUFFORCE, &int_opt(1 << 30)),
        Err(Errno::EPERM)
    );
    let admin = Caller {
        net_admin: true,
        ..Caller::default()
    };
    socket
        .set_sock_opt(&admin, linux::SOL_SOCKET, linux::SO_RCVBUFFORCE, &int_opt(1 << 30))
        .unwrap();
    assert_eq!(get(), i32::MAX);
}

#[test]
fn short_int_options_are_rejected() {
    let (_h, socket) = Harness::tcp();
    socket
        .endpoint
        .socket_options()
        .set_last_error(Some(EndpointError::ConnectionRefused));
    assert_eq!(
        socket.get_sock_opt(&Caller::default(), linux::SOL_SOCKET, linux::SO_ERROR, &[0; 2]),
        Err(Errno::EINVAL)
    );
    // The failed call must not have consumed the pending error.
    assert_eq!(
        get_int_opt(&socket, linux::SOL_SOCKET, linux::SO_ERROR),
        Ok(i32::from(Errno::ECONNREFUSED))
    );
    assert_eq!(get_int_opt(&socket, linux::SOL_SOCKET, linux::SO_ERROR), Ok(0));
}

#[test]
fn waitall_collects_across_wakeups() {
    let (h, socket) = Harness::tcp();
    socket
        .endpoint
        .socket_options()
        .set_receive_timeout(Some(Duration::from_secs(5)));

    let feeder = {
        let shared = h.shared.clone();
        let pollee = h.pollee.clone();
        std::thread::spawn(move || {
            wait_for_waiter(&pollee);
            for part in [&b"hello"[..], &b" world"[..]] {
                shared.lock().unwrap().reads.push_back(Chunk {
                    data: part.to_vec(),
                    from: FullAddress::default(),
                    cm: ReceivableControlMessages::default(),
                });
                pollee.notify_observers(Events::IN);
                while !shared.lock().unwrap().reads.is_empty() {
                    std::thread::yield_now();
                }
            }
        })
    };

    let ws = WaitState::new(h.platform);
    let mut buf = [0u8; 11];
    let out = socket
        .recv_msg(&ws.context(), &mut buf, ReceiveFlags::WAITALL, false)
        .unwrap();
    feeder.join().unwrap();
    assert_eq!(out.count, 11);
    assert_eq!(&buf, b"hello world");
    assert_eq!(h.pollee.observer_count(), 0);
}

#[test]
fn plain_receive_returns_what_is_there() {
    let (h, socket) = Harness::tcp();
    h.push(b"abc");
    let ws = WaitState::new(h.platform);
    let mut buf = [0u8; 10];
    let out = socket
        .recv_msg(&ws.context(), &mut buf, ReceiveFlags::empty(), false)
        .unwrap();
    assert_eq!(out.count, 3);
    assert_eq!(&buf[..3], b"abc");
    assert!(out.sender.is_none());
}

#[test]
fn receive_timeout_without_data() {
    let (h, socket) = Harness::tcp();
    socket
        .endpoint
        .socket_options()
        .set_receive_timeout(Some(Duration::from_millis(20)));
    let ws = WaitState::new(h.platform);
    let mut buf = [0u8; 4];
    assert_eq!(
        socket
            .recv_msg(&ws.context(), &mut buf, ReceiveFlags::empty(), false)
            .unwrap_err(),
        Errno::EAGAIN
    );
    assert_eq!(h.pollee.observer_count(), 0);
}

#[test]
fn end_of_stream_reads_zero() {
    let (h, socket) = Harness::tcp();
    h.shared.lock().unwrap().eof = true;
    let mut buf = [0u8; 4];
    assert_eq!(socket.read(&mut buf, 0), Ok(0));
    let ws = WaitState::new(h.platform);
    let out = socket
        .recv_msg(&ws.context(), &mut buf, ReceiveFlags::empty(), false)
        .unwrap();
    assert_eq!(out.count, 0);
}

#[test]
fn datagram_truncation_reports_full_length() {
    let (h, socket) = Harness::udp();
    h.push(b"0123456789");
    let ws = WaitState::new(h.platform);
    let mut buf = [0u8; 4];
    let out = socket
        .recv_msg(&ws.context(), &mut buf, ReceiveFlags::TRUNC, true)
        .unwrap();
    assert_eq!(out.count, 10);
    assert!(out.flags.contains(ReceiveFlags::TRUNC));
    assert_eq!(&buf, b"0123");
    let from: SockAddrIn = read_struct(&out.sender.unwrap()).unwrap();
    assert_eq!(from.addr, [10, 0, 0, 9]);
    assert_eq!(u16::from_be_bytes(from.port), 5353);
}

#[test]
fn timestamps_follow_so_timestamp() {
    let (h, socket) = Harness::udp();
    let ws = WaitState::new(h.platform);
    let stamped = ReceivableControlMessages {
        timestamp: Some(Duration::from_secs(1_700_000_000)),
        ..ReceivableControlMessages::default()
    };
    let mut tv = [0u8; 16];
    assert_eq!(
        socket.ioctl(linux::SIOCGSTAMP, IoctlArg::Buffer(&mut tv)),
        Err(Errno::ENOENT)
    );

    h.push_chunk(b"a", stamped.clone());
    let mut buf = [0u8; 4];
    let out = socket
        .recv_msg(&ws.context(), &mut buf, ReceiveFlags::empty(), false)
        .unwrap();
    assert_eq!(out.control.timestamp, None);
    socket
        .ioctl(linux::SIOCGSTAMP, IoctlArg::Buffer(&mut tv))
        .unwrap();
    assert_eq!(read_i32(&tv).unwrap(), 1_700_000_000);

    socket
        .set_sock_opt(&Caller::default(), linux::SOL_SOCKET, linux::SO_TIMESTAMP, &int_opt(1))
        .unwrap();
    h.push_chunk(b"b", stamped);
    let out = socket
        .recv_msg(&ws.context(), &mut buf, ReceiveFlags::empty(), false)
        .unwrap();
    assert_eq!(out.control.timestamp, Some(Duration::from_secs(1_700_000_000)));
}

#[test]
fn unspecified_connect_disconnects() {
    let (h, socket) = Harness::udp();
    let ws = WaitState::new(h.platform);
    socket
        .connect(&ws.context(), &sockaddr_in([10, 0, 0, 9], 53))
        .unwrap();
    assert!(socket.get_peer_name().is_ok());
    assert_eq!(socket.state(), linux::TCP_ESTABLISHED);

    let unspec = [0u8; 16];
    socket.connect(&ws.context(), &unspec).unwrap();
    assert_eq!(socket.get_peer_name(), Err(Errno::ENOTCONN));
    assert_eq!(socket.state(), linux::TCP_CLOSE);
}

#[test]
fn error_queue_drains_in_order() {
    let (h, socket) = Harness::udp();
    let so = socket.endpoint.socket_options();
    so.set_ip_recv_error(true);
    so.queue_err(icmp_error(EndpointError::ConnectionRefused, b"first"));
    so.queue_err(icmp_error(EndpointError::HostUnreachable, b"second"));
    so.set_last_error(Some(EndpointError::ConnectionRefused));

    let ws = WaitState::new(h.platform);
    let mut buf = [0u8; 3];
    let out = socket
        .recv_msg(&ws.context(), &mut buf, ReceiveFlags::ERRQUEUE, false)
        .unwrap();
    assert_eq!(out.count, 3);
    assert_eq!(out.flags, ReceiveFlags::ERRQUEUE | ReceiveFlags::TRUNC);
    assert_eq!(&buf, b"fir");
    let to: SockAddrIn = read_struct(&out.sender.unwrap()).unwrap();
    assert_eq!(to.addr, [10, 0, 0, 9]);
    let (cmsg, truncated) = out.control.pack(AddressFamily::INET, 256);
    assert!(!truncated);
    let hdr: linux::CmsgHdr = read_struct(&cmsg).unwrap();
    assert_eq!((hdr.level, hdr.type_), (linux::SOL_IP, linux::IP_RECVERR));

    // The next queued ICMP error is now the pending one.
    assert_eq!(
        get_int_opt(&socket, linux::SOL_SOCKET, linux::SO_ERROR),
        Ok(i32::from(Errno::EHOSTUNREACH))
    );

    let mut buf = [0u8; 16];
    let out = socket
        .recv_msg(&ws.context(), &mut buf, ReceiveFlags::ERRQUEUE, false)
        .unwrap();
    assert_eq!(&buf[..out.count], b"second");
    assert_eq!(out.flags, ReceiveFlags::ERRQUEUE);
    assert_eq!(get_int_opt(&socket, linux::SOL_SOCKET, linux::SO_ERROR), Ok(0));

    assert_eq!(
        socket
            .recv_msg(&ws.context(), &mut buf, ReceiveFlags::ERRQUEUE, false)
            .unwrap_err(),
        Errno::EAGAIN
    );
}

#[test]
fn linger_waits_for_close() {
    let (h, socket) = Harness::tcp();
    let ws = WaitState::new(h.platform);
    socket
        .connect(&ws.context(), &sockaddr_in([10, 0, 0, 9], 80))
        .unwrap();
    socket.endpoint.socket_options().set_linger(LingerOption {
        enabled: true,
        timeout: Duration::from_secs(5),
    });

    let closer = {
        let shared = h.shared.clone();
        let pollee = h.pollee.clone();
        std::thread::spawn(move || {
            wait_for_waiter(&pollee);
            shared.lock().unwrap().state = EndpointState::Tcp(TcpState::Close);
            pollee.notify_observers(Events::HUP);
        })
    };
    socket.release(&ws.context());
    closer.join().unwrap();

    let s = h.shared.lock().unwrap();
    assert!(s.closed);
    assert_eq!(s.state, EndpointState::Tcp(TcpState::Close));
    assert_eq!(h.pollee.observer_count(), 0);
    assert_eq!(h.ns.refs.load(Ordering::SeqCst), 0);
}

#[test]
fn linger_gives_up_at_timeout() {
    let (h, socket) = Harness::tcp();
    let ws = WaitState::new(h.platform);
    socket
        .connect(&ws.context(), &sockaddr_in([10, 0, 0, 9], 80))
        .unwrap();
    socket.endpoint.socket_options().set_linger(LingerOption {
        enabled: true,
        timeout: Duration::from_millis(30),
    });
    socket.release(&ws.context());

    assert_eq!(
        h.shared.lock().unwrap().state,
        EndpointState::Tcp(TcpState::FinWait1)
    );
    assert_eq!(h.pollee.observer_count(), 0);
}

#[test]
fn udp_broadcast_needs_so_broadcast() {
    let (h, socket) = Harness::udp();
    let ws = WaitState::new(h.platform);
    let to = sockaddr_in([255, 255, 255, 255], 9);
    let send = || {
        socket.send_msg(
            &ws.context(),
            b"ping",
            Some(&to),
            SendFlags::empty(),
            &SendControl::default(),
        )
    };

    assert_eq!(send(), Err(Errno::EACCES));
    socket
        .set_sock_opt(&Caller::default(), linux::SOL_SOCKET, linux::SO_BROADCAST, &int_opt(1))
        .unwrap();
    assert_eq!(send(), Ok(4));

    let s = h.shared.lock().unwrap();
    assert_eq!(s.sent.len(), 1);
    assert_eq!(
        s.sent[0].0.unwrap().addr,
        Address::V4(Ipv4Addr::BROADCAST)
    );
    assert_eq!(s.sent[0].1, b"ping");
}

#[test]
fn send_rejects_unix_rights() {
    let (h, socket) = Harness::udp();
    let ws = WaitState::new(h.platform);
    let control = SendControl {
        has_unix: true,
        ..SendControl::default()
    };
    assert_eq!(
        socket.send_msg(&ws.context(), b"x", None, SendFlags::empty(), &control),
        Err(Errno::EINVAL)
    );
    assert!(h.shared.lock().unwrap().sent.is_empty());
}

#[test]
fn partial_write_reports_progress() {
    let (h, socket) = Harness::tcp();
    h.shared.lock().unwrap().write_budget = Some(3);
    assert_eq!(socket.write(b"hello", 0), Ok(WriteOutcome::Partial(3)));
    assert_eq!(socket.write(b"lo", 0), Err(Errno::EAGAIN));
    assert_eq!(socket.write(b"lo", 1), Err(Errno::EOPNOTSUPP));
    let mut buf = [0u8; 4];
    assert_eq!(socket.read(&mut buf, 2), Err(Errno::EOPNOTSUPP));
}

#[test]
fn listen_logs_port() {
    let (h, socket) = Harness::tcp();
    socket.bind(&sockaddr_in([127, 0, 0, 1], 8080)).unwrap();
    socket.listen(16).unwrap();
    assert!(
        h.platform
            .debug_log()
            .iter()
            .any(|line| line == "listen: tcp port 8080\n")
    );
    assert_eq!(socket.state(), linux::TCP_LISTEN);
    assert_eq!(
        get_int_opt(&socket, linux::SOL_SOCKET, linux::SO_ACCEPTCONN),
        Ok(1)
    );
}

#[test]
fn blocking_connect_waits_for_writable() {
    let (h, socket) = Harness::tcp();
    h.shared.lock().unwrap().connect_script =
        VecDeque::from([Err(EndpointError::ConnectStarted), Ok(())]);
    socket
        .endpoint
        .socket_options()
        .set_send_timeout(Some(Duration::from_secs(5)));
    let notifier = {
        let pollee = h.pollee.clone();
        std::thread::spawn(move || {
            wait_for_waiter(&pollee);
            pollee.notify_observers(Events::OUT);
        })
    };
    let ws = WaitState::new(h.platform);
    socket
        .connect(&ws.context(), &sockaddr_in([10, 0, 0, 9], 80))
        .unwrap();
    notifier.join().unwrap();
    assert_eq!(socket.state(), linux::TCP_ESTABLISHED);
    assert_eq!(h.pollee.observer_count(), 0);
}

#[test]
fn blocking_connect_times_out_in_progress() {
    let (h, socket) = Harness::tcp();
    {
        let mut s = h.shared.lock().unwrap();
        s.connect_script = VecDeque::from([Err(EndpointError::ConnectStarted)]);
        s.connect_in_progress = true;
    }
    socket
        .endpoint
        .socket_options()
        .set_send_timeout(Some(Duration::from_millis(20)));
    let ws = WaitState::new(h.platform);
    assert_eq!(
        socket.connect(&ws.context(), &sockaddr_in([10, 0, 0, 9], 80)),
        Err(Errno::EINPROGRESS)
    );
    assert_eq!(h.pollee.observer_count(), 0);
}

#[test]
fn nonblocking_connect_reports_in_progress() {
    let (h, socket) = Harness::tcp();
    h.shared.lock().unwrap().connect_script =
        VecDeque::from([Err(EndpointError::ConnectStarted)]);
    socket.set_nonblocking(true);
    let ws = WaitState::new(h.platform);
    assert_eq!(
        socket.connect(&ws.context(), &sockaddr_in([10, 0, 0, 9], 80)),
        Err(Errno::EINPROGRESS)
    );
}

#[test]
fn ignored_options_are_recorded() {
    let (h, socket) = Harness::tcp();
    let caller = Caller::default();
    socket
        .set_sock_opt(&caller, linux::SOL_SOCKET, linux::SO_MARK, &int_opt(1))
        .unwrap();
    socket
        .set_sock_opt(&caller, linux::SOL_SOCKET, 12345, &int_opt(1))
        .unwrap();
    socket.set_sock_opt(&caller, 17, 1, &int_opt(1)).unwrap();
    assert_eq!(
        *h.metrics.seen.lock().unwrap(),
        [
            (linux::SOL_SOCKET, linux::SO_MARK, OptionUse::Unsupported),
            (linux::SOL_SOCKET, 12345, OptionUse::Unknown),
            (17, 1, OptionUse::Unknown),
        ]
    );
    assert_eq!(
        socket.get_sock_opt(&caller, 17, 1, &[0; 4]),
        Err(Errno::ENOPROTOOPT)
    );
}

#[test]
fn tcp_options_validate_ranges() {
    let (h, socket) = Harness::tcp();
    let caller = Caller::default();
    let set = |name: i32, v: i32| socket.set_sock_opt(&caller, linux::SOL_TCP, name, &int_opt(v));

    assert_eq!(set(linux::TCP_KEEPIDLE, 0), Err(Errno::EINVAL));
    assert_eq!(set(linux::TCP_KEEPIDLE, 32768), Err(Errno::EINVAL));
    set(linux::TCP_KEEPIDLE, 60).unwrap();
    assert_eq!(set(linux::TCP_KEEPCNT, 128), Err(Errno::EINVAL));
    set(linux::TCP_NODELAY, 1).unwrap();
    assert!(!socket.endpoint.socket_options().delay());
    assert_eq!(get_int_opt(&socket, linux::SOL_TCP, linux::TCP_NODELAY), Ok(1));
    assert_eq!(get_int_opt(&socket, linux::SOL_TCP, linux::TCP_LINGER2), Ok(-1));
    assert_eq!(
        get_int_opt(&socket, linux::SOL_TCP, linux::TCP_KEEPIDLE),
        Ok(7200)
    );

    let cc = socket
        .get_sock_opt(&caller, linux::SOL_TCP, linux::TCP_CONGESTION, &[0; 32])
        .unwrap();
    assert_eq!(cc.len(), 16);
    assert_eq!(&cc[..5], b"reno\0");

    assert!(
        h.shared
            .lock()
            .unwrap()
            .opts
            .contains(&SockOpt::KeepaliveIdle(Duration::from_secs(60)))
    );

    let (_h, udp) = Harness::udp();
    assert_eq!(
        udp.set_sock_opt(&caller, linux::SOL_TCP, linux::TCP_NODELAY, &int_opt(1)),
        Err(Errno::ENOPROTOOPT)
    );
}

#[test]
fn ip_ttl_falls_back_to_namespace_default() {
    let (_h, socket) = Harness::udp();
    assert_eq!(get_int_opt(&socket, linux::SOL_IP, linux::IP_TTL), Ok(61));
    socket
        .set_sock_opt(&Caller::default(), linux::SOL_IP, linux::IP_TTL, &int_opt(9))
        .unwrap();
    assert_eq!(get_int_opt(&socket, linux::SOL_IP, linux::IP_TTL), Ok(9));
    assert_eq!(
        socket.set_sock_opt(&Caller::default(), linux::SOL_IP, linux::IP_TTL, &int_opt(256)),
        Err(Errno::EINVAL)
    );
}

#[test]
fn v6only_is_fixed_after_bind() {
    let (_h, socket) = Harness::build(
        AddressFamily::INET6,
        SockType::Stream,
        SocketKind::Stream,
        TransportProtocol::Tcp,
        EndpointState::Tcp(TcpState::Initial),
    );
    let caller = Caller::default();
    socket
        .set_sock_opt(&caller, linux::SOL_IPV6, linux::IPV6_V6ONLY, &int_opt(1))
        .unwrap();
    assert!(socket.endpoint.socket_options().v6_only());

    let any6 = SockAddrIn6 {
        family: AddressFamily::INET6.into(),
        ..SockAddrIn6::default()
    };
    socket.bind(any6.as_bytes()).unwrap();
    assert_eq!(
        socket.set_sock_opt(&caller, linux::SOL_IPV6, linux::IPV6_V6ONLY, &int_opt(0)),
        Err(Errno::EINVAL)
    );

    let (_h, v4) = Harness::udp();
    assert_eq!(
        v4.get_sock_opt(&caller, linux::SOL_IPV6, linux::IPV6_V6ONLY, &[0; 4]),
        Err(Errno::EOPNOTSUPP)
    );
}

#[test]
fn bind_to_device_by_name() {
    let (_h, socket) = Harness::udp();
    let caller = Caller::default();
    socket
        .set_sock_opt(&caller, linux::SOL_SOCKET, linux::SO_BINDTODEVICE, b"eth0\0")
        .unwrap();
    assert_eq!(socket.endpoint.socket_options().bound_device(), 2);
    let name = socket
        .get_sock_opt(&caller, linux::SOL_SOCKET, linux::SO_BINDTODEVICE, &[0; 16])
        .unwrap();
    assert_eq!(name, b"eth0\0");

    assert_eq!(
        socket.set_sock_opt(&caller, linux::SOL_SOCKET, linux::SO_BINDTODEVICE, b"wlan9"),
        Err(Errno::ENODEV)
    );
    socket
        .set_sock_opt(&caller, linux::SOL_SOCKET, linux::SO_BINDTODEVICE, b"")
        .unwrap();
    assert_eq!(socket.endpoint.socket_options().bound_device(), 0);
}

#[test]
fn interface_ioctls() {
    let (_h, socket) = Harness::udp();

    let mut req = IfReq::default();
    req.set_name("lo");
    let mut buf = req.as_bytes().to_vec();
    socket
        .ioctl(linux::SIOCGIFFLAGS, IoctlArg::Buffer(&mut buf))
        .unwrap();
    let out: IfReq = read_struct(&buf).unwrap();
    assert_eq!(u16::from_ne_bytes([out.data[0], out.data[1]]), 0x1 | 0x8 | 0x40);

    let mut req = IfReq::default();
    req.set_name("eth0");
    let mut buf = req.as_bytes().to_vec();
    socket
        .ioctl(linux::SIOCGIFINDEX, IoctlArg::Buffer(&mut buf))
        .unwrap();
    assert_eq!(read_i32(&buf[16..]).unwrap(), 2);
    socket
        .ioctl(linux::SIOCGIFNETMASK, IoctlArg::Buffer(&mut buf))
        .unwrap();
    assert_eq!(&buf[20..24], &[255, 255, 255, 0]);

    let mut req = IfReq::default();
    req.set_name("nope");
    let mut buf = req.as_bytes().to_vec();
    assert_eq!(
        socket.ioctl(linux::SIOCGIFMTU, IoctlArg::Buffer(&mut buf)),
        Err(Errno::ENODEV)
    );

    let mut len = 0;
    socket
        .ioctl(linux::SIOCGIFCONF, IoctlArg::IfConf { len: &mut len, buf: None })
        .unwrap();
    assert_eq!(len, 80);

    let mut len = 40;
    let mut conf = [0u8; 40];
    socket
        .ioctl(
            linux::SIOCGIFCONF,
            IoctlArg::IfConf {
                len: &mut len,
                buf: Some(&mut conf),
            },
        )
        .unwrap();
    assert_eq!(len, 40);
    let entry: IfReq = read_struct(&conf).unwrap();
    assert_eq!(entry.name(), b"lo");
    assert_eq!(&entry.data[4..8], &[127, 0, 0, 1]);

    let mut buf = [0u8; 4];
    assert_eq!(
        socket.ioctl(0x5401, IoctlArg::Buffer(&mut buf)),
        Err(Errno::ENOTTY)
    );
}

#[test]
fn queue_size_ioctls() {
    let (h, socket) = Harness::tcp();
    h.push(b"12345");
    let mut buf = [0u8; 4];
    socket
        .ioctl(linux::TIOCINQ, IoctlArg::Buffer(&mut buf))
        .unwrap();
    assert_eq!(i32::from_ne_bytes(buf), 5);
}

#[test]
fn accept_applies_new_flags() {
    let (h, listener) = Harness::tcp();
    listener.bind(&sockaddr_in([0; 4], 8080)).unwrap();
    listener.listen(4).unwrap();
    listener.set_nonblocking(true);
    let ws = WaitState::new(h.platform);
    assert_eq!(
        listener
            .accept(&ws.context(), SockFlags::empty(), false)
            .err(),
        Some(Errno::EAGAIN)
    );

    let child = Shared::new(EndpointState::Tcp(TcpState::Established));
    h.shared
        .lock()
        .unwrap()
        .accept_queue
        .push_back(AcceptedEndpoint {
            endpoint: Box::new(MockEndpoint::new(
                SocketKind::Stream,
                TransportProtocol::Tcp,
                child,
            )),
            pollee: Arc::new(Pollee::new()),
            peer: Some(FullAddress {
                nic: 0,
                addr: Address::V4(Ipv4Addr::new(10, 0, 0, 9)),
                port: 5555,
            }),
        });
    let (conn, peer) = listener
        .accept(&ws.context(), SockFlags::NONBLOCK, true)
        .unwrap();
    assert!(conn.is_nonblocking());
    assert!(!conn.is_cloexec());
    assert_eq!(conn.socket_type(), listener.socket_type());
    let peer: SockAddrIn = read_struct(&peer.unwrap()).unwrap();
    assert_eq!(u16::from_be_bytes(peer.port), 5555);
    assert_eq!(h.ns.refs.load(Ordering::SeqCst), 2);

    conn.release(&ws.context());
    assert_eq!(h.ns.refs.load(Ordering::SeqCst), 1);
    drop(listener);
    assert_eq!(h.ns.refs.load(Ordering::SeqCst), 0);
}

#[test]
fn readiness_tracks_endpoint() {
    let (h, socket) = Harness::udp();
    assert_eq!(socket.readiness(Events::IN), Events::empty());
    assert_eq!(socket.check_io_events(), Events::OUT);
    h.push(b"x");
    assert_eq!(socket.readiness(Events::IN), Events::IN);
}

#[test]
fn shutdown_rejects_unknown_how() {
    let (_h, socket) = Harness::tcp();
    socket.shutdown(2).unwrap();
    assert_eq!(socket.shutdown(3), Err(Errno::EINVAL));
}

#[test]
fn ipv4_any_on_ipv6_socket_is_mapped() {
    let (h, socket) = Harness::build(
        AddressFamily::INET6,
        SockType::Datagram,
        SocketKind::Datagram,
        TransportProtocol::Udp,
        EndpointState::Udp(UdpState::Initial),
    );
    let ws = WaitState::new(h.platform);
    socket
        .connect(&ws.context(), &sockaddr_in([0, 0, 0, 0], 7))
        .unwrap();
    let remote = h.shared.lock().unwrap().remote.unwrap();
    assert_eq!(
        remote.addr,
        Address::V6(Ipv4Addr::UNSPECIFIED.to_ipv6_mapped())
    );

    socket
        .set_sock_opt(&Caller::default(), linux::SOL_IPV6, linux::IPV6_V6ONLY, &int_opt(1))
        .unwrap_err();
    socket.endpoint.socket_options().set_v6_only(true);
    assert_eq!(
        socket.connect(&ws.context(), &sockaddr_in([10, 0, 0, 9], 7)),
        Err(Errno::EINVAL)
    );
}

#[test]
fn ipv6_stream_connect_without_free_port() {
    let (h, socket) = Harness::build(
        AddressFamily::INET6,
        SockType::Stream,
        SocketKind::Stream,
        TransportProtocol::Tcp,
        EndpointState::Tcp(TcpState::Initial),
    );
    h.shared.lock().unwrap().connect_script = VecDeque::from([
        Err(EndpointError::NoPortAvailable),
        Err(EndpointError::NoPortAvailable),
    ]);
    let ws = WaitState::new(h.platform);
    let to = sockaddr_in6(Ipv6Addr::LOCALHOST, 80);
    assert_eq!(
        socket.connect(&ws.context(), &to),
        Err(Errno::EADDRNOTAVAIL)
    );
    socket.set_nonblocking(true);
    assert_eq!(
        socket.connect(&ws.context(), &to),
        Err(Errno::EADDRNOTAVAIL)
    );
}

#[test]
fn datagram_connect_without_free_port_is_eagain() {
    let (h, socket) = Harness::build(
        AddressFamily::INET6,
        SockType::Datagram,
        SocketKind::Datagram,
        TransportProtocol::Udp,
        EndpointState::Udp(UdpState::Initial),
    );
    h.shared.lock().unwrap().connect_script =
        VecDeque::from([Err(EndpointError::NoPortAvailable)]);
    let ws = WaitState::new(h.platform);
    assert_eq!(
        socket.connect(&ws.context(), &sockaddr_in6(Ipv6Addr::LOCALHOST, 53)),
        Err(Errno::EAGAIN)
    );
}

#[test]
fn mtu_discover_is_stored_as_mode() {
    let (h, socket) = Harness::udp();
    socket
        .set_sock_opt(
            &Caller::default(),
            linux::SOL_IP,
            linux::IP_MTU_DISCOVER,
            &int_opt(linux::IP_PMTUDISC_DO),
        )
        .unwrap();
    assert_eq!(
        h.shared.lock().unwrap().ints.last(),
        Some(&(IntOption::MtuDiscover, 2))
    );
    assert_eq!(
        get_int_opt(&socket, linux::SOL_IP, linux::IP_MTU_DISCOVER),
        Ok(linux::IP_PMTUDISC_DO)
    );
}

#[test]
fn blocking_send_waits_for_writable() {
    let (h, socket) = Harness::tcp();
    h.shared.lock().unwrap().write_budget = Some(0);
    socket
        .endpoint
        .socket_options()
        .set_send_timeout(Some(Duration::from_secs(5)));
    let drainer = {
        let shared = h.shared.clone();
        let pollee = h.pollee.clone();
        std::thread::spawn(move || {
            wait_for_waiter(&pollee);
            shared.lock().unwrap().write_budget = None;
            pollee.notify_observers(Events::OUT);
        })
    };
    let ws = WaitState::new(h.platform);
    let sent = socket.send_msg(
        &ws.context(),
        b"hello",
        None,
        SendFlags::empty(),
        &SendControl::default(),
    );
    drainer.join().unwrap();
    assert_eq!(sent, Ok(5));
    assert_eq!(h.shared.lock().unwrap().sent.last().unwrap().1, b"hello");
    assert_eq!(h.pollee.observer_count(), 0);
}

#[test]
fn send_timeout_returns_partial_count() {
    let (h, socket) = Harness::tcp();
    h.shared.lock().unwrap().write_budget = Some(3);
    socket
        .endpoint
        .socket_options()
        .set_send_timeout(Some(Duration::from_millis(20)));
    let ws = WaitState::new(h.platform);
    let send = || {
        socket.send_msg(
            &ws.context(),
            b"hello",
            None,
            SendFlags::empty(),
            &SendControl::default(),
        )
    };
    assert_eq!(send(), Ok(3));
    // Nothing fits any more, so the deadline now surfaces as an error.
    assert_eq!(send(), Err(Errno::EAGAIN));
    assert_eq!(h.pollee.observer_count(), 0);
}

#[test]
fn dontwait_send_returns_partial_count() {
    let (h, socket) = Harness::tcp();
    h.shared.lock().unwrap().write_budget = Some(3);
    let ws = WaitState::new(h.platform);
    let send = || {
        socket.send_msg(
            &ws.context(),
            b"hello",
            None,
            SendFlags::DONTWAIT,
            &SendControl::default(),
        )
    };
    assert_eq!(send(), Ok(3));
    assert_eq!(send(), Err(Errno::EAGAIN));
    assert_eq!(h.shared.lock().unwrap().sent.len(), 1);
    assert_eq!(h.pollee.observer_count(), 0);
}

#[test]
fn interrupted_calls_return_eintr() {
    let interrupted = AtomicBool::new(true);
    let (h, socket) = Harness::tcp();
    h.shared.lock().unwrap().write_budget = Some(0);
    let ws = WaitState::new(h.platform);
    let cx = ws.context();
    let cx = cx.with_check_for_interrupt(&interrupted);

    let mut buf = [0u8; 4];
    assert_eq!(
        socket
            .recv_msg(&cx, &mut buf, ReceiveFlags::empty(), false)
            .unwrap_err(),
        Errno::EINTR
    );
    assert_eq!(
        socket.send_msg(&cx, b"x", None, SendFlags::empty(), &SendControl::default()),
        Err(Errno::EINTR)
    );
    assert_eq!(h.pollee.observer_count(), 0);

    // Once data is there the call completes without waiting.
    h.push(b"ok");
    let out = socket
        .recv_msg(&cx, &mut buf, ReceiveFlags::empty(), false)
        .unwrap();
    assert_eq!(&buf[..out.count], b"ok");
}

#[test]
fn error_queue_truncates_short_buffer() {
    let (h, socket) = Harness::udp();
    let so = socket.endpoint.socket_options();
    so.set_ip_recv_error(true);
    so.queue_err(icmp_error(EndpointError::HostUnreachable, b"0123456789"));
    let ws = WaitState::new(h.platform);
    let mut buf = [0u8; 4];
    let out = socket
        .recv_msg(&ws.context(), &mut buf, ReceiveFlags::ERRQUEUE, false)
        .unwrap();
    assert_eq!(out.count, 4);
    assert!(out.flags.contains(ReceiveFlags::ERRQUEUE | ReceiveFlags::TRUNC));
    assert_eq!(&buf, b"0123");
    assert!(out.control.sock_err.is_some());
}

fn packet_socket() -> (Harness, Socket<MockPlatform>) {
    Harness::build(
        AddressFamily::PACKET,
        SockType::Raw,
        SocketKind::Raw,
        TransportProtocol::Packet,
        EndpointState::Stateless,
    )
}

fn ring_request(frame_nr: u32) -> Vec<u8> {
    TpacketReq {
        block_size: 4096,
        block_nr: 1,
        frame_size: 2048,
        frame_nr,
    }
    .as_bytes()
    .to_vec()
}

#[test]
fn rx_ring_setup_and_mapping() {
    let (h, socket) = packet_socket();
    let caller = Caller::default();
    let level = i32::from(SocketOptionLevel::PACKET);
    let set_ring = |req: &[u8]| socket.set_sock_opt(&caller, level, linux::PACKET_RX_RING, req);

    assert_eq!(socket.configure_mmap(), Err(Errno::ENODEV));
    assert_eq!(set_ring(&[0; 8]), Err(Errno::EINVAL));

    set_ring(&ring_request(2)).unwrap();
    assert!(h.shared.lock().unwrap().ring_ready);
    assert!(
        h.shared
            .lock()
            .unwrap()
            .opts
            .iter()
            .any(|o| matches!(o, SockOpt::PacketRxRing(r) if r.frame_nr == 2))
    );
    socket.configure_mmap().unwrap();
    assert!(h.shared.lock().unwrap().ring_mapped);

    // A mapped ring cannot be replaced.
    assert_eq!(set_ring(&ring_request(4)), Err(Errno::EBUSY));
    assert_eq!(h.shared.lock().unwrap().ring_teardowns, 0);
}

#[test]
fn rx_ring_failure_tears_down() {
    let (h, socket) = packet_socket();
    let caller = Caller::default();
    let level = i32::from(SocketOptionLevel::PACKET);
    h.shared.lock().unwrap().ring_init_error = Some(EndpointError::NoBufferSpace);
    assert_eq!(
        socket.set_sock_opt(&caller, level, linux::PACKET_RX_RING, &ring_request(2)),
        Err(Errno::ENOBUFS)
    );
    {
        let s = h.shared.lock().unwrap();
        assert_eq!(s.ring_teardowns, 1);
        assert!(!s.ring_ready);
    }
    assert_eq!(socket.configure_mmap(), Err(Errno::ENODEV));

    // A request without frames only records the geometry.
    socket
        .set_sock_opt(&caller, level, linux::PACKET_RX_RING, &ring_request(0))
        .unwrap();
    assert!(!h.shared.lock().unwrap().ring_ready);
}

#[test]
fn rx_ring_needs_a_packet_endpoint() {
    let (_h, socket) = Harness::udp();
    let level = i32::from(SocketOptionLevel::PACKET);
    assert_eq!(
        socket.set_sock_opt(&Caller::default(), level, linux::PACKET_RX_RING, &ring_request(2)),
        Err(Errno::EOPNOTSUPP)
    );
}

#[test]
fn netfilter_options_need_a_raw_socket() {
    let (_h, socket) = Harness::tcp();
    let caller = Caller::default();
    assert_eq!(
        socket.get_sock_opt(&caller, linux::SOL_IP, linux::IPT_SO_GET_INFO, &[0; 4]),
        Err(Errno::EINVAL)
    );
    assert_eq!(
        socket.get_sock_opt(
            &caller,
            linux::SOL_IP,
            linux::IPT_SO_GET_INFO,
            &[0; linux::SIZEOF_IPT_GETINFO]
        ),
        Err(Errno::ENOPROTOOPT)
    );
    assert_eq!(
        socket.get_sock_opt(
            &caller,
            linux::SOL_IP,
            linux::IPT_SO_GET_REVISION_TARGET,
            &[0; linux::SIZEOF_XT_GET_REVISION]
        ),
        Err(Errno::ENOPROTOOPT)
    );
    assert_eq!(
        socket.set_sock_opt(
            &caller,
            linux::SOL_IP,
            linux::IPT_SO_SET_REPLACE,
            &[0; linux::SIZEOF_IPT_REPLACE]
        ),
        Err(Errno::ENOPROTOOPT)
    );

    // A raw socket gets past the type check but the stack has no filter.
    let (_h, raw) = Harness::build(
        AddressFamily::INET,
        SockType::Raw,
        SocketKind::Raw,
        TransportProtocol::Raw,
        EndpointState::Stateless,
    );
    assert_eq!(
        raw.get_sock_opt(
            &caller,
            linux::SOL_IP,
            linux::IPT_SO_GET_INFO,
            &[0; linux::SIZEOF_IPT_GETINFO]
        ),
        Err(Errno::ENOPROTOOPT)
    );
}
