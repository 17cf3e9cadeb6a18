// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::net::Ipv4Addr;
use core::time::Duration;

use super::*;

fn limits() -> BufferSizeLimits {
    BufferSizeLimits {
        min: 4096,
        default: 212_992,
        max: 4 << 20,
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
            addr: Address::V4(Ipv4Addr::new(10, 0, 0, 2)),
            port: 9,
        },
        offender: FullAddress {
            nic: 0,
            addr: Address::V4(Ipv4Addr::new(10, 0, 0, 2)),
            port: 0,
        },
        net_proto: NetworkProtocol::Ipv4,
    }
}

#[test]
fn fresh_options_use_defaults() {
    let opts = SocketOptions::new(limits(), limits());
    assert_eq!(opts.send_buffer_size(), 212_992);
    assert_eq!(opts.receive_buffer_size(), 212_992);
    assert!(opts.multicast_loop());
    assert!(!opts.broadcast());
    assert!(!opts.delay());
    assert_eq!(opts.rcv_lowat(), 1);
    assert_eq!(opts.bound_device(), 0);
    assert_eq!(opts.linger(), LingerOption::default());
    assert_eq!(opts.receive_timeout(), None);
}

#[test]
fn bool_options_are_independent() {
    let opts = SocketOptions::new(limits(), limits());
    opts.set_broadcast(true);
    opts.set_reuse_port(true);
    assert!(opts.broadcast());
    assert!(opts.reuse_port());
    assert!(!opts.reuse_address());
    opts.set_broadcast(false);
    assert!(!opts.broadcast());
    assert!(opts.reuse_port());
}

#[test]
fn last_error_is_cleared_by_reading() {
    let opts = SocketOptions::new(limits(), limits());
    opts.set_last_error(Some(EndpointError::ConnectionRefused));
    assert_eq!(
        opts.take_last_error(),
        Some(EndpointError::ConnectionRefused)
    );
    assert_eq!(opts.take_last_error(), None);
}

#[test]
fn error_queue_needs_recv_err() {
    let opts = SocketOptions::new(limits(), limits());
    opts.queue_err(icmp_error(EndpointError::ConnectionRefused, b"x"));
    assert_eq!(opts.error_queue_len(), 0);

    opts.set_ip_recv_error(true);
    opts.queue_err(icmp_error(EndpointError::ConnectionRefused, b"x"));
    assert_eq!(opts.error_queue_len(), 1);
}

#[test]
fn error_queue_is_fifo() {
    let opts = SocketOptions::new(limits(), limits());
    opts.set_ipv6_recv_error(true);
    opts.queue_err(icmp_error(EndpointError::ConnectionRefused, b"first"));
    opts.queue_err(icmp_error(EndpointError::HostUnreachable, b"second"));

    assert_eq!(opts.peek_err().unwrap().payload, b"first");
    assert_eq!(opts.dequeue_err().unwrap().payload, b"first");
    assert_eq!(opts.peek_err().unwrap().err, EndpointError::HostUnreachable);
    assert_eq!(opts.dequeue_err().unwrap().payload, b"second");
    assert!(opts.dequeue_err().is_none());
}

#[test]
fn linger_and_timeouts_round_trip() {
    let opts = SocketOptions::new(limits(), limits());
    let linger = LingerOption {
        enabled: true,
        timeout: Duration::from_secs(3),
    };
    opts.set_linger(linger);
    opts.set_send_timeout(Some(Duration::from_millis(250)));
    assert_eq!(opts.linger(), linger);
    assert_eq!(opts.send_timeout(), Some(Duration::from_millis(250)));
    assert_eq!(opts.receive_timeout(), None);
}

#[test]
fn packet_based_kinds() {
    assert!(!SocketKind::Stream.is_packet_based());
    assert!(SocketKind::Datagram.is_packet_based());
    assert!(SocketKind::SeqPacket.is_packet_based());
    assert!(SocketKind::Raw.is_packet_based());
}

#[test]
fn only_tcp_and_udp_have_an_initial_state() {
    assert!(EndpointState::Tcp(TcpState::Initial).is_initial());
    assert!(EndpointState::Udp(UdpState::Initial).is_initial());
    assert!(!EndpointState::Tcp(TcpState::Bound).is_initial());
    assert!(!EndpointState::Stateless.is_initial());
}
