//! IP-layer integration: routing, TTL handling, and ICMP Time Exceeded.

use std::net::Ipv4Addr;

use mini_tcpip::iface::ip::IpEngine;
use mini_tcpip::network::icmp::IcmpHeader;
use mini_tcpip::network::ipv4::{protocol, IPV4_HEADER_LEN};
use mini_tcpip::network::{checksum, Ipv4Header};
use mini_tcpip::{QueueLink, StackError};

const ROUTER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const SENDER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 9);
const FAR_HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 5);

const HOP_FAR: Ipv4Addr = Ipv4Addr::new(172, 16, 0, 1);
const HOP_WIDE: Ipv4Addr = Ipv4Addr::new(172, 16, 0, 2);
const HOP_BACK: Ipv4Addr = Ipv4Addr::new(172, 16, 0, 3);

fn router() -> IpEngine<QueueLink> {
    let mut ip = IpEngine::new(QueueLink::new());
    ip.set_local_addr(ROUTER);
    ip.set_routes(&[
        ("192.168.1.0/24", HOP_FAR),
        ("192.168.0.0/16", HOP_WIDE),
        ("10.0.0.0/24", HOP_BACK),
    ])
    .unwrap();
    ip
}

fn datagram(src: Ipv4Addr, dst: Ipv4Addr, ttl: u8, proto: u8, payload: &[u8]) -> Vec<u8> {
    let mut header = Ipv4Header::new(0x4242, ttl, proto, src, dst, payload.len() as u16);
    header.fill_checksum();
    let mut frame = header.to_bytes().to_vec();
    frame.extend_from_slice(payload);
    frame
}

#[test]
fn transit_datagram_is_forwarded_with_decremented_ttl() {
    let mut ip = router();
    let frame = datagram(SENDER, FAR_HOST, 64, protocol::TCP, b"abcd");

    assert!(ip.handle_frame(&frame).is_none());

    let (forwarded, next_hop) = ip.link_mut().pop().unwrap();
    // /24 beats /16 for 192.168.1.x.
    assert_eq!(next_hop, HOP_FAR);
    let header = Ipv4Header::from_bytes(&forwarded).unwrap();
    assert_eq!(header.ttl, 63);
    assert_eq!(header.src_addr, SENDER);
    assert_eq!(header.dst_addr, FAR_HOST);
    assert!(header.verify_checksum());
    assert_eq!(&forwarded[IPV4_HEADER_LEN..], b"abcd");
    assert!(ip.link().is_empty());
}

#[test]
fn less_specific_prefix_catches_the_rest() {
    let mut ip = router();
    let frame = datagram(SENDER, Ipv4Addr::new(192, 168, 7, 7), 64, protocol::TCP, b"");
    ip.handle_frame(&frame);
    let (_, next_hop) = ip.link_mut().pop().unwrap();
    assert_eq!(next_hop, HOP_WIDE);
}

#[test]
fn ttl_exhaustion_answers_with_time_exceeded() {
    let mut ip = router();
    let original = datagram(SENDER, FAR_HOST, 1, protocol::TCP, &[0xaa; 40]);

    assert!(ip.handle_frame(&original).is_none());

    // The datagram is never forwarded; one ICMP reply goes back instead.
    let (reply, next_hop) = ip.link_mut().pop().unwrap();
    assert!(ip.link().is_empty());
    assert_eq!(next_hop, HOP_BACK);

    let header = Ipv4Header::from_bytes(&reply).unwrap();
    assert_eq!(header.protocol, protocol::ICMP);
    assert_eq!(header.src_addr, ROUTER);
    assert_eq!(header.dst_addr, SENDER);
    assert!(header.verify_checksum());

    let message = &reply[header.header_len()..];
    let icmp = IcmpHeader::from_bytes(message).unwrap();
    assert_eq!(icmp.msg_type, 11);
    assert_eq!(icmp.msg_code, 0);
    assert_eq!(icmp.rest, [0; 4]);
    // Quotes the first 28 bytes of the unmodified original datagram.
    assert_eq!(&message[8..], &original[..28]);
    assert_eq!(checksum(message), 0);
}

#[test]
fn time_exceeded_without_return_route_is_dropped() {
    let mut ip = IpEngine::new(QueueLink::new());
    ip.set_local_addr(ROUTER);
    ip.set_routes(&[("192.168.1.0/24", HOP_FAR)]).unwrap();

    let frame = datagram(SENDER, FAR_HOST, 1, protocol::TCP, b"abcd");
    assert!(ip.handle_frame(&frame).is_none());
    assert!(ip.link().is_empty());
}

#[test]
fn unroutable_transit_datagram_is_dropped() {
    let mut ip = router();
    let frame = datagram(SENDER, Ipv4Addr::new(8, 8, 8, 8), 64, protocol::TCP, b"abcd");
    assert!(ip.handle_frame(&frame).is_none());
    assert!(ip.link().is_empty());
}

#[test]
fn malformed_frames_are_dropped_quietly() {
    let mut ip = router();
    assert!(ip.handle_frame(&[]).is_none());
    assert!(ip.handle_frame(&[0x45; 10]).is_none());
    // Version 6 in the version nibble.
    let mut frame = datagram(SENDER, FAR_HOST, 64, protocol::TCP, b"");
    frame[0] = 0x65;
    assert!(ip.handle_frame(&frame).is_none());
    assert!(ip.link().is_empty());
}

#[test]
fn send_path_reports_no_route() {
    let mut ip = router();
    let dst = Ipv4Addr::new(8, 8, 8, 8);
    assert_eq!(
        ip.send(b"payload", dst, protocol::TCP),
        Err(StackError::NoRoute(dst))
    );
}

#[test]
fn host_bound_tcp_reaches_the_transport_layer() {
    let mut ip = router();
    let frame = datagram(SENDER, ROUTER, 64, protocol::TCP, b"segment-bytes");
    let delivery = ip.handle_frame(&frame).unwrap();
    assert_eq!(delivery.src, SENDER);
    assert_eq!(delivery.dst, ROUTER);
    assert_eq!(delivery.payload, b"segment-bytes");
    // Nothing was forwarded.
    assert!(ip.link().is_empty());
}
