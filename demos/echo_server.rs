//! Echo server over an in-memory link, driven by a scripted client.
//!
//! Runs the whole stack without a network: the "client" side is hand-built
//! segments pushed through `handle_frame`, and the stack's replies are read
//! back off the queue link. Run with `RUST_LOG=debug` to watch the exchange.

use std::net::Ipv4Addr;

use mini_tcpip::network::ipv4::{protocol, Ipv4Header};
use mini_tcpip::transport::tcp::{self, flags};
use mini_tcpip::{NetStack, QueueLink, SocketEvent, TcpHeader};

const SERVER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const CLIENT: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
const PORT: u16 = 7000;
const CLIENT_PORT: u16 = 33000;

fn client_frame(seq: u32, ack: u32, flag_bits: u16, payload: &[u8]) -> Vec<u8> {
    let segment = tcp::build_segment(
        CLIENT_PORT,
        PORT,
        seq,
        ack,
        flag_bits,
        payload,
        CLIENT,
        SERVER,
    );
    let mut header = Ipv4Header::new(1, 64, protocol::TCP, CLIENT, SERVER, segment.len() as u16);
    header.fill_checksum();
    let mut frame = header.to_bytes().to_vec();
    frame.extend_from_slice(&segment);
    frame
}

fn drain_wire(stack: &mut NetStack<QueueLink>, label: &str) {
    while let Some((frame, next_hop)) = stack.link_mut().pop() {
        let ip = Ipv4Header::from_bytes(&frame).unwrap();
        let header = TcpHeader::from_bytes(&frame[ip.header_len()..]).unwrap();
        let payload_len = frame.len() - ip.header_len() - header.data_offset();
        println!(
            "{}: seq={} ack={} flags={:#05x} payload={}B via {}",
            label,
            header.seq_number,
            header.ack_number,
            header.flag_bits(),
            payload_len,
            next_hop
        );
    }
}

fn main() {
    env_logger::init();

    let mut stack = NetStack::new(QueueLink::new(), PORT);
    stack.set_local_addr(SERVER);
    stack
        .set_routes(&[("10.0.0.0/24", CLIENT)])
        .expect("static route");

    // Handshake.
    stack.handle_frame(&client_frame(1000, 0, flags::SYN, &[]));
    drain_wire(&mut stack, "server -> client");

    let key = match stack.poll_event() {
        Some(SocketEvent::Accepted(key)) => key,
        other => panic!("expected an accepted connection, got {:?}", other),
    };
    println!("accepted {}:{}", key.peer_addr, key.peer_port);

    // The client sends two lines; the server echoes each one back.
    let mut seq = 1001u32;
    for line in [&b"hello, stack\n"[..], &b"echo this too\n"[..]] {
        stack.handle_frame(&client_frame(seq, 0, flags::ACK, line));
        seq += line.len() as u32;

        while let Some(event) = stack.poll_event() {
            if let SocketEvent::Data(key, data) = event {
                println!("received {:?}", String::from_utf8_lossy(&data));
                stack.send(key, &data);
            }
        }
        drain_wire(&mut stack, "server -> client");
    }

    // Client closes; the server answers FIN+ACK and the final ACK removes
    // the connection.
    stack.handle_frame(&client_frame(seq, 0, flags::FIN, &[]));
    drain_wire(&mut stack, "server -> client");
    stack.handle_frame(&client_frame(seq + 1, 0, flags::ACK, &[]));
    println!("open connections: {}", stack.connection_count());
}
