//! Echo server on a real TUN device. Needs root (or CAP_NET_ADMIN).
//!
//! Bring the interface up before connecting to it, e.g.:
//!
//! ```text
//! # cargo run --example tun_host
//! # ip addr add 10.0.0.2/24 dev tun0
//! # ip link set up dev tun0
//! $ nc 10.0.0.1 7000
//! ```
//!
//! The loop blocks on the device, so retransmission timers are only checked
//! when a frame arrives. Good enough against a live kernel peer, which acks
//! promptly and keeps the loop turning.

use std::net::Ipv4Addr;

use mini_tcpip::{NetStack, SocketEvent, TunLink};

const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const PORT: u16 = 7000;

fn main() -> std::io::Result<()> {
    env_logger::init();

    let link = TunLink::open("tun0")?;
    println!("listening on {}:{} via {}", LOCAL, PORT, link.name());

    let mut stack = NetStack::new(link, PORT);
    stack.set_local_addr(LOCAL);
    stack
        .set_routes(&[("10.0.0.0/24", Ipv4Addr::new(10, 0, 0, 2))])
        .expect("static route");

    let mut buf = [0u8; 2048];
    loop {
        let n = stack.link().recv(&mut buf)?;
        stack.handle_frame(&buf[..n]);

        while let Some(event) = stack.poll_event() {
            match event {
                SocketEvent::Accepted(key) => {
                    println!("accepted {}:{}", key.peer_addr, key.peer_port);
                }
                SocketEvent::Data(key, data) if data.is_empty() => {
                    println!("{}:{} closed", key.peer_addr, key.peer_port);
                }
                SocketEvent::Data(key, data) => {
                    stack.send(key, &data);
                }
            }
        }

        stack.on_tick();
    }
}
