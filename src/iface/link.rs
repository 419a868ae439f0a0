//! Link-layer collaborators.
//!
//! The stack never touches a wire itself: it hands finished datagrams to a
//! [`LinkLayer`] together with the resolved next hop, and the driver feeds
//! received frames back in through `NetStack::handle_frame`.

use std::collections::VecDeque;
use std::net::Ipv4Addr;

use tun_tap::{Iface, Mode};

/// Where outbound datagrams go.
pub trait LinkLayer {
    /// Transmit one datagram toward `next_hop`. Link failures are not this
    /// layer's problem; retransmission recovers from loss.
    fn send(&mut self, frame: &[u8], next_hop: Ipv4Addr);

    /// When true, the transport layer skips TCP checksum verification.
    /// A test/debug facility, off by default.
    fn ignore_checksum(&self) -> bool {
        false
    }
}

/// A TUN device as the link layer.
///
/// TUN is point-to-point: the kernel picks the physical next hop from its own
/// routing, so the resolved next hop is not encoded into the frame.
pub struct TunLink {
    iface: Iface,
}

impl TunLink {
    pub fn open(name: &str) -> std::io::Result<Self> {
        let iface = Iface::without_packet_info(name, Mode::Tun)?;
        Ok(TunLink { iface })
    }

    pub fn name(&self) -> &str {
        self.iface.name()
    }

    /// Block until the next frame arrives; returns the number of bytes read.
    pub fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.iface.recv(buf)
    }
}

impl LinkLayer for TunLink {
    fn send(&mut self, frame: &[u8], _next_hop: Ipv4Addr) {
        if let Err(e) = self.iface.send(frame) {
            log::warn!("TUN send failed: {}", e);
        }
    }
}

/// In-memory link that records every transmitted frame. Used by the tests
/// and the simulated demo to observe what the stack puts on the wire.
#[derive(Debug, Default)]
pub struct QueueLink {
    sent: VecDeque<(Vec<u8>, Ipv4Addr)>,
    skip_checksum: bool,
}

impl QueueLink {
    pub fn new() -> Self {
        QueueLink::default()
    }

    /// A link whose peers don't bother with TCP checksums.
    pub fn without_checksums() -> Self {
        QueueLink {
            sent: VecDeque::new(),
            skip_checksum: true,
        }
    }

    /// Oldest transmitted frame and its next hop, if any.
    pub fn pop(&mut self) -> Option<(Vec<u8>, Ipv4Addr)> {
        self.sent.pop_front()
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

impl LinkLayer for QueueLink {
    fn send(&mut self, frame: &[u8], next_hop: Ipv4Addr) {
        self.sent.push_back((frame.to_vec(), next_hop));
    }

    fn ignore_checksum(&self) -> bool {
        self.skip_checksum
    }
}
