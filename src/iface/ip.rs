//! IP engine: host-vs-router datagram handling and the outbound send path.

use std::net::Ipv4Addr;

use rand::Rng;

use crate::error::StackError;
use crate::iface::link::LinkLayer;
use crate::iface::route::{ForwardingTable, RouteEntry};
use crate::network::icmp;
use crate::network::ipv4::{protocol, Ipv4Header, DEFAULT_TTL, IPV4_HEADER_LEN};

/// A host-bound TCP payload handed up to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub payload: Vec<u8>,
}

/// Receives link-layer frames and either terminates them (host) or routes
/// them onward (router); builds outbound datagrams for the transport layer.
pub struct IpEngine<L: LinkLayer> {
    link: L,
    local_addr: Option<Ipv4Addr>,
    routes: ForwardingTable,
}

impl<L: LinkLayer> IpEngine<L> {
    pub fn new(link: L) -> Self {
        IpEngine {
            link,
            local_addr: None,
            routes: ForwardingTable::new(),
        }
    }

    /// Address this node answers for. Datagrams to any other destination are
    /// routed instead of delivered.
    pub fn set_local_addr(&mut self, addr: Ipv4Addr) {
        self.local_addr = Some(addr);
    }

    pub fn local_addr(&self) -> Option<Ipv4Addr> {
        self.local_addr
    }

    /// Replace the forwarding table from `(cidr, next_hop)` pairs.
    pub fn set_routes(&mut self, routes: &[(&str, Ipv4Addr)]) -> Result<(), StackError> {
        let entries = routes
            .iter()
            .map(|(cidr, hop)| RouteEntry::from_cidr(cidr, *hop))
            .collect::<Result<Vec<_>, _>>()?;
        self.routes.set_routes(entries);
        Ok(())
    }

    /// Whether the link layer allows skipping TCP checksum verification.
    pub fn ignore_checksum(&self) -> bool {
        self.link.ignore_checksum()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Process one frame from the link layer.
    ///
    /// Returns a [`Delivery`] when the frame is a TCP datagram addressed to
    /// the local address; everything else is routed, answered with ICMP, or
    /// dropped internally.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Option<Delivery> {
        let header = match Ipv4Header::from_bytes(frame) {
            Ok(header) => header,
            Err(e) => {
                log::debug!("dropping frame: {}", e);
                return None;
            }
        };

        if self.local_addr == Some(header.dst_addr) {
            if header.protocol == protocol::TCP {
                return Some(Delivery {
                    src: header.src_addr,
                    dst: header.dst_addr,
                    payload: frame[header.header_len()..].to_vec(),
                });
            }
            log::debug!(
                "dropping host-bound datagram with protocol {}",
                header.protocol
            );
            return None;
        }

        self.forward(header, frame);
        None
    }

    /// Route a transit datagram: decrement TTL, rewrite the header, and hand
    /// it to the next hop. An exhausted TTL is answered with ICMP Time
    /// Exceeded toward the source; an unresolvable destination is dropped.
    fn forward(&mut self, mut header: Ipv4Header, frame: &[u8]) {
        let ttl = header.ttl.saturating_sub(1);
        if ttl == 0 {
            log::debug!(
                "TTL exceeded routing {} -> {}, answering with ICMP",
                header.src_addr,
                header.dst_addr
            );
            let message = icmp::build_time_exceeded(frame);
            // Routed toward the original source; no route back is a silent
            // drop (only the send path reports NoRoute to a caller).
            if let Err(e) = self.send(&message, header.src_addr, protocol::ICMP) {
                log::debug!("cannot return ICMP Time Exceeded: {}", e);
            }
            return;
        }

        let Some(next_hop) = self.routes.resolve(header.dst_addr) else {
            log::debug!("no route to {}, dropping", header.dst_addr);
            return;
        };

        // Re-emit with a plain 20-byte header; any options are not carried.
        let payload = &frame[header.header_len()..];
        header.ihl = 5;
        header.total_len = (IPV4_HEADER_LEN + payload.len()) as u16;
        header.ttl = ttl;
        header.fill_checksum();

        let mut datagram = Vec::with_capacity(IPV4_HEADER_LEN + payload.len());
        datagram.extend_from_slice(&header.to_bytes());
        datagram.extend_from_slice(payload);
        self.link.send(&datagram, next_hop);
    }

    /// Build and transmit a locally originated datagram.
    ///
    /// Fails with [`StackError::NoRoute`] when the destination does not
    /// resolve; the send never silently succeeds.
    pub fn send(
        &mut self,
        payload: &[u8],
        dst_addr: Ipv4Addr,
        protocol: u8,
    ) -> Result<(), StackError> {
        // An unconfigured node can originate nothing.
        let src_addr = self.local_addr.ok_or(StackError::NoRoute(dst_addr))?;
        let next_hop = self
            .routes
            .resolve(dst_addr)
            .ok_or(StackError::NoRoute(dst_addr))?;

        let id: u16 = rand::thread_rng().gen();
        let mut header = Ipv4Header::new(
            id,
            DEFAULT_TTL,
            protocol,
            src_addr,
            dst_addr,
            payload.len() as u16,
        );
        header.fill_checksum();

        let mut datagram = Vec::with_capacity(IPV4_HEADER_LEN + payload.len());
        datagram.extend_from_slice(&header.to_bytes());
        datagram.extend_from_slice(payload);
        self.link.send(&datagram, next_hop);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iface::link::QueueLink;

    fn engine() -> IpEngine<QueueLink> {
        let mut ip = IpEngine::new(QueueLink::new());
        ip.set_local_addr(Ipv4Addr::new(10, 0, 0, 1));
        ip.set_routes(&[("10.0.0.0/24", Ipv4Addr::new(10, 0, 0, 2))])
            .unwrap();
        ip
    }

    #[test]
    fn send_without_route_fails() {
        let mut ip = engine();
        let dst = Ipv4Addr::new(192, 168, 1, 1);
        assert_eq!(
            ip.send(b"payload", dst, protocol::TCP),
            Err(StackError::NoRoute(dst))
        );
        assert!(ip.link().is_empty());
    }

    #[test]
    fn send_builds_valid_datagram() {
        let mut ip = engine();
        let dst = Ipv4Addr::new(10, 0, 0, 9);
        ip.send(b"abc", dst, protocol::TCP).unwrap();

        let (frame, next_hop) = ip.link_mut().pop().unwrap();
        assert_eq!(next_hop, Ipv4Addr::new(10, 0, 0, 2));
        let header = Ipv4Header::from_bytes(&frame).unwrap();
        assert_eq!(header.ttl, DEFAULT_TTL);
        assert_eq!(header.protocol, protocol::TCP);
        assert_eq!(header.src_addr, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(header.dst_addr, dst);
        assert_eq!(header.total_len as usize, IPV4_HEADER_LEN + 3);
        assert!(header.verify_checksum());
        assert_eq!(&frame[IPV4_HEADER_LEN..], b"abc");
    }

    #[test]
    fn host_bound_tcp_is_delivered() {
        let mut ip = engine();
        let mut header = Ipv4Header::new(
            1,
            DEFAULT_TTL,
            protocol::TCP,
            Ipv4Addr::new(10, 0, 0, 9),
            Ipv4Addr::new(10, 0, 0, 1),
            4,
        );
        header.fill_checksum();
        let mut frame = header.to_bytes().to_vec();
        frame.extend_from_slice(b"data");

        let delivery = ip.handle_frame(&frame).unwrap();
        assert_eq!(delivery.src, Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(delivery.payload, b"data");
    }

    #[test]
    fn host_bound_non_tcp_is_dropped() {
        let mut ip = engine();
        let mut header = Ipv4Header::new(
            1,
            DEFAULT_TTL,
            protocol::ICMP,
            Ipv4Addr::new(10, 0, 0, 9),
            Ipv4Addr::new(10, 0, 0, 1),
            0,
        );
        header.fill_checksum();
        assert!(ip.handle_frame(&header.to_bytes()).is_none());
        assert!(ip.link().is_empty());
    }
}
