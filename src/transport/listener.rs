//! Connection table and listener: demultiplexes inbound segments by 4-tuple.

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;

use rand::Rng;

use crate::iface::ip::IpEngine;
use crate::iface::link::LinkLayer;
use crate::network::ipv4::protocol;
use crate::timer::TimerService;
use crate::transport::connection::{Connection, Disposition};
use crate::transport::tcp::{self, flags, TcpHeader};
use crate::transport::{ConnKey, SocketEvent};

/// Listens on a single local port and owns every connection keyed by its
/// 4-tuple. Connections are only reachable through the table.
pub struct TcpListener {
    port: u16,
    connections: HashMap<ConnKey, Connection>,
}

impl TcpListener {
    pub fn new(port: u16) -> Self {
        TcpListener {
            port,
            connections: HashMap::new(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn connection(&self, key: &ConnKey) -> Option<&Connection> {
        self.connections.get(key)
    }

    /// Process one inbound segment delivered by the IP layer.
    ///
    /// A SYN always starts a new connection, even for a 4-tuple that already
    /// has one; the old state is replaced. A deliberate simplification of
    /// this stack, logged when it happens.
    pub fn on_segment<L: LinkLayer>(
        &mut self,
        src_addr: Ipv4Addr,
        dst_addr: Ipv4Addr,
        segment: &[u8],
        ip: &mut IpEngine<L>,
        timers: &mut TimerService<ConnKey>,
        events: &mut VecDeque<SocketEvent>,
    ) {
        let header = match TcpHeader::from_bytes(segment) {
            Ok(header) => header,
            Err(e) => {
                log::debug!("dropping segment from {}: {}", src_addr, e);
                return;
            }
        };

        if header.dst_port != self.port {
            log::debug!(
                "segment for port {} ignored (listening on {})",
                header.dst_port,
                self.port
            );
            return;
        }

        if !ip.ignore_checksum() && !tcp::verify_checksum(segment, src_addr, dst_addr) {
            log::debug!(
                "dropping segment from {}:{} with bad checksum",
                src_addr,
                header.src_port
            );
            return;
        }

        let payload = &segment[header.data_offset()..];
        let key = ConnKey {
            peer_addr: src_addr,
            peer_port: header.src_port,
            local_addr: dst_addr,
            local_port: header.dst_port,
        };

        if header.is_syn() {
            self.accept(key, header.seq_number, ip, timers, events);
            return;
        }

        match self.connections.get_mut(&key) {
            Some(conn) => {
                let disposition = conn.on_segment(
                    header.seq_number,
                    header.ack_number,
                    header.flag_bits(),
                    payload,
                    ip,
                    timers,
                    events,
                );
                if disposition == Disposition::Remove {
                    log::info!("connection {}:{} closed", src_addr, header.src_port);
                    self.connections.remove(&key);
                }
            }
            None => {
                log::debug!(
                    "segment for unknown connection {}:{} dropped",
                    src_addr,
                    header.src_port
                );
            }
        }
    }

    /// Answer a SYN with SYN+ACK and register the new connection.
    fn accept<L: LinkLayer>(
        &mut self,
        key: ConnKey,
        peer_seq: u32,
        ip: &mut IpEngine<L>,
        timers: &mut TimerService<ConnKey>,
        events: &mut VecDeque<SocketEvent>,
    ) {
        let isn: u32 = rand::thread_rng().gen_range(64..=0xffff);
        let ack_no = peer_seq.wrapping_add(1);

        let synack = tcp::build_segment(
            key.local_port,
            key.peer_port,
            isn,
            ack_no,
            flags::SYN | flags::ACK,
            &[],
            key.local_addr,
            key.peer_addr,
        );
        if let Err(e) = ip.send(&synack, key.peer_addr, protocol::TCP) {
            log::warn!("SYN+ACK to {} dropped: {}", key.peer_addr, e);
        }

        let conn = Connection::new(key, isn.wrapping_add(1), ack_no);
        if let Some(mut old) = self.connections.insert(key, conn) {
            log::warn!(
                "duplicate SYN from {}:{}; replacing existing connection state",
                key.peer_addr,
                key.peer_port
            );
            old.cancel_timer(timers);
        }
        events.push_back(SocketEvent::Accepted(key));
    }

    /// Fire the retransmission timeout for one connection.
    pub fn on_timer<L: LinkLayer>(
        &mut self,
        key: ConnKey,
        ip: &mut IpEngine<L>,
        timers: &mut TimerService<ConnKey>,
    ) {
        if let Some(conn) = self.connections.get_mut(&key) {
            conn.on_timeout(ip, timers);
        }
    }

    /// Queue and transmit application data on a connection. Returns false
    /// when the key is unknown.
    pub fn send_data<L: LinkLayer>(
        &mut self,
        key: ConnKey,
        data: &[u8],
        ip: &mut IpEngine<L>,
        timers: &mut TimerService<ConnKey>,
    ) -> bool {
        match self.connections.get_mut(&key) {
            Some(conn) => {
                conn.send(data, ip, timers);
                true
            }
            None => false,
        }
    }

    /// Start a local close on a connection. Returns false when the key is
    /// unknown.
    pub fn close_connection<L: LinkLayer>(&mut self, key: ConnKey, ip: &mut IpEngine<L>) -> bool {
        match self.connections.get_mut(&key) {
            Some(conn) => {
                conn.close(ip);
                true
            }
            None => false,
        }
    }
}
