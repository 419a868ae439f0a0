//! Transport layer: TCP segment codec, listener, and connection machinery.

pub mod connection;
pub mod listener;
pub mod rtt;
pub mod tcp;

use std::net::Ipv4Addr;

pub use connection::Connection;
pub use listener::TcpListener;
pub use rtt::RttEstimator;
pub use tcp::{TcpHeader, MSS};

/// The 4-tuple identifying one connection, seen from the inbound segment's
/// perspective: the peer is the segment's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnKey {
    pub peer_addr: Ipv4Addr,
    pub peer_port: u16,
    pub local_addr: Ipv4Addr,
    pub local_port: u16,
}

/// What the stack reports to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A handshake was answered and the connection registered.
    Accepted(ConnKey),
    /// In-order payload bytes. An empty buffer signals peer-initiated close
    /// (end of stream).
    Data(ConnKey, Vec<u8>),
}
