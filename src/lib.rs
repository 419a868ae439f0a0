//! A minimal, from-scratch TCP/IP stack.
//!
//! The IP layer acts as either a host endpoint or a longest-prefix-match
//! router with TTL handling and ICMP Time Exceeded signaling. The TCP layer
//! provides reliable, ordered byte streams with a sliding window, cumulative
//! acknowledgment, and adaptive (Jacobson/Karels) retransmission timing.
//!
//! The link layer below and the application above are collaborators: frames
//! come in through [`NetStack::handle_frame`], outbound datagrams leave
//! through a [`iface::link::LinkLayer`] implementation, and the application
//! drains [`SocketEvent`]s and calls `send`/`close` on connection keys.

pub mod error;
pub mod iface;
pub mod network;
pub mod timer;
pub mod transport;

// Re-export commonly used types
pub use error::StackError;
pub use iface::interface::NetStack;
pub use iface::link::{LinkLayer, QueueLink, TunLink};
pub use iface::route::{ForwardingTable, RouteEntry};
pub use network::ipv4::Ipv4Header;
pub use transport::{ConnKey, SocketEvent, TcpHeader, MSS};
