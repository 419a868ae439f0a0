//! Interface layer: link abstraction, forwarding, and the assembled stack.

pub mod interface;
pub mod ip;
pub mod link;
pub mod route;

pub use interface::NetStack;
pub use ip::IpEngine;
pub use link::{LinkLayer, QueueLink, TunLink};
pub use route::{ForwardingTable, RouteEntry};
