//! The assembled stack: IP engine + TCP listener + timer service.
//!
//! Everything runs on the caller's single thread. The driver pushes received
//! frames through [`NetStack::handle_frame`], calls [`NetStack::on_tick`]
//! periodically so retransmission timers fire, and drains application-facing
//! notifications with [`NetStack::poll_event`].

use std::collections::VecDeque;
use std::net::Ipv4Addr;

use crate::error::StackError;
use crate::iface::ip::IpEngine;
use crate::iface::link::LinkLayer;
use crate::timer::{Clock, TimerService};
use crate::transport::{ConnKey, SocketEvent, TcpListener};

pub struct NetStack<L: LinkLayer> {
    ip: IpEngine<L>,
    tcp: TcpListener,
    timers: TimerService<ConnKey>,
    events: VecDeque<SocketEvent>,
}

impl<L: LinkLayer> NetStack<L> {
    /// Stack listening for TCP connections on `port`, using the system clock.
    pub fn new(link: L, port: u16) -> Self {
        NetStack {
            ip: IpEngine::new(link),
            tcp: TcpListener::new(port),
            timers: TimerService::new(),
            events: VecDeque::new(),
        }
    }

    /// Stack with an injected clock, for tests driving time by hand.
    pub fn with_clock(link: L, port: u16, clock: Box<dyn Clock>) -> Self {
        NetStack {
            ip: IpEngine::new(link),
            tcp: TcpListener::new(port),
            timers: TimerService::with_clock(clock),
            events: VecDeque::new(),
        }
    }

    pub fn set_local_addr(&mut self, addr: Ipv4Addr) {
        self.ip.set_local_addr(addr);
    }

    /// Replace the forwarding table from `("a.b.c.d/n", next_hop)` pairs.
    pub fn set_routes(&mut self, routes: &[(&str, Ipv4Addr)]) -> Result<(), StackError> {
        self.ip.set_routes(routes)
    }

    /// Feed one link-layer frame into the stack.
    pub fn handle_frame(&mut self, frame: &[u8]) {
        if let Some(delivery) = self.ip.handle_frame(frame) {
            self.tcp.on_segment(
                delivery.src,
                delivery.dst,
                &delivery.payload,
                &mut self.ip,
                &mut self.timers,
                &mut self.events,
            );
        }
    }

    /// Fire every retransmission timer whose deadline has passed.
    pub fn on_tick(&mut self) {
        for key in self.timers.pop_expired() {
            self.tcp.on_timer(key, &mut self.ip, &mut self.timers);
        }
    }

    /// Next application-facing notification, if any.
    pub fn poll_event(&mut self) -> Option<SocketEvent> {
        self.events.pop_front()
    }

    /// Queue bytes for delivery on an accepted connection. Returns false
    /// when the connection is unknown.
    pub fn send(&mut self, conn: ConnKey, data: &[u8]) -> bool {
        self.tcp.send_data(conn, data, &mut self.ip, &mut self.timers)
    }

    /// Begin a local close (send FIN). Returns false when the connection is
    /// unknown.
    pub fn close(&mut self, conn: ConnKey) -> bool {
        self.tcp.close_connection(conn, &mut self.ip)
    }

    pub fn connection_count(&self) -> usize {
        self.tcp.connection_count()
    }

    /// Read-only view of the listener and its connection table.
    pub fn tcp(&self) -> &TcpListener {
        &self.tcp
    }

    pub fn link(&self) -> &L {
        self.ip.link()
    }

    pub fn link_mut(&mut self) -> &mut L {
        self.ip.link_mut()
    }
}
