//! Per-connection reliable-delivery engine.
//!
//! A [`Connection`] is created by the listener once it has answered a SYN, so
//! its initial state is already ESTABLISHED. From there it tracks sequence
//! and acknowledgment numbers, runs the sliding window over deque-backed
//! unsent/unacknowledged buffers, retransmits on timeout, and walks the
//! simplified teardown (peer FIN -> FIN+ACK -> final ACK removes it).
//!
//! Only segments arriving with exactly the expected sequence number are
//! processed; anything else is ignored. There is no out-of-order buffering
//! and no duplicate-ACK fast retransmit.

use std::collections::VecDeque;
use std::time::Instant;

use crate::iface::ip::IpEngine;
use crate::iface::link::LinkLayer;
use crate::network::ipv4::protocol;
use crate::timer::{TimerId, TimerService};
use crate::transport::rtt::RttEstimator;
use crate::transport::tcp::{self, flags, MSS};
use crate::transport::{ConnKey, SocketEvent};

/// What the listener should do with the connection after a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Keep,
    Remove,
}

pub struct Connection {
    key: ConnKey,
    /// Next sequence number for fresh data.
    seq_no: u32,
    /// Next byte expected from the peer; echoed as the cumulative ACK.
    ack_no: u32,
    /// Highest byte the peer has acknowledged.
    send_base: u32,
    /// One past the last sequence number of the current burst.
    burst_end: Option<u32>,
    /// Queued by the application, not yet transmitted.
    unsent: VecDeque<u8>,
    /// Transmitted but not yet acknowledged, in send order.
    unacked: VecDeque<u8>,
    /// Congestion window in MSS units.
    window: u32,
    timer: Option<TimerId>,
    rtt: RttEstimator,
    /// When the oldest outstanding burst was sent; basis for RTT samples.
    burst_started_at: Option<Instant>,
    retransmitting: bool,
    closing: bool,
}

impl Connection {
    /// `seq_no` is the ISN + 1 (the SYN consumed one number); `ack_no` is
    /// the peer's ISN + 1.
    pub fn new(key: ConnKey, seq_no: u32, ack_no: u32) -> Self {
        Connection {
            key,
            seq_no,
            ack_no,
            send_base: seq_no,
            burst_end: None,
            unsent: VecDeque::new(),
            unacked: VecDeque::new(),
            window: 1,
            timer: None,
            rtt: RttEstimator::new(),
            burst_started_at: None,
            retransmitting: false,
            closing: false,
        }
    }

    pub fn key(&self) -> ConnKey {
        self.key
    }

    /// Congestion window in MSS units.
    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn bytes_in_flight(&self) -> usize {
        self.unacked.len()
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Process one in-order segment for this connection.
    pub fn on_segment<L: LinkLayer>(
        &mut self,
        seq_number: u32,
        ack_number: u32,
        flag_bits: u16,
        payload: &[u8],
        ip: &mut IpEngine<L>,
        timers: &mut TimerService<ConnKey>,
        events: &mut VecDeque<SocketEvent>,
    ) -> Disposition {
        if seq_number != self.ack_no {
            log::debug!(
                "ignoring segment with seq {} (expected {})",
                seq_number,
                self.ack_no
            );
            return Disposition::Keep;
        }

        let is_ack = flag_bits & flags::ACK != 0;
        let is_fin = flag_bits & flags::FIN != 0;

        // Peer starts the teardown: signal end-of-stream upward, consume the
        // FIN's sequence number, answer FIN+ACK, and wait for the final ACK.
        if is_fin && !self.closing {
            self.closing = true;
            events.push_back(SocketEvent::Data(self.key, Vec::new()));
            self.ack_no = self.ack_no.wrapping_add(1);
            self.send_control(flags::FIN | flags::ACK, ip);
            return Disposition::Keep;
        }

        // Final ACK of the teardown.
        if is_ack && self.closing {
            self.cancel_timer(timers);
            return Disposition::Remove;
        }

        if is_ack && ack_number > self.send_base {
            let confirmed = (ack_number - self.send_base) as usize;
            self.unacked.drain(..confirmed.min(self.unacked.len()));
            self.send_base = ack_number;
            if self.unacked.is_empty() {
                self.cancel_timer(timers);
                if !self.retransmitting {
                    if let Some(started) = self.burst_started_at.take() {
                        self.rtt.record_sample(timers.now() - started);
                    }
                }
            } else {
                self.timer = Some(timers.schedule(self.key, self.rtt.timeout_interval()));
            }
        }

        // The whole burst is acknowledged: open the window one MSS unit and
        // push out more of the backlog.
        if self.burst_end == Some(ack_number) {
            self.window += 1;
            self.flush_pending(ip, timers);
        }

        self.retransmitting = false;
        self.ack_no = self.ack_no.wrapping_add(payload.len() as u32);

        if !payload.is_empty() {
            self.send_control(flags::ACK, ip);
            events.push_back(SocketEvent::Data(self.key, payload.to_vec()));
        }

        Disposition::Keep
    }

    /// Queue application data and transmit up to a window's worth of it as
    /// MSS-sized segments.
    pub fn send<L: LinkLayer>(
        &mut self,
        data: &[u8],
        ip: &mut IpEngine<L>,
        timers: &mut TimerService<ConnKey>,
    ) {
        self.unsent.extend(data.iter().copied());
        let ready = (self.window as usize * MSS).min(self.unsent.len());
        if ready == 0 {
            return;
        }
        self.transmit_burst(ready, ip, timers);
    }

    /// Move more unsent bytes in flight while the window has room.
    pub fn flush_pending<L: LinkLayer>(
        &mut self,
        ip: &mut IpEngine<L>,
        timers: &mut TimerService<ConnKey>,
    ) {
        let capacity = self.window as usize * MSS;
        if self.unacked.len() >= capacity {
            return;
        }
        let room = capacity - self.unacked.len();
        let take = room.min(self.unsent.len());
        if take == 0 {
            return;
        }
        self.transmit_burst(take, ip, timers);
    }

    /// Send a FIN to the peer.
    ///
    /// Sent immediately, even with unacknowledged data still in flight; a
    /// stricter implementation would drain the send buffers first.
    pub fn close<L: LinkLayer>(&mut self, ip: &mut IpEngine<L>) {
        self.send_control(flags::FIN, ip);
    }

    /// Retransmission timeout: halve the window (floor one MSS unit), resend
    /// the oldest at-most-MSS unacknowledged bytes, and rearm the timer.
    pub fn on_timeout<L: LinkLayer>(
        &mut self,
        ip: &mut IpEngine<L>,
        timers: &mut TimerService<ConnKey>,
    ) {
        self.timer = None;
        self.retransmitting = true;
        self.window = (self.window / 2).max(1);

        let len = MSS.min(self.unacked.len());
        if len > 0 {
            let oldest: Vec<u8> = self.unacked.iter().take(len).copied().collect();
            self.transmit(&oldest, ip, timers);
        }
        self.timer = Some(timers.schedule(self.key, self.rtt.timeout_interval()));
    }

    pub(crate) fn cancel_timer(&mut self, timers: &mut TimerService<ConnKey>) {
        if let Some(id) = self.timer.take() {
            timers.cancel(id);
        }
    }

    fn transmit_burst<L: LinkLayer>(
        &mut self,
        len: usize,
        ip: &mut IpEngine<L>,
        timers: &mut TimerService<ConnKey>,
    ) {
        let burst: Vec<u8> = self.unsent.drain(..len).collect();
        self.burst_end = Some(self.seq_no.wrapping_add(burst.len() as u32));
        for chunk in burst.chunks(MSS) {
            self.transmit(chunk, ip, timers);
        }
    }

    /// Send one data segment with a piggy-backed ACK. A fresh transmission
    /// consumes sequence space and joins the unacknowledged buffer; a
    /// retransmission reuses the oldest outstanding sequence number.
    fn transmit<L: LinkLayer>(
        &mut self,
        payload: &[u8],
        ip: &mut IpEngine<L>,
        timers: &mut TimerService<ConnKey>,
    ) {
        let seq_number = if self.retransmitting {
            self.send_base
        } else {
            let seq = self.seq_no;
            self.seq_no = self.seq_no.wrapping_add(payload.len() as u32);
            self.unacked.extend(payload.iter().copied());
            seq
        };

        let segment = tcp::build_segment(
            self.key.local_port,
            self.key.peer_port,
            seq_number,
            self.ack_no,
            flags::ACK,
            payload,
            self.key.local_addr,
            self.key.peer_addr,
        );
        if let Err(e) = ip.send(&segment, self.key.peer_addr, protocol::TCP) {
            log::warn!("segment to {} dropped: {}", self.key.peer_addr, e);
        }

        if self.timer.is_none() {
            self.burst_started_at = Some(timers.now());
            self.timer = Some(timers.schedule(self.key, self.rtt.timeout_interval()));
        }
    }

    /// Send a header-only segment with the given flags.
    fn send_control<L: LinkLayer>(&mut self, flag_bits: u16, ip: &mut IpEngine<L>) {
        let segment = tcp::build_segment(
            self.key.local_port,
            self.key.peer_port,
            self.seq_no,
            self.ack_no,
            flag_bits,
            &[],
            self.key.local_addr,
            self.key.peer_addr,
        );
        if let Err(e) = ip.send(&segment, self.key.peer_addr, protocol::TCP) {
            log::warn!("control segment to {} dropped: {}", self.key.peer_addr, e);
        }
    }
}
