//! Retransmission timer service.
//!
//! The stack runs on a single cooperative loop, so timers are not background
//! tasks: the event loop calls [`TimerService::pop_expired`] and fires the
//! returned keys itself. The clock is injected so the retransmission path can
//! be tested with a simulated clock instead of sleeps.
//!
//! At most one timer is outstanding per key: scheduling a new timer for a key
//! implicitly cancels the previous one, and [`TimerService::cancel`] is
//! idempotent even if the timer already fired.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for tests. Clones share the same underlying time.
#[derive(Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Identifies one scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(u64);

struct TimerEntry<K> {
    id: TimerId,
    key: K,
    deadline: Instant,
}

/// Schedules at most one pending timer per key.
pub struct TimerService<K> {
    clock: Box<dyn Clock>,
    next_id: u64,
    entries: Vec<TimerEntry<K>>,
}

impl<K: PartialEq + Copy> TimerService<K> {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        TimerService {
            clock,
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Schedule a timer for `key`, replacing any timer already pending for it.
    pub fn schedule(&mut self, key: K, interval: Duration) -> TimerId {
        self.entries.retain(|e| e.key != key);
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.entries.push(TimerEntry {
            id,
            key,
            deadline: self.clock.now() + interval,
        });
        id
    }

    /// Cancel a pending timer. Safe to call after the timer has fired.
    pub fn cancel(&mut self, id: TimerId) {
        self.entries.retain(|e| e.id != id);
    }

    /// Remove and return the keys of all timers whose deadline has passed.
    pub fn pop_expired(&mut self) -> Vec<K> {
        let now = self.clock.now();
        let mut fired = Vec::new();
        self.entries.retain(|e| {
            if e.deadline <= now {
                fired.push(e.key);
                false
            } else {
                true
            }
        });
        fired
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }
}

impl<K: PartialEq + Copy> Default for TimerService<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(clock: &ManualClock) -> TimerService<u32> {
        TimerService::with_clock(Box::new(clock.clone()))
    }

    #[test]
    fn fires_after_deadline() {
        let clock = ManualClock::new();
        let mut timers = service(&clock);
        timers.schedule(1, Duration::from_millis(100));

        assert!(timers.pop_expired().is_empty());
        clock.advance(Duration::from_millis(150));
        assert_eq!(timers.pop_expired(), vec![1]);
        // One-shot: it does not fire again.
        assert!(timers.pop_expired().is_empty());
    }

    #[test]
    fn reschedule_replaces_pending_timer() {
        let clock = ManualClock::new();
        let mut timers = service(&clock);
        timers.schedule(7, Duration::from_millis(100));
        timers.schedule(7, Duration::from_millis(300));
        assert_eq!(timers.pending(), 1);

        clock.advance(Duration::from_millis(150));
        assert!(timers.pop_expired().is_empty());
        clock.advance(Duration::from_millis(200));
        assert_eq!(timers.pop_expired(), vec![7]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let clock = ManualClock::new();
        let mut timers = service(&clock);
        let id = timers.schedule(3, Duration::from_millis(50));
        timers.cancel(id);
        timers.cancel(id);
        clock.advance(Duration::from_secs(1));
        assert!(timers.pop_expired().is_empty());
    }

    #[test]
    fn cancel_after_fire_is_safe() {
        let clock = ManualClock::new();
        let mut timers = service(&clock);
        let id = timers.schedule(3, Duration::from_millis(50));
        clock.advance(Duration::from_millis(60));
        assert_eq!(timers.pop_expired(), vec![3]);
        timers.cancel(id);
    }

    #[test]
    fn independent_keys_fire_independently() {
        let clock = ManualClock::new();
        let mut timers = service(&clock);
        timers.schedule(1, Duration::from_millis(50));
        timers.schedule(2, Duration::from_millis(500));

        clock.advance(Duration::from_millis(100));
        assert_eq!(timers.pop_expired(), vec![1]);
        clock.advance(Duration::from_millis(500));
        assert_eq!(timers.pop_expired(), vec![2]);
    }
}
