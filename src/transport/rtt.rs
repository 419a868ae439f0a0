//! Round-trip-time estimation (Jacobson/Karels).
//!
//! `estimated = (1-α)·estimated + α·sample` and
//! `dev = (1-β)·dev + β·|sample - estimated|` with α = 1/8, β = 1/4;
//! the retransmission timeout is `estimated + 4·dev`. The first sample seeds
//! the estimate directly with `dev = sample/2`. Samples must not be taken
//! for retransmitted segments (Karn's rule); the connection enforces that.

use std::time::Duration;

const ALPHA: f64 = 0.125;
const BETA: f64 = 0.25;

/// Timeout used before the first sample arrives.
const INITIAL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RttEstimator {
    estimated_rtt: Option<f64>,
    dev_rtt: f64,
    timeout: Duration,
}

impl RttEstimator {
    pub fn new() -> Self {
        RttEstimator {
            estimated_rtt: None,
            dev_rtt: 0.0,
            timeout: INITIAL_TIMEOUT,
        }
    }

    /// Fold one measured round trip into the estimate and recompute the
    /// timeout interval.
    pub fn record_sample(&mut self, sample: Duration) {
        let sample = sample.as_secs_f64();
        let (estimated, dev) = match self.estimated_rtt {
            None => (sample, sample / 2.0),
            Some(prev) => {
                let estimated = (1.0 - ALPHA) * prev + ALPHA * sample;
                let dev = (1.0 - BETA) * self.dev_rtt + BETA * (sample - estimated).abs();
                (estimated, dev)
            }
        };
        self.estimated_rtt = Some(estimated);
        self.dev_rtt = dev;
        self.timeout = Duration::from_secs_f64(estimated + 4.0 * dev);
    }

    /// Current retransmission timeout interval.
    pub fn timeout_interval(&self) -> Duration {
        self.timeout
    }

    /// Smoothed RTT in seconds, once at least one sample exists.
    pub fn estimated_rtt(&self) -> Option<f64> {
        self.estimated_rtt
    }

    /// RTT deviation in seconds.
    pub fn dev_rtt(&self) -> f64 {
        self.dev_rtt
    }
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new()
    }
}
