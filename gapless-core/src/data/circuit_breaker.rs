//! Circuit breaker guarding the upstream data provider.
//!
//! Tiingo enforces hourly and daily request budgets. After repeated 429s, or
//! an outright 403, the breaker opens and refuses all requests until a
//! cooldown expires (default 15 minutes).

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Inner {
    opened_at: Option<Instant>,
    strikes: u32,
}

/// Trip-after-consecutive-failures breaker with a fixed cooldown.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    trip_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, trip_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                opened_at: None,
                strikes: 0,
            }),
            cooldown,
            trip_threshold,
        }
    }

    /// Defaults tuned for Tiingo's free-tier budget: 15-minute cooldown,
    /// opens after 4 consecutive failures.
    pub fn tiingo_default() -> Self {
        Self::new(Duration::from_secs(15 * 60), 4)
    }

    /// True while requests are refused. Auto-resets once the cooldown expires.
    pub fn is_open(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.opened_at {
            None => false,
            Some(at) if at.elapsed() >= self.cooldown => {
                inner.opened_at = None;
                inner.strikes = 0;
                false
            }
            Some(_) => true,
        }
    }

    /// Record a successful request, clearing the strike count.
    pub fn note_success(&self) {
        self.inner.lock().unwrap().strikes = 0;
    }

    /// Record a failed request; opens the breaker at the threshold.
    pub fn note_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.strikes += 1;
        if inner.strikes >= self.trip_threshold {
            inner.opened_at = Some(Instant::now());
        }
    }

    /// Open immediately (403 Forbidden / hard block).
    pub fn force_open(&self) {
        self.inner.lock().unwrap().opened_at = Some(Instant::now());
    }

    /// Remaining cooldown, zero when closed.
    pub fn remaining(&self) -> Duration {
        let inner = self.inner.lock().unwrap();
        match inner.opened_at {
            None => Duration::ZERO,
            Some(at) => self.cooldown.saturating_sub(at.elapsed()),
        }
    }
}
