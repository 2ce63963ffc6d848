use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::MarketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Trips after `threshold` consecutive upstream rate-limit responses and
/// blocks calls for `open_for`; then lets a single probe through.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    open_for: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, open_for: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            open_for,
            state: Mutex::new(BreakerState::default()),
        }
    }

    pub fn state(&self) -> CircuitState {
        let st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match st.opened_at {
            None => CircuitState::Closed,
            Some(at) if at.elapsed() < self.open_for => CircuitState::Open,
            Some(_) => CircuitState::HalfOpen,
        }
    }

    /// Ask permission to call upstream.
    pub fn try_acquire(&self) -> Result<(), MarketError> {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(opened_at) = st.opened_at else {
            return Ok(());
        };
        if opened_at.elapsed() < self.open_for || st.probe_in_flight {
            return Err(MarketError::CircuitOpen);
        }
        st.probe_in_flight = true;
        info!("circuit half-open; letting one probe through");
        Ok(())
    }

    pub fn record_success(&self) {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if st.opened_at.is_some() {
            info!("circuit closed after successful probe");
        }
        *st = BreakerState::default();
    }

    pub fn record_rate_limited(&self) {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.consecutive_failures += 1;
        if st.probe_in_flight || st.consecutive_failures >= self.threshold {
            if st.opened_at.is_none() || st.probe_in_flight {
                warn!(
                    failures = st.consecutive_failures,
                    open_secs = self.open_for.as_secs(),
                    "upstream rate limit; circuit opened"
                );
            }
            st.opened_at = Some(Instant::now());
            st.probe_in_flight = false;
        }
    }

    /// A failure that says nothing about upstream throttling.
    pub fn record_other_failure(&self) {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.probe_in_flight = false;
    }
}
