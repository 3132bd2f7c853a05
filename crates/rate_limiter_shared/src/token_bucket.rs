//! In-process token bucket for the responder.
//!
//! `capacity` permits are made available at the start of every refill interval. Intervals are
//! anchored at construction time. Leftover permits are dropped at each refill, so the bucket
//! never holds more than one interval's worth.

use std::sync::{Mutex, PoisonError};

use crate::clock::{Clock, SystemClock};
use crate::internal_event::{InternalEvent, PermitDecided};
use crate::settings::{SettingsError, TokenBucketSettings};

#[derive(Debug)]
struct BucketState {
    available: u32,
    interval_start_millis: u64,
}

#[derive(Debug)]
pub struct LocalTokenLimiter<C = SystemClock> {
    capacity: u32,
    refill_interval_ms: u64,
    state: Mutex<BucketState>,
    clock: C,
}

impl LocalTokenLimiter<SystemClock> {
    pub fn new(settings: TokenBucketSettings) -> Result<Self, SettingsError> {
        Self::with_clock(settings, SystemClock)
    }
}

impl<C: Clock> LocalTokenLimiter<C> {
    pub fn with_clock(settings: TokenBucketSettings, clock: C) -> Result<Self, SettingsError> {
        settings.validate()?;
        let now = clock.now_millis();
        Ok(Self {
            capacity: settings.capacity,
            refill_interval_ms: settings.refill_interval_ms,
            state: Mutex::new(BucketState {
                available: settings.capacity,
                interval_start_millis: now,
            }),
            clock,
        })
    }

    /// Takes one permit if any is left in the current interval.
    ///
    /// A denial consumes nothing.
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now_millis();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state, now);

        let granted = state.available > 0;
        if granted {
            state.available -= 1;
        }

        PermitDecided {
            granted,
            available: state.available,
        }
        .emit();
        granted
    }

    /// Permits left in the current interval.
    pub fn available(&self) -> u32 {
        let now = self.clock.now_millis();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state, now);
        state.available
    }

    fn refill(&self, state: &mut BucketState, now: u64) {
        // A clock stepping backwards keeps the current interval.
        let elapsed = now.saturating_sub(state.interval_start_millis);
        if elapsed >= self.refill_interval_ms {
            let intervals = elapsed / self.refill_interval_ms;
            state.interval_start_millis += intervals * self.refill_interval_ms;
            state.available = self.capacity;
        }
    }
}
