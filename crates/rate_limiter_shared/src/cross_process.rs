//! Fixed-window admission shared across processes.
//!
//! Each attempt runs one read-modify-write of the record under the store's exclusive lock:
//!
//! 1. `window_start = now - now % window_length`
//! 2. If the persisted window is older, reset it to `(window_start, 0)`.
//! 3. If `count < max`, increment and persist; otherwise deny and write nothing.
//!
//! Staleness is detected lazily on the next attempt, so no sweeper is needed. Two processes
//! racing at a boundary cannot both reset: the reset happens inside the same critical
//! section as the read.

use crate::clock::{Clock, SystemClock};
use crate::internal_event::{AdmissionDecided, InternalEvent};
use crate::settings::{SettingsError, WindowSettings};
use crate::shared_counter::{SharedCounterError, SharedCounterStore, WindowState};

/// Policy outcome of an attempt that got the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The slot was taken; `count` is the window's total including this one.
    Admitted { window_start_millis: u64, count: u32 },
    /// The window already holds `max` admissions.
    Exhausted { window_start_millis: u64 },
}

#[derive(Debug)]
pub struct CrossProcessLimiter<C = SystemClock> {
    store: SharedCounterStore,
    settings: WindowSettings,
    clock: C,
}

impl CrossProcessLimiter<SystemClock> {
    pub fn new(store: SharedCounterStore, settings: WindowSettings) -> Result<Self, SettingsError> {
        Self::with_clock(store, settings, SystemClock)
    }
}

impl<C: Clock> CrossProcessLimiter<C> {
    pub fn with_clock(
        store: SharedCounterStore,
        settings: WindowSettings,
        clock: C,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            store,
            settings,
            clock,
        })
    }

    pub fn store(&self) -> &SharedCounterStore {
        &self.store
    }

    pub fn settings(&self) -> &WindowSettings {
        &self.settings
    }

    /// One admission attempt, with contention and I/O failures reported as errors.
    pub fn check(&self) -> Result<Admission, SharedCounterError> {
        let window_start = self.settings.window_start(self.clock.now_millis());
        let max = self.settings.max_requests_per_window;

        self.store.with_exclusive_access(|record| {
            let mut state = record.read()?;

            if state.window_start_millis < window_start {
                state = WindowState {
                    window_start_millis: window_start,
                    request_count: 0,
                };
            }

            if state.request_count < max {
                state.request_count += 1;
                record.write(&state)?;
                Ok(Admission::Admitted {
                    window_start_millis: state.window_start_millis,
                    count: state.request_count,
                })
            } else {
                Ok(Admission::Exhausted {
                    window_start_millis: state.window_start_millis,
                })
            }
        })
    }

    /// `true` if this caller may send one request now.
    ///
    /// Contention and I/O failures are denials: the caller retries on its own next tick.
    pub fn try_admit(&self) -> bool {
        match self.check() {
            Ok(Admission::Admitted {
                window_start_millis,
                count,
            }) => {
                AdmissionDecided::Admitted {
                    window_start_millis,
                    count,
                }
                .emit();
                true
            }
            Ok(Admission::Exhausted {
                window_start_millis,
            }) => {
                AdmissionDecided::Exhausted {
                    window_start_millis,
                    max: self.settings.max_requests_per_window,
                }
                .emit();
                false
            }
            Err(error) if error.is_contended() => {
                AdmissionDecided::Contended.emit();
                false
            }
            Err(error) => {
                AdmissionDecided::Failed { error: &error }.emit();
                false
            }
        }
    }
}
