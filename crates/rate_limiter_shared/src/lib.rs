//! Admission control primitives shared by the ping and pong processes.
//!
//! Two independent ceilings live here:
//!
//! 1. **Cross-process fixed window**: [`cross_process::CrossProcessLimiter`] keeps a
//!    `(window start, count)` record in a small file guarded by an advisory, non-blocking
//!    exclusive lock ([`shared_counter::SharedCounterStore`]). Any number of unrelated
//!    processes pointing at the same path share one aggregate budget per window.
//! 2. **Local token bucket**: [`token_bucket::LocalTokenLimiter`] protects a single
//!    responder process, refilling to capacity once per interval.
//!
//! The two do not share state and are not expected to agree; callers of the
//! cross-process limiter must tolerate the responder rejecting an admitted call.
//!
//! # Basic Usage
//! ```no_run
//! use rate_limiter_shared::cross_process::CrossProcessLimiter;
//! use rate_limiter_shared::settings::WindowSettings;
//! use rate_limiter_shared::shared_counter::SharedCounterStore;
//!
//! let store = SharedCounterStore::new("/tmp/ping-lock.bin");
//! let limiter = CrossProcessLimiter::new(store, WindowSettings::default()).unwrap();
//! if limiter.try_admit() {
//!     // send one request
//! }
//! ```
//!
//! # Metrics
//! Emits counters via the [`internal_event::InternalEvent`] trait.
pub mod clock;
pub mod cross_process;
pub mod internal_event;
pub mod settings;
pub mod shared_counter;
pub mod token_bucket;

#[macro_use]
extern crate tracing;

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
