//! The ping side: a periodic loop that asks the cross-process limiter for a slot and, when
//! granted, fires one `GET /hello` at the pong responder.
//!
//! Responder overload (HTTP 429) is an expected outcome and is reported as
//! [`client::PongReply::Throttled`], not as an error.
pub mod client;
pub mod config;
pub mod http;
pub mod internal_event;
pub mod reqwest_integration;
pub mod scheduler;

#[macro_use]
extern crate tracing;

pub type Error = rate_limiter_shared::Error;
