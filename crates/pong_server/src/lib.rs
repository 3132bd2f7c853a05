//! The pong side: an HTTP responder that answers `GET /hello` while its token bucket has a
//! permit and 429 otherwise.
pub mod app;
pub mod config;
pub mod internal_event;

#[macro_use]
extern crate tracing;

use std::net::SocketAddr;

use snafu::Snafu;

pub type Error = rate_limiter_shared::Error;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ServeError {
    #[snafu(display("Failed to bind {}: {}", addr, source))]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[snafu(display("Server terminated: {}", source))]
    Serve { source: std::io::Error },
}
