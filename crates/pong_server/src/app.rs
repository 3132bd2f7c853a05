use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use rate_limiter_shared::clock::{Clock, SystemClock};
use rate_limiter_shared::internal_event::InternalEvent;
use rate_limiter_shared::settings::{SettingsError, TokenBucketSettings};
use rate_limiter_shared::token_bucket::LocalTokenLimiter;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::internal_event::PermitServed;

pub const HELLO_ROUTE: &str = "/hello";
pub const FLUX_HELLO_ROUTE: &str = "/flux/hello";

const UNKNOWN_APP_NAME: &str = "unknown server";

type SharedLimiter = Arc<LocalTokenLimiter<Arc<dyn Clock>>>;

/// One bucket per route; the two never share permits.
#[derive(Clone)]
pub struct PongState {
    hello: SharedLimiter,
    flux_hello: SharedLimiter,
}

impl PongState {
    pub fn new(settings: TokenBucketSettings) -> Result<Self, SettingsError> {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        settings: TokenBucketSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            hello: Arc::new(LocalTokenLimiter::with_clock(settings, Arc::clone(&clock))?),
            flux_hello: Arc::new(LocalTokenLimiter::with_clock(settings, clock)?),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct HelloQuery {
    #[serde(rename = "appName")]
    app_name: String,
}

#[derive(Debug, Deserialize)]
pub struct FluxHelloQuery {
    #[serde(rename = "appName")]
    app_name: Option<String>,
}

pub fn router(state: PongState) -> Router {
    Router::new()
        .route(HELLO_ROUTE, get(hello))
        .route(FLUX_HELLO_ROUTE, get(flux_hello))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn hello(
    State(state): State<PongState>,
    Query(query): Query<HelloQuery>,
) -> (StatusCode, &'static str) {
    debug!(app_name = %query.app_name, "has new request");
    let granted = state.hello.try_acquire();
    PermitServed {
        route: HELLO_ROUTE,
        app_name: &query.app_name,
        granted,
    }
    .emit();

    if granted {
        (StatusCode::OK, "world")
    } else {
        (StatusCode::TOO_MANY_REQUESTS, "Too many requests.")
    }
}

async fn flux_hello(
    State(state): State<PongState>,
    Query(query): Query<FluxHelloQuery>,
) -> (StatusCode, &'static str) {
    let app_name = query
        .app_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_APP_NAME.to_string());
    let granted = state.flux_hello.try_acquire();
    PermitServed {
        route: FLUX_HELLO_ROUTE,
        app_name: &app_name,
        granted,
    }
    .emit();

    if granted {
        (StatusCode::OK, "World")
    } else {
        (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests")
    }
}
