use std::task::{Context, Poll};

use futures::future::BoxFuture;
use snafu::{ResultExt, Snafu};
use tower::Service;

use crate::config::PingConfig;
use crate::http::HttpError;
use crate::reqwest_integration::ReqwestGet;

const HELLO_PATH: &str = "hello";
const APP_NAME_PARAM: &str = "appName";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PingError {
    #[snafu(display("Invalid pong base URL '{}': {}", url, details))]
    InvalidBaseUrl { url: String, details: String },

    #[snafu(display("Failed to build HTTP client: {}", source))]
    BuildClient { source: reqwest::Error },

    #[snafu(display("Pong call failed: {}", source))]
    Http { source: HttpError },

    #[snafu(display("Failed to read pong response body (status {}): {}", status, source))]
    ReadBody { status: u16, source: reqwest::Error },
}

/// One outbound ping, identified by the caller's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingRequest {
    pub app_name: String,
}

impl PingRequest {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }
}

/// What the responder said. Both variants are normal outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PongReply {
    /// 200 with the responder's body.
    Pong(String),
    /// 429: the responder's own limiter refused the call.
    Throttled(String),
}

/// Turns a [`PingRequest`] into `GET {base}/hello?appName=…` on the inner HTTP service and
/// classifies the result.
#[derive(Clone, Debug)]
pub struct PongClient<S = ReqwestGet> {
    inner: S,
    hello_url: reqwest::Url,
}

impl PongClient<ReqwestGet> {
    pub fn from_config(config: &PingConfig) -> Result<Self, PingError> {
        let inner = ReqwestGet::new(config.request_timeout).context(BuildClientSnafu)?;
        Self::new(inner, &config.pong_base_url)
    }
}

impl<S> PongClient<S> {
    pub fn new(inner: S, base_url: &str) -> Result<Self, PingError> {
        let hello = format!("{}/{}", base_url.trim_end_matches('/'), HELLO_PATH);
        let hello_url = reqwest::Url::parse(&hello).map_err(|e| PingError::InvalidBaseUrl {
            url: base_url.to_string(),
            details: e.to_string(),
        })?;
        Ok(Self { inner, hello_url })
    }

    pub fn hello_url(&self) -> &reqwest::Url {
        &self.hello_url
    }

    fn request_url(&self, request: &PingRequest) -> reqwest::Url {
        let mut url = self.hello_url.clone();
        url.query_pairs_mut()
            .append_pair(APP_NAME_PARAM, &request.app_name);
        url
    }
}

impl<S> Service<PingRequest> for PongClient<S>
where
    S: Service<reqwest::Url, Response = reqwest::Response, Error = HttpError>,
    S::Future: Send + 'static,
{
    type Response = PongReply;
    type Error = PingError;
    type Future = BoxFuture<'static, Result<PongReply, PingError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(|source| PingError::Http { source })
    }

    fn call(&mut self, request: PingRequest) -> Self::Future {
        let url = self.request_url(&request);
        let response_future = self.inner.call(url);
        Box::pin(async move {
            match response_future.await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.context(ReadBodySnafu { status })?;
                    Ok(PongReply::Pong(body))
                }
                Err(error) => error
                    .into_overload_body()
                    .map(PongReply::Throttled)
                    .map_err(|source| PingError::Http { source }),
            }
        })
    }
}
