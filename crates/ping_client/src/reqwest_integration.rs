use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tower::Service;

use crate::http::HttpError;

/// Sends one bodiless `GET` per URL through a shared `reqwest::Client`.
///
/// Only 2xx responses come back as `Ok`; any other status is read to the end and returned as
/// [`HttpError::ServerError`].
#[derive(Clone, Debug)]
pub struct ReqwestGet {
    client: reqwest::Client,
}

impl ReqwestGet {
    /// Connecting and the whole exchange are each bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Service<reqwest::Url> for ReqwestGet {
    type Response = reqwest::Response;
    type Error = HttpError;
    type Future = BoxFuture<'static, Result<reqwest::Response, HttpError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), HttpError>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, url: reqwest::Url) -> Self::Future {
        let sent = self.client.get(url).send();
        Box::pin(async move {
            let response = sent.await.map_err(send_failure)?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            let error = HttpError::ServerError {
                status: status.as_u16(),
                body,
            };
            if error.is_overload() {
                debug!(%status, "Pong is saturated");
            } else {
                warn!(%status, %error, "Pong answered with a failure status");
            }
            Err(error)
        })
    }
}

fn send_failure(error: reqwest::Error) -> HttpError {
    if error.is_timeout() {
        warn!(%error, "Pong did not answer in time");
        HttpError::Timeout
    } else if error.is_connect() {
        warn!(%error, "Pong is unreachable");
        HttpError::Transport {
            source: Box::new(error),
        }
    } else {
        warn!(%error, "Pong request failed");
        HttpError::ClientError {
            source: Box::new(error),
        }
    }
}
