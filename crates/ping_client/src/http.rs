use http::StatusCode;
use snafu::Snafu;

use crate::Error as CrateError;

/// Failures of a single HTTP exchange with the responder.
///
/// Non-success statuses are reported as [`HttpError::ServerError`] with the body attached, so
/// callers can tell an overload signal (429) from everything else.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HttpError {
    /// The responder could not be reached.
    #[snafu(display("HTTP transport error: {}", source))]
    Transport { source: CrateError },

    /// The responder answered with a non-success status.
    #[snafu(display("HTTP server error response (status {}): {}", status, body))]
    ServerError { status: u16, body: String },

    #[snafu(display("HTTP request timed out"))]
    Timeout,

    /// Anything else reqwest reports, such as a redirect loop or a malformed response.
    #[snafu(display("Generic HTTP client error: {}", source))]
    ClientError { source: CrateError },
}

impl HttpError {
    /// The responder said it is saturated.
    pub fn is_overload(&self) -> bool {
        matches!(
            self,
            HttpError::ServerError { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
        )
    }

    /// The 429 body for an overload signal; any other error comes back unchanged.
    pub fn into_overload_body(self) -> Result<String, HttpError> {
        if !self.is_overload() {
            return Err(self);
        }
        match self {
            HttpError::ServerError { body, .. } => Ok(body),
            other => Err(other),
        }
    }
}
