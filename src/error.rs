use std::time::Duration;

use reqwest::StatusCode;

/// Maximum number of characters of a response body carried inside an error.
const MAX_BODY_CHARS: usize = 256;

/// Errors produced by the SmartHub client.
///
/// The password never ends up in here: authentication errors only carry the status code
/// and the (truncated) response body.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("authentication at `{endpoint}` failed{}: {reason}", format_status(.status))]
    Auth { endpoint: String, status: Option<u16>, reason: String },

    #[error("invalid query: {0}")]
    Validation(String),

    #[error("request to `{endpoint}` failed{}: {reason}", format_status(.status))]
    Transport { endpoint: String, status: Option<u16>, reason: String },

    #[error("usage data not ready after {elapsed:?} ({attempts} submissions)")]
    PollTimeout { elapsed: Duration, attempts: usize },

    #[error("failed to decode the response from `{endpoint}`: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("the service finished with status `{status}`")]
    Unsuccessful { status: String },

    #[error("cancelled")]
    Cancelled,

    #[error("failed to set up the HTTP client: {reason}")]
    Client { reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether the credentials or the session were rejected by the service,
    /// as opposed to the service being unreachable or misbehaving.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    pub(crate) fn auth_rejected(endpoint: &str, status: StatusCode, body: &str) -> Self {
        Self::Auth {
            endpoint: endpoint.to_owned(),
            status: Some(status.as_u16()),
            reason: truncate(body),
        }
    }

    pub(crate) fn transport(endpoint: &str, error: &reqwest::Error) -> Self {
        Self::Transport {
            endpoint: endpoint.to_owned(),
            status: error.status().map(|status| status.as_u16()),
            reason: format!("{error:#}"),
        }
    }

    pub(crate) fn client(error: &reqwest::Error) -> Self {
        Self::Client { reason: format!("{error:#}") }
    }

    pub(crate) fn unexpected_status(endpoint: &str, status: StatusCode, body: &str) -> Self {
        Self::Transport {
            endpoint: endpoint.to_owned(),
            status: Some(status.as_u16()),
            reason: truncate(body),
        }
    }
}

#[allow(clippy::ref_option)]
fn format_status(status: &Option<u16>) -> String {
    status.map_or_else(String::new, |status| format!(" (HTTP {status})"))
}

/// Cut the body down to [`MAX_BODY_CHARS`] characters, respecting char boundaries.
pub(crate) fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((index, _)) => format!("{}…", &body[..index]),
        None => body.to_owned(),
    }
}
