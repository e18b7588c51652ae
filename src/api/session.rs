use chrono::{DateTime, TimeDelta, Utc};
use reqwest::{Client, StatusCode, Url, header::HeaderValue};
use serde::Deserialize;

use crate::{
    api::credentials::Credentials,
    error::{Error, Result},
    prelude::*,
};

/// Authenticated context: the bearer token to put into the `Authorization` header.
///
/// One session per poll cycle; it is not refreshed when the service rejects it.
#[must_use]
#[derive(Clone, Debug)]
pub struct Session {
    authorization: HeaderValue,
    created_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn from_token(endpoint: &str, token: &str) -> Result<Self> {
        let mut authorization =
            HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| Error::Auth {
                endpoint: endpoint.to_owned(),
                status: None,
                reason: "the authorization token is not a valid header value".to_owned(),
            })?;
        authorization.set_sensitive(true);
        Ok(Self { authorization, created_at: Utc::now() })
    }

    #[must_use]
    pub const fn authorization(&self) -> &HeaderValue {
        &self.authorization
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.created_at
    }
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(rename = "authorizationToken")]
    token: String,
}

/// Exchange the credentials for a [`Session`].
///
/// Anything but HTTP 200 is an authentication failure, there is no retry.
#[instrument(skip_all, fields(user_id = %credentials.user_id))]
pub async fn authenticate(
    client: &Client,
    endpoint: &Url,
    credentials: &Credentials,
) -> Result<Session> {
    info!("authenticating…");
    let response = client
        .post(endpoint.clone())
        .form(credentials)
        .send()
        .await
        .map_err(|error| Error::transport(endpoint.as_str(), &error))?;
    let status = response.status();
    let body = response.text().await.map_err(|error| Error::transport(endpoint.as_str(), &error))?;

    if status != StatusCode::OK {
        warn!(%status, "authentication rejected");
        return Err(Error::auth_rejected(endpoint.as_str(), status, &body));
    }

    // The body holds the token, so it must not leak into the error.
    let AuthResponse { token } = serde_json::from_str(&body).map_err(|error| Error::Auth {
        endpoint: endpoint.to_string(),
        status: None,
        reason: format!("unexpected response: {error}"),
    })?;
    debug!("authenticated");
    Session::from_token(endpoint.as_str(), &token)
}
