pub mod credentials;
pub mod models;
pub mod poll;
pub mod query;
pub mod session;

use std::{sync::Arc, time::Duration};

use bon::bon;
use reqwest::{Client, Url};
use tokio_util::sync::CancellationToken;

use self::{
    credentials::Credentials,
    models::{PollEnvelope, PollStatus, UsageRecord},
    poll::{PollOptions, Poller},
    query::{Query, TimeWindow},
    session::{Session, authenticate},
};
use crate::{
    clock::{Clock, TokioClock},
    error::{Error, Result},
    prelude::*,
};

pub const AUTH_PATH: &str = "services/oauth/auth/v2";
pub const POLL_PATH: &str = "services/secured/utility-usage/poll";

/// SmartHub client bound to a single account and service location.
pub struct Api {
    client: Client,
    auth_endpoint: Url,
    poll_endpoint: Url,
    credentials: Credentials,
    service_location_number: String,
    account_number: String,
    options: PollOptions,
    clock: Arc<dyn Clock>,
    cancellation: CancellationToken,
}

#[bon]
impl Api {
    #[builder]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        #[builder(into)] service_location_number: String,
        #[builder(into)] account_number: String,
        #[builder(default)] options: PollOptions,
        #[builder(default = Duration::from_secs(10))] request_timeout: Duration,
        #[builder(default = Arc::new(TokioClock) as Arc<dyn Clock>)] clock: Arc<dyn Clock>,
        #[builder(default)] cancellation: CancellationToken,
    ) -> Result<Self> {
        let join = |path: &str| {
            base_url
                .join(path)
                .map_err(|error| Error::Validation(format!("invalid base URL `{base_url}`: {error}")))
        };
        let client = Client::builder()
            .user_agent("smarthub")
            .timeout(request_timeout)
            .build()
            .map_err(|error| Error::client(&error))?;
        Ok(Self {
            client,
            auth_endpoint: join(AUTH_PATH)?,
            poll_endpoint: join(POLL_PATH)?,
            credentials,
            service_location_number,
            account_number,
            options,
            clock,
            cancellation,
        })
    }
}

impl Api {
    /// Base URL of the portal served at `host`.
    ///
    /// A bare host name means HTTPS; a full URL is taken as is.
    pub fn base_url_for_host(host: &str) -> Result<Url> {
        let host = host.trim().trim_end_matches('/');
        let url = if host.starts_with("https://") || host.starts_with("http://") {
            format!("{host}/")
        } else {
            format!("https://{host}/")
        };
        Url::parse(&url).map_err(|error| Error::Validation(format!("invalid host `{host}`: {error}")))
    }

    /// Authenticate and throw the session away.
    ///
    /// Rejected credentials come out as [`Error::Auth`], an unreachable service as
    /// [`Error::Transport`].
    pub async fn verify_credentials(&self) -> Result<()> {
        self.authenticate().await.map(|_| ())
    }

    /// Run one full poll cycle and return the usage records of the window.
    #[instrument(skip_all, fields(start = %window.start, end = %window.end))]
    pub async fn fetch_usage(&self, window: TimeWindow) -> Result<Vec<UsageRecord>> {
        let envelope = self.fetch_envelope(window).await?;
        match envelope.status {
            PollStatus::Complete => Ok(envelope.into_records()),
            status => Err(Error::Unsuccessful { status: status.to_string() }),
        }
    }

    /// Same as [`Api::fetch_usage`], but returns the terminal envelope whatever its status.
    pub async fn fetch_envelope(&self, window: TimeWindow) -> Result<PollEnvelope> {
        let query = Query::builder()
            .user_id(self.credentials.user_id.clone())
            .service_location_number(self.service_location_number.clone())
            .account_number(self.account_number.clone())
            .start(window.start)
            .end(window.end)
            .build()?;
        let session = self.authenticate().await?;
        let envelope = self.poller().poll_until_ready(&session, &query).await?;
        info!(status = %envelope.status, n_records = envelope.n_records(), "fetched");
        Ok(envelope)
    }

    async fn authenticate(&self) -> Result<Session> {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(Error::Cancelled),
            result = authenticate(&self.client, &self.auth_endpoint, &self.credentials) => result,
        }
    }

    fn poller(&self) -> Poller {
        Poller::builder()
            .client(self.client.clone())
            .endpoint(self.poll_endpoint.clone())
            .clock(Arc::clone(&self.clock))
            .options(self.options)
            .cancellation(self.cancellation.clone())
            .build()
    }
}
