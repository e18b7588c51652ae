use std::{sync::Arc, time::Duration};

use bon::Builder;
use reqwest::{
    Client,
    StatusCode,
    Url,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tokio_util::sync::CancellationToken;

use crate::{
    api::{models::PollEnvelope, query::Query, session::Session},
    clock::Clock,
    error::{Error, Result},
    prelude::*,
};

#[derive(Copy, Clone, Debug, Builder)]
pub struct PollOptions {
    /// Pause between two submissions while the result is pending.
    #[builder(default = PollOptions::DEFAULT_INTERVAL)]
    pub interval: Duration,

    /// Total time allowed for the result to become ready.
    #[builder(default = PollOptions::DEFAULT_TIMEOUT)]
    pub timeout: Duration,
}

impl PollOptions {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
}

impl Default for PollOptions {
    fn default() -> Self {
        Self { interval: Self::DEFAULT_INTERVAL, timeout: Self::DEFAULT_TIMEOUT }
    }
}

/// Submits a usage query until the service stops answering `PENDING`.
///
/// The number of submissions is not limited, only the total time is.
/// No request is sent after the deadline, and a request still in flight one interval after it
/// is abandoned. The session is never refreshed: a rejected session ends the loop with
/// [`Error::Auth`].
#[derive(Builder)]
pub struct Poller {
    client: Client,
    endpoint: Url,
    clock: Arc<dyn Clock>,

    #[builder(default)]
    options: PollOptions,

    #[builder(default)]
    cancellation: CancellationToken,
}

impl Poller {
    #[instrument(skip_all, fields(interval = ?self.options.interval, timeout = ?self.options.timeout))]
    pub async fn poll_until_ready(&self, session: &Session, query: &Query) -> Result<PollEnvelope> {
        let body = query.to_json()?;
        let started_at = self.clock.now();
        let deadline = started_at + self.options.timeout;
        let cutoff = deadline + self.options.interval;
        let mut n_attempts = 0;

        loop {
            n_attempts += 1;
            let envelope = tokio::select! {
                biased;
                () = self.cancellation.cancelled() => return Err(Error::Cancelled),
                result = self.submit(session, body.clone()) => result?,
                () = self.clock.sleep_until(cutoff) => {
                    let elapsed = self.clock.now().duration_since(started_at);
                    warn!(n_attempts, ?elapsed, "no response by the deadline, giving up");
                    return Err(Error::PollTimeout { elapsed, attempts: n_attempts });
                }
            };
            if !envelope.status.is_pending() {
                info!(n_attempts, status = %envelope.status, n_records = envelope.n_records(), "ready");
                return Ok(envelope);
            }

            let remaining = deadline.saturating_duration_since(self.clock.now());
            debug!(n_attempts, ?remaining, "pending…");
            if !remaining.is_zero() {
                tokio::select! {
                    biased;
                    () = self.cancellation.cancelled() => return Err(Error::Cancelled),
                    () = self.clock.sleep(self.options.interval.min(remaining)) => {}
                }
            }

            let elapsed = self.clock.now().duration_since(started_at);
            if elapsed >= self.options.timeout {
                warn!(n_attempts, ?elapsed, "still pending, giving up");
                return Err(Error::PollTimeout { elapsed, attempts: n_attempts });
            }
        }
    }

    #[instrument(skip_all, level = Level::DEBUG)]
    async fn submit(&self, session: &Session, body: Vec<u8>) -> Result<PollEnvelope> {
        let endpoint = self.endpoint.as_str();
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, session.authorization().clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|error| Error::transport(endpoint, &error))?;
        let status = response.status();
        let text = response.text().await.map_err(|error| Error::transport(endpoint, &error))?;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(Error::auth_rejected(endpoint, status, &text))
            }
            status if !status.is_success() => Err(Error::unexpected_status(endpoint, status, &text)),
            _ => PollEnvelope::decode(endpoint, &text),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use chrono::{TimeZone, Utc};
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;
    use crate::{
        api::POLL_PATH,
        clock::{TokioClock, manual::ManualClock},
    };

    // language=JSON
    const PENDING: &str = r#"{"status": "PENDING", "data": null}"#;

    // language=JSON
    const COMPLETE: &str = r#"
        {
            "status": "COMPLETE",
            "data": {
                "ELECTRIC": [
                    {
                        "serviceLocationNumber": "42",
                        "accountNumber": "1001",
                        "startDateTime": 1704067200000,
                        "endDateTime": 1704070800000,
                        "timeFrame": "HOURLY",
                        "industry": "ELECTRIC",
                        "unitOfMeasure": "KWH",
                        "connectDate": "2019-05-01",
                        "hasDaily": true,
                        "hasHourly": true,
                        "type": "USAGE",
                        "series": []
                    }
                ]
            }
        }
    "#;

    fn session() -> Session {
        Session::from_token("test", "tok123").unwrap()
    }

    fn query() -> Query {
        Query::builder()
            .user_id("u")
            .service_location_number("42")
            .account_number("1001")
            .start(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .end(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap())
            .build()
            .unwrap()
    }

    fn poller(server: &Server, clock: Arc<dyn Clock>, options: PollOptions) -> Poller {
        Poller::builder()
            .client(Client::new())
            .endpoint(Url::parse(&server.url()).unwrap().join(POLL_PATH).unwrap())
            .clock(clock)
            .options(options)
            .build()
    }

    #[tokio::test]
    async fn complete_after_pending_ok() {
        let mut server = Server::new_async().await;
        let n_requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&n_requests);
        let mock = server
            .mock("POST", "/services/secured/utility-usage/poll")
            .match_header("authorization", "Bearer tok123")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "userId": "u",
                "startDateTime": 1_704_067_200_000_i64,
                "endDateTime": 1_704_070_800_000_i64,
            })))
            .with_status(200)
            .with_body_from_request(move |_| {
                let body = if counter.fetch_add(1, Ordering::SeqCst) < 3 { PENDING } else { COMPLETE };
                body.into()
            })
            .expect(4)
            .create_async()
            .await;

        let clock = Arc::new(ManualClock::new());
        let envelope = poller(&server, clock.clone(), PollOptions::default())
            .poll_until_ready(&session(), &query())
            .await
            .unwrap();

        assert!(!envelope.status.is_pending());
        assert_eq!(envelope.n_records(), 1);
        assert_eq!(n_requests.load(Ordering::SeqCst), 4);
        assert_eq!(clock.sleeps(), vec![PollOptions::DEFAULT_INTERVAL; 3]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn never_ready_times_out() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/services/secured/utility-usage/poll")
            .with_status(200)
            .with_body(PENDING)
            .expect(5)
            .create_async()
            .await;

        let clock = Arc::new(ManualClock::new());
        let options = PollOptions::builder()
            .interval(Duration::from_secs(1))
            .timeout(Duration::from_secs(5))
            .build();
        let result =
            poller(&server, clock.clone(), options).poll_until_ready(&session(), &query()).await;

        match result {
            Err(Error::PollTimeout { elapsed, attempts }) => {
                assert_eq!(elapsed, Duration::from_secs(5));
                assert_eq!(attempts, 5);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(clock.elapsed(), Duration::from_secs(5));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn last_wait_is_cut_at_deadline() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/services/secured/utility-usage/poll")
            .with_status(200)
            .with_body(PENDING)
            .expect(3)
            .create_async()
            .await;

        let clock = Arc::new(ManualClock::new());
        let options = PollOptions::builder()
            .interval(Duration::from_secs(2))
            .timeout(Duration::from_secs(5))
            .build();
        let result =
            poller(&server, clock.clone(), options).poll_until_ready(&session(), &query()).await;

        assert!(matches!(result, Err(Error::PollTimeout { attempts: 3, .. })));
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(2), Duration::from_secs(2), Duration::from_secs(1)]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn slow_response_is_cut_after_deadline() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/services/secured/utility-usage/poll")
            .with_status(200)
            .with_chunked_body(|writer| {
                std::thread::sleep(Duration::from_secs(4));
                writer.write_all(PENDING.as_bytes())
            })
            .create_async()
            .await;

        let options = PollOptions::builder()
            .interval(Duration::from_millis(200))
            .timeout(Duration::from_secs(1))
            .build();
        let result = tokio::time::timeout(
            Duration::from_secs(3),
            poller(&server, Arc::new(TokioClock), options).poll_until_ready(&session(), &query()),
        )
        .await
        .expect("the poll must give up shortly after the deadline");

        match result {
            Err(Error::PollTimeout { elapsed, attempts }) => {
                assert_eq!(attempts, 1);
                assert!(elapsed >= Duration::from_millis(1200), "{elapsed:?}");
                assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_session_is_not_refreshed() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/services/secured/utility-usage/poll")
            .with_status(401)
            .with_body("token expired")
            .expect(1)
            .create_async()
            .await;

        let result = poller(&server, Arc::new(ManualClock::new()), PollOptions::default())
            .poll_until_ready(&session(), &query())
            .await;

        assert!(matches!(result, Err(Error::Auth { status: Some(401), .. })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_is_transport_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/services/secured/utility-usage/poll")
            .with_status(502)
            .with_body("bad gateway")
            .expect(1)
            .create_async()
            .await;

        let result = poller(&server, Arc::new(ManualClock::new()), PollOptions::default())
            .poll_until_ready(&session(), &query())
            .await;

        match result {
            Err(Error::Transport { status, reason, .. }) => {
                assert_eq!(status, Some(502));
                assert_eq!(reason, "bad gateway");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_response_is_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/services/secured/utility-usage/poll")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let result = poller(&server, Arc::new(ManualClock::new()), PollOptions::default())
            .poll_until_ready(&session(), &query())
            .await;

        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/services/secured/utility-usage/poll")
            .with_status(200)
            .with_body(PENDING)
            .expect(0)
            .create_async()
            .await;

        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let poller = Poller::builder()
            .client(Client::new())
            .endpoint(Url::parse(&server.url()).unwrap().join(POLL_PATH).unwrap())
            .clock(Arc::new(ManualClock::new()))
            .cancellation(cancellation)
            .build();

        let result = poller.poll_until_ready(&session(), &query()).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cancelled_while_waiting() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/services/secured/utility-usage/poll")
            .with_status(200)
            .with_body(PENDING)
            .expect(1)
            .create_async()
            .await;

        let cancellation = CancellationToken::new();
        let poller = Poller::builder()
            .client(Client::new())
            .endpoint(Url::parse(&server.url()).unwrap().join(POLL_PATH).unwrap())
            .clock(Arc::new(TokioClock))
            .options(
                PollOptions::builder()
                    .interval(Duration::from_secs(60))
                    .timeout(Duration::from_secs(600))
                    .build(),
            )
            .cancellation(cancellation.clone())
            .build();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancellation.cancel();
        });
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            poller.poll_until_ready(&session(), &query()),
        )
        .await
        .expect("the wait must be interrupted");

        assert!(matches!(result, Err(Error::Cancelled)));
        canceller.await.unwrap();
        mock.assert_async().await;
    }
}
