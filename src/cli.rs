mod check;
mod fetch;

use clap::{Parser, Subcommand};
use smarthub::{Api, Credentials, PollOptions};
use tokio_util::sync::CancellationToken;

use crate::{
    cli::{check::CheckArgs, fetch::FetchArgs},
    prelude::*,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub async fn run(self, cancellation: CancellationToken) -> Result {
        match self.command {
            Command::Check(args) => args.run(cancellation).await,
            Command::Fetch(args) => args.run(cancellation).await,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Log in and tell whether the portal accepted the credentials.
    #[clap(name = "check")]
    Check(Box<CheckArgs>),

    /// Run one poll cycle and print the usage.
    #[clap(name = "fetch")]
    Fetch(Box<FetchArgs>),
}

#[derive(Parser)]
pub struct ConnectionArgs {
    /// Portal host name, for example `example.smarthub.coop`.
    #[clap(long, env = "SMARTHUB_HOST")]
    host: String,

    #[clap(long, env = "SMARTHUB_USERNAME")]
    username: String,

    #[clap(long, env = "SMARTHUB_PASSWORD", hide_env_values = true)]
    password: String,

    #[clap(long = "service-location", env = "SMARTHUB_SERVICE_LOCATION_NUMBER")]
    service_location_number: String,

    #[clap(long = "account", env = "SMARTHUB_ACCOUNT_NUMBER")]
    account_number: String,

    /// Pause between submissions while the usage is still being computed.
    #[clap(long, env = "SMARTHUB_POLL_INTERVAL", default_value = "1s")]
    poll_interval: humantime::Duration,

    /// Give up if the usage is not ready by then.
    #[clap(long, env = "SMARTHUB_POLL_TIMEOUT", default_value = "20s")]
    poll_timeout: humantime::Duration,

    /// Timeout of a single HTTP request.
    #[clap(long, env = "SMARTHUB_REQUEST_TIMEOUT", default_value = "10s")]
    request_timeout: humantime::Duration,
}

impl ConnectionArgs {
    pub fn connect(self, cancellation: CancellationToken) -> Result<Api> {
        let options = PollOptions::builder()
            .interval(self.poll_interval.into())
            .timeout(self.poll_timeout.into())
            .build();
        let api = Api::builder()
            .base_url(Api::base_url_for_host(&self.host)?)
            .credentials(Credentials::new(self.username, self.password))
            .service_location_number(self.service_location_number)
            .account_number(self.account_number)
            .options(options)
            .request_timeout(self.request_timeout.into())
            .cancellation(cancellation)
            .build()?;
        Ok(api)
    }
}
