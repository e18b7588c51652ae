use std::time::Duration;

use chrono::{TimeDelta, Utc};
use clap::Parser;
use smarthub::TimeWindow;
use tokio_util::sync::CancellationToken;

use crate::{cli::ConnectionArgs, prelude::*, tables::build_usage_table};

#[derive(Parser)]
pub struct FetchArgs {
    #[clap(flatten)]
    connection: ConnectionArgs,

    /// Length of the usage window, ending now.
    #[clap(long, env = "SMARTHUB_SINCE", default_value = "1h")]
    since: humantime::Duration,

    /// Print the final poll response as JSON instead of the table.
    #[clap(long)]
    json: bool,
}

impl FetchArgs {
    #[instrument(skip_all, fields(since = %self.since))]
    pub async fn run(self, cancellation: CancellationToken) -> Result {
        let since = TimeDelta::from_std(Duration::from(self.since))
            .context("the usage window is too long")?;
        let window = TimeWindow::last(since, Utc::now());
        let api = self.connection.connect(cancellation)?;

        if self.json {
            let envelope = api.fetch_envelope(window).await?;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        } else {
            let records = api.fetch_usage(window).await?;
            info!(n_records = records.len(), "fetched");
            println!("{}", build_usage_table(&records));
        }
        Ok(())
    }
}
