use clap::Parser;
use tokio_util::sync::CancellationToken;

use crate::{cli::ConnectionArgs, prelude::*};

#[derive(Parser)]
pub struct CheckArgs {
    #[clap(flatten)]
    connection: ConnectionArgs,
}

impl CheckArgs {
    #[instrument(skip_all)]
    pub async fn run(self, cancellation: CancellationToken) -> Result {
        let api = self.connection.connect(cancellation)?;
        match api.verify_credentials().await {
            Ok(()) => {
                info!("credentials accepted");
                Ok(())
            }
            Err(error) if error.is_auth_failure() => {
                Err(error).context("the portal rejected the credentials")
            }
            Err(error) => Err(error).context("failed to reach the portal"),
        }
    }
}
