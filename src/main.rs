#![allow(clippy::doc_markdown)]

mod cli;
mod prelude;
mod tables;

use clap::{Parser, crate_version};
use tokio_util::sync::CancellationToken;

use crate::{cli::Args, prelude::*};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();
    info!(version = crate_version!(), "starting…");

    let cancellation = CancellationToken::new();
    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling…");
                cancellation.cancel();
            }
        }
    });

    Args::parse().run(cancellation).await?;
    info!("done!");
    Ok(())
}
