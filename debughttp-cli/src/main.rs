//! Debug HTTP CLI Entry Point

use clap::Parser;
use debughttp_cli::{init_logging, run, Args};
use std::io::Write;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let (status, body) = match run(args).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Request failed: {:#}", e);
            return Err(e);
        }
    };
    tracing::info!("Response status: {}", status);

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&body)?;
    stdout.flush()?;

    Ok(())
}
