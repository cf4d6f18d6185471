use anyhow::Context;
use clap::Parser;
use warden::cli::{report_error, Cli};
use warden::logging;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        report_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings().context("Failed to load settings")?;

    logging::init(&settings.logging).context("Failed to initialize logging")?;

    cli.execute(settings).await?;
    Ok(())
}
