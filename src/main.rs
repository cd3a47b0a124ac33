use std::env;

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;

use vaktija_ics::cli;

fn setup_logging() {
    if env::var("LOG").is_err() {
        env::set_var("LOG", "vaktija_ics=info");
    }

    pretty_env_logger::init_custom_env("LOG");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = cli::parse(env::args().skip(1).collect());

    setup_logging();

    let today = Utc::now().with_timezone(&config.timezone).date_naive();
    info!(
        "Updating {} for location {} ({})",
        config.output.display(),
        config.location_id,
        config.timezone
    );

    vaktija_ics::run(&config, today)
        .await
        .with_context(|| format!("failed to update {}", config.output.display()))?;

    Ok(())
}
