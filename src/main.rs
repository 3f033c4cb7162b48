//! Dormancy - inactive account reconciliation
//!
//! Runs a single pass and exits: 0 when the run succeeded, 1 otherwise.

use clap::Parser;
use tracing::{error, info};

use dormancy::{config::Args, handler, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Dormancy - inactive account sweep");
    info!(
        "  build {} ({})",
        env!("GIT_COMMIT_SHORT"),
        env!("BUILD_TIMESTAMP")
    );
    info!("======================================");
    info!("User pool: {}", args.user_pool_id);
    info!("Mode: {}", args.run_mode);
    info!("Threshold: {} days", args.days_inactive);
    info!("Page size: {}", args.effective_page_size());
    info!("Activity source: {:?}", args.activity_source);
    info!(
        "Report: {}",
        if args.mail_endpoint.is_some() { "mail relay" } else { "log only" }
    );
    info!("======================================");

    let settings = args.into_settings();
    let response = handler::handle(&settings).await;

    println!("{}", serde_json::to_string(&response)?);

    if !response.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
