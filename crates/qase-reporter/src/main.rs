use qase_reporter::config::Config;
use qase_reporter::submit::SUBMIT_POLICY;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| qase_reporter::DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(Some(config)) => config,
        Ok(None) => {
            info!("QASE_TEST_RUN_ID not set, nothing to report");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(run_id = config.run_id, "Reporting results to Qase");

    match qase_reporter::run(&config, SUBMIT_POLICY).await {
        Ok(_) => {
            info!("Reported results to Qase successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to report results: {}", e);
            ExitCode::FAILURE
        }
    }
}
