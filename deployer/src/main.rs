//! Preview deployer - Entry Point

use std::process::ExitCode;

use preview_deployer::config::Config;
use preview_deployer::logs::{init_logging, LogOptions};
use preview_deployer::{outputs, run};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_logging(LogOptions::default()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let output_file = config.output_file.clone();

    match run(config).await {
        Ok(outs) => {
            info!("deployed {}", outs.hostname);
            if let Err(err) = outputs::emit(output_file.as_deref(), &outs) {
                error!("Failed to write outputs: {err}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Deployment failed: {err}");
            ExitCode::FAILURE
        }
    }
}
