//! Streetwarp job runner binary.
//!
//! Reads one JSON job request on stdin, runs it, and writes the response to
//! stdout. The surrounding invocation harness owns event transport.

use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use swr_models::{JobRequest, JobResponse};
use swr_worker::{JobRunner, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("swr_worker=info".parse().unwrap())
        .add_directive("swr_media=info".parse().unwrap())
        .add_directive("swr_relay=info".parse().unwrap())
        .add_directive("swr_storage=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting streetwarp job runner");

    let config = WorkerConfig::from_env();
    info!("Runner config: {:?}", config);

    let mut input = String::new();
    if let Err(e) = tokio::io::stdin().read_to_string(&mut input).await {
        error!("Failed to read job request: {}", e);
        std::process::exit(1);
    }

    let response = match serde_json::from_str::<JobRequest>(&input) {
        Ok(request) => JobRunner::new(config).handle(request).await,
        Err(e) => {
            error!("Invalid job request: {}", e);
            JobResponse::failure(format!("invalid job request: {e}"))
        }
    };

    match serde_json::to_string(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            std::process::exit(1);
        }
    }
}
