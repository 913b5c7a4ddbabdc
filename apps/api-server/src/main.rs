//! # Turnstile API Server
//!
//! Actix-web delivery of the admission pipeline: rate limiting per caller,
//! bearer-token authentication, and a handful of terminal handlers.

use std::io;

use actix_web::HttpServer;

mod config;
mod handlers;
mod middleware;
mod observability;
mod pipeline;
mod telemetry;

use config::AppConfig;
use pipeline::Pipeline;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;
    config.warn_insecure_defaults();

    tracing::info!(
        environment = %config.environment,
        "Starting Turnstile API Server on {}:{}",
        config.host,
        config.port
    );

    let pipeline = Pipeline::start(&config);
    let stages = pipeline.stages();

    let server = match HttpServer::new(move || pipeline::build_app(stages.clone()))
        .bind((config.host.as_str(), config.port))
    {
        Ok(server) => server,
        Err(e) => {
            pipeline.shutdown().await;
            return Err(e);
        }
    };

    let result = server.run().await;

    // The HTTP server has drained; stop the sweeper before exiting.
    pipeline.shutdown().await;
    result
}
