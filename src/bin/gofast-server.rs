// ABOUTME: GoFast API server binary
// ABOUTME: Loads configuration, initializes logging and the database, then serves HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

//! # GoFast API Server Binary
//!
//! Starts the HTTP API for athletes, run crews, city runs, and Garmin sync.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use gofast::{
    config::{DatabaseUrl, ServerConfig},
    logging,
    resources::ServerResources,
    server::GoFastServer,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "gofast-server")]
#[command(about = "GoFast API - run crews, group runs, and Garmin Connect sync")]
pub struct Args {
    /// Override HTTP port
    #[arg(long, env = "HTTP_PORT")]
    http_port: Option<u16>,

    /// Override listen host
    #[arg(long)]
    host: Option<String>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(url) = args.database_url {
        config.database = DatabaseUrl::parse_url(&url);
    }

    logging::init_from_env()?;

    info!("Starting GoFast API");
    info!("{}", config.summary());

    let host = config.host.clone();
    let port = config.http_port;

    let resources = Arc::new(ServerResources::from_config(config).await?);
    info!("Database initialized successfully");

    display_available_endpoints(&host, port);

    let server = GoFastServer::new(resources);
    if let Err(e) = server.run(&host, port).await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}

#[allow(clippy::cognitive_complexity)]
fn display_available_endpoints(host: &str, port: u16) {
    info!("=== Available API Endpoints ===");
    info!("   Health Check:   GET  http://{host}:{port}/health");
    info!("   Athletes:       http://{host}:{port}/api/athletes");
    info!("   Run Crews:      http://{host}:{port}/api/runcrews");
    info!("   City Runs:      http://{host}:{port}/api/city-runs");
    info!("   Garmin OAuth:   GET  http://{host}:{port}/api/garmin/authorize");
    info!("   Garmin Webhook: POST http://{host}:{port}/api/garmin/webhook");
    info!("=== End of Endpoint List ===");
}
