// ABOUTME: HTTP server assembly: merges every route group and applies tracing and CORS layers
// ABOUTME: Binds the listener and serves until ctrl-c or SIGTERM
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 GoFast

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::middleware::setup_cors;
use crate::resources::ServerResources;
use crate::routes::{
    AnnouncementRoutes, AthleteRoutes, CityRunRoutes, CrewRoutes, GarminRoutes, HealthRoutes,
    MessageRoutes, RunRoutes,
};

/// The GoFast HTTP server
pub struct GoFastServer {
    resources: Arc<ServerResources>,
}

impl GoFastServer {
    /// Create a server over shared resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Build the full application router
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.resources))
    }

    /// Serve on `host:port` until a shutdown signal arrives
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid, the port cannot be bound, or serving fails
    pub async fn run(self, host: &str, port: u16) -> Result<()> {
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("Invalid listen address {host}:{port}"))?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!("GoFast API listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")?;

        info!("GoFast API stopped");
        Ok(())
    }
}

/// Merge all route groups with tracing and CORS layers
#[must_use]
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let cors = setup_cors(&resources.config);

    Router::new()
        .merge(HealthRoutes::routes(Arc::clone(&resources)))
        .merge(AthleteRoutes::routes(Arc::clone(&resources)))
        .merge(CrewRoutes::routes(Arc::clone(&resources)))
        .merge(AnnouncementRoutes::routes(Arc::clone(&resources)))
        .merge(MessageRoutes::routes(Arc::clone(&resources)))
        .merge(RunRoutes::routes(Arc::clone(&resources)))
        .merge(CityRunRoutes::routes(Arc::clone(&resources)))
        .merge(GarminRoutes::routes(resources))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
