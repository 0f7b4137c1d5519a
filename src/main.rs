// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use thiserror::Error;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use edge_gate::api::router;
use edge_gate::auth::{HttpIdentityStore, IdentityStore, IdentityStoreError, InMemoryIdentityStore};
use edge_gate::config::{
    log_format_from, ConfigError, EdgeRole, GatewayConfig, LogFormat, DEFAULT_LOG_FILTER,
    IDENTITY_STORE_URL_ENV, LOG_FORMAT_ENV,
};
use edge_gate::state::{AppState, StateError};

/// In-flight requests get this long to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    IdentityStore(#[from] IdentityStoreError),
    #[error("TLS setup failed: {0}")]
    Tls(String),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(log_format_from(std::env::var(LOG_FORMAT_ENV).ok().as_deref()));

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Edge gate failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    // Install the ring crypto provider before any TLS use (server or reqwest).
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| StartupError::Tls("crypto provider already installed".to_string()))?;

    let config = GatewayConfig::from_env()?;
    let addr = config.bind_addr()?;
    let tls = config.tls.clone();
    let role = config.role;

    let identity_store = identity_store(&config)?;
    let state = AppState::new(config, identity_store)?;
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    let handle: Handle<SocketAddr> = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    match tls {
        Some(paths) => {
            let tls_config = RustlsConfig::from_pem_file(&paths.cert, &paths.key)
                .await
                .map_err(|e| StartupError::Tls(e.to_string()))?;
            tracing::info!(%addr, ?role, "Edge gate listening on https");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app)
                .await?;
        }
        None => {
            tracing::info!(%addr, ?role, "Edge gate listening on http");
            axum_server::bind(addr).handle(handle).serve(app).await?;
        }
    }

    tracing::info!("Edge gate stopped");
    Ok(())
}

fn identity_store(config: &GatewayConfig) -> Result<Arc<dyn IdentityStore>, StartupError> {
    match (&config.role, &config.identity_store_url) {
        (EdgeRole::Service, Some(url)) => {
            tracing::info!(url = %url, "Using remote identity store");
            let store = HttpIdentityStore::new(
                url.clone(),
                config.upstream_timeout,
                tokio::runtime::Handle::current(),
            )?;
            Ok(Arc::new(store))
        }
        (EdgeRole::Service, None) => {
            tracing::warn!(
                "{IDENTITY_STORE_URL_ENV} not set, service-side tokens will not resolve to any user"
            );
            Ok(Arc::new(InMemoryIdentityStore::new()))
        }
        (EdgeRole::Gateway, _) => Ok(Arc::new(InMemoryIdentityStore::new())),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_on_signal(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }

    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
