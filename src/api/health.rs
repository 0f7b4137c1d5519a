// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::OptionalAuth;
use crate::state::AppState;

/// Basic liveness response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"UP"` while the process serves requests.
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub gateway: String,
    pub version: String,
    pub role: String,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
}

/// Liveness plus the routing view. Only admins see upstream names, routes
/// and filters.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailResponse {
    #[serde(flatten)]
    pub health: HealthResponse,
    pub service_count: usize,
    pub canary_enabled: bool,
    #[serde(flatten)]
    pub topology: Option<Topology>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    pub registered_services: Vec<String>,
    pub routes: Vec<String>,
    pub filters: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    /// Unix milliseconds.
    pub timestamp: i64,
}

fn health_of(state: &AppState) -> HealthResponse {
    let uptime = state.started_at.elapsed();
    let now = Utc::now();
    let started_at = chrono::Duration::from_std(uptime)
        .ok()
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(now);

    HealthResponse {
        status: "UP".to_string(),
        timestamp: now,
        gateway: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        role: format!("{:?}", state.config.role).to_lowercase(),
        started_at,
        uptime_seconds: uptime.as_secs(),
    }
}

/// `GET /health/check`
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    tracing::debug!("Health check");
    Json(health_of(&state))
}

/// `GET /health/detail`
pub async fn detail(
    State(state): State<AppState>,
    OptionalAuth(caller): OptionalAuth,
) -> Json<DetailResponse> {
    let registry = state.forwarder.registry();
    let topology = caller.filter(|c| c.is_admin()).map(|_| Topology {
        registered_services: registry.names().into_iter().map(str::to_string).collect(),
        routes: state.routes.routes().iter().map(|r| r.id.clone()).collect(),
        filters: state.chain.names(),
    });

    Json(DetailResponse {
        health: health_of(&state),
        service_count: registry.len(),
        canary_enabled: state.canary.config().enabled,
        topology,
    })
}

/// `GET /health/ping`
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "pong",
        timestamp: Utc::now().timestamp_millis(),
    })
}
