// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Catch-all handler: route lookup, canary decision, upstream call.

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::filter::middleware::ClientAddress;
use crate::policy::client::UNKNOWN_ADDRESS;
use crate::state::AppState;
use crate::upstream::UpstreamRequest;

/// Request bodies are buffered so retries can replay them.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub async fn proxy(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path().to_string();

    let Some(route) = state.routes.resolve(&path) else {
        tracing::debug!(path = %path, "No route matched");
        return ApiError::new(StatusCode::NOT_FOUND, format!("No route for {path}")).into_response();
    };

    let client_ip = parts
        .extensions
        .get::<ClientAddress>()
        .map(|ClientAddress(ip)| ip.clone())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string());

    let resolved = state.canary.route(route, &parts.headers, &client_ip);

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Could not read request body");
            return ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "Request body could not be read")
                .into_response();
        }
    };

    state
        .forwarder
        .forward(
            route,
            &resolved,
            UpstreamRequest {
                method: parts.method,
                path,
                query: parts.uri.query().map(str::to_string),
                headers: parts.headers,
                body,
                client_ip,
            },
        )
        .await
}
