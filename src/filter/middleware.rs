// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum middleware running the [`FilterChain`](super::FilterChain) around
//! every request.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .fallback(proxy)
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), filter_chain))
//!     .with_state(state);
//! ```
//!
//! On success the rebuilt headers replace the inbound ones and the resolved
//! [`IdentityContext`](crate::auth::IdentityContext) is added to request
//! extensions. On failure the error envelope is returned and nothing
//! downstream runs.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::trace::log_completion;
use super::{ChainOutcome, ChainTrail, RequestContext};
use crate::config::EdgeRole;
use crate::error::GatewayError;
use crate::policy::resolve_client_address;
use crate::state::AppState;

/// Caller address as resolved from proxy headers or the peer socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub String);

/// Chain middleware. The gateway profile runs the chain inline; the service
/// profile runs it on a blocking thread, since identity store lookups block.
pub async fn filter_chain(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let (mut parts, body) = request.into_parts();

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = resolve_client_address(&parts.headers, peer);

    let ctx = RequestContext::new(
        parts.method.clone(),
        parts.uri.path(),
        parts.uri.query().map(str::to_string),
        parts.headers.clone(),
        client_ip.clone(),
    );

    let summary = ctx.summary();

    let ChainOutcome { trail, result } = match run_chain(&state, ctx).await {
        Ok(outcome) => outcome,
        Err(err) => ChainOutcome {
            trail: ChainTrail::unfinished(summary),
            result: Err(err),
        },
    };

    let mut response = match result {
        Ok(ctx) => {
            let (headers, identity) = ctx.into_parts();
            parts.headers = headers;
            if let Some(identity) = identity {
                parts.extensions.insert(identity);
            }
            parts.extensions.insert(ClientAddress(client_ip));
            next.run(Request::from_parts(parts, body)).await
        }
        Err(err) => err.into_response(),
    };

    state.chain.decorate(&trail, response.headers_mut());
    log_completion(&trail.summary, response.status(), started.elapsed());
    response
}

async fn run_chain(state: &AppState, ctx: RequestContext) -> Result<ChainOutcome, GatewayError> {
    match state.config.role {
        EdgeRole::Gateway => Ok(state.chain.run(ctx)),
        EdgeRole::Service => {
            let chain = state.chain.clone();
            tokio::task::spawn_blocking(move || chain.run(ctx))
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Filter chain task failed");
                    GatewayError::Internal("filter chain did not complete".to_string())
                })
        }
    }
}
