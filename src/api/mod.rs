// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::EdgeRole;
use crate::error::ApiError;
use crate::filter::middleware::filter_chain;
use crate::state::AppState;

pub mod account;
pub mod fallback;
pub mod health;
pub mod proxy;

/// Build the router for `state.config.role`.
///
/// Everything except `/fallback/{kind}` runs behind the filter chain.
pub fn router(state: AppState) -> Router {
    let routes = match state.config.role {
        EdgeRole::Gateway => Router::new().fallback(proxy::proxy),
        EdgeRole::Service => Router::new()
            .route("/forgot-password", post(account::forgot_password))
            .route("/reset-password", post(account::reset_password))
            .route("/me", get(account::me))
            .route("/users/{id}", get(account::user))
            .fallback(not_found),
    };

    let chained = routes
        .route("/health/check", get(health::check))
        .route("/health/ping", get(health::ping))
        .route("/health/detail", get(health::detail))
        .layer(from_fn_with_state(state.clone(), filter_chain));

    Router::new()
        .merge(chained)
        .route("/fallback/{kind}", get(fallback::fallback))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::new(axum::http::StatusCode::NOT_FOUND, "Not found")
}
