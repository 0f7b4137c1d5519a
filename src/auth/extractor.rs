// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the identity resolved by the filter chain.
//!
//! The chain middleware inserts the [`IdentityContext`] into request
//! extensions; handlers pick it up with:
//!
//! ```rust,ignore
//! async fn me(Auth(identity): Auth) -> impl IntoResponse {
//!     // identity.user_id, identity.role
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::identity::IdentityContext;
use super::propagator::read_identity;
use crate::error::{AuthType, GatewayError};

/// Requires a resolved identity.
///
/// Falls back to the propagated `X-User-*` headers, which the chain has
/// already rewritten by the time a handler runs.
pub struct Auth(pub IdentityContext);

impl<S: Send + Sync> FromRequestParts<S> for Auth {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<IdentityContext>().cloned() {
            return Ok(Auth(identity));
        }

        read_identity(&parts.headers)
            .map(Auth)
            .ok_or(GatewayError::MissingCredential(AuthType::ApiToken))
    }
}

/// Requires an identity with the `Admin` role.
pub struct AdminOnly(pub IdentityContext);

impl<S: Send + Sync> FromRequestParts<S> for AdminOnly {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(identity) = Auth::from_request_parts(parts, state).await?;

        if !identity.is_admin() {
            return Err(GatewayError::InsufficientPermissions(AuthType::ApiToken));
        }

        Ok(AdminOnly(identity))
    }
}

/// Identity if one was resolved, `None` otherwise (bypass paths).
pub struct OptionalAuth(pub Option<IdentityContext>);

impl<S: Send + Sync> FromRequestParts<S> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(identity)) => Ok(OptionalAuth(Some(identity))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}
