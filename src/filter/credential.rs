// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential extraction and verification.
//!
//! The gateway reads `Authorization: Bearer <token>` and trusts the token's
//! claims. The authentication service reads `X-API-Token: <token>` and
//! additionally looks the subject up in the [`IdentityStore`], admitting
//! only approved accounts.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderName};

use super::{Filter, RequestContext};
use crate::auth::{IdentityContext, IdentityStore, TokenCodec};
use crate::error::{AuthType, GatewayError};

pub const API_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-api-token");

const BEARER_PREFIX: &str = "Bearer ";

/// Where a credential comes from and how it turns into an identity.
pub trait CredentialResolver: Send + Sync {
    fn auth_type(&self) -> AuthType;

    /// `Ok(None)` when no credential was sent, `Err` when one was sent in an
    /// unusable form.
    fn extract<'h>(&self, headers: &'h HeaderMap) -> Result<Option<&'h str>, GatewayError>;

    /// Verify the credential and resolve the caller.
    fn resolve(&self, token: &str) -> Result<IdentityContext, GatewayError>;
}

/// `Authorization: Bearer` tokens; identity taken from the claims.
pub struct BearerCredentials {
    codec: TokenCodec,
}

impl BearerCredentials {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }
}

impl CredentialResolver for BearerCredentials {
    fn auth_type(&self) -> AuthType {
        AuthType::Jwt
    }

    fn extract<'h>(&self, headers: &'h HeaderMap) -> Result<Option<&'h str>, GatewayError> {
        let Some(raw) = header_text(headers, &AUTHORIZATION, AuthType::Jwt)? else {
            return Ok(None);
        };

        let token = raw
            .strip_prefix(BEARER_PREFIX)
            .ok_or_else(|| GatewayError::InvalidCredential {
                reason: "Authorization header must use the Bearer scheme".to_string(),
                auth: AuthType::Jwt,
            })?
            .trim();

        Ok((!token.is_empty()).then_some(token))
    }

    fn resolve(&self, token: &str) -> Result<IdentityContext, GatewayError> {
        let claims = self.codec.verify(token).map_err(|source| GatewayError::Token {
            source,
            auth: AuthType::Jwt,
        })?;
        Ok(IdentityContext::from_claims(&claims, token))
    }
}

/// `X-API-Token` tokens; identity taken from the identity store.
pub struct ApiTokenCredentials {
    codec: TokenCodec,
    store: Arc<dyn IdentityStore>,
}

impl ApiTokenCredentials {
    pub fn new(codec: TokenCodec, store: Arc<dyn IdentityStore>) -> Self {
        Self { codec, store }
    }
}

impl CredentialResolver for ApiTokenCredentials {
    fn auth_type(&self) -> AuthType {
        AuthType::ApiToken
    }

    fn extract<'h>(&self, headers: &'h HeaderMap) -> Result<Option<&'h str>, GatewayError> {
        Ok(header_text(headers, &API_TOKEN_HEADER, AuthType::ApiToken)?
            .map(str::trim)
            .filter(|t| !t.is_empty()))
    }

    fn resolve(&self, token: &str) -> Result<IdentityContext, GatewayError> {
        let claims = self.codec.verify(token).map_err(|source| GatewayError::Token {
            source,
            auth: AuthType::ApiToken,
        })?;

        let user = self
            .store
            .find_by_id(claims.subject)
            .map_err(|e| {
                tracing::error!(user_id = %claims.subject, error = %e, "Identity store lookup failed");
                GatewayError::DownstreamUnavailable {
                    service: "identity-store".to_string(),
                }
            })?
            .ok_or_else(|| GatewayError::InvalidCredential {
                reason: "API token does not belong to a known user".to_string(),
                auth: AuthType::ApiToken,
            })?;

        if !user.is_approved() {
            tracing::warn!(user_id = %user.id, status = ?user.account_status, "Token for unapproved account");
            return Err(GatewayError::InvalidCredential {
                reason: "Account is not approved".to_string(),
                auth: AuthType::ApiToken,
            });
        }

        Ok(IdentityContext::from_record(&user, token))
    }
}

fn header_text<'h>(
    headers: &'h HeaderMap,
    name: &HeaderName,
    auth: AuthType,
) -> Result<Option<&'h str>, GatewayError> {
    headers
        .get(name)
        .map(|value| {
            value.to_str().map_err(|_| GatewayError::InvalidCredential {
                reason: format!("{name} header is not valid text"),
                auth,
            })
        })
        .transpose()
}

/// Requires a credential unless the request was marked as bypassed.
pub struct CredentialPresenceFilter {
    resolver: Arc<dyn CredentialResolver>,
}

impl CredentialPresenceFilter {
    pub fn new(resolver: Arc<dyn CredentialResolver>) -> Self {
        Self { resolver }
    }
}

impl Filter for CredentialPresenceFilter {
    fn name(&self) -> &'static str {
        "credential-presence"
    }

    fn apply(&self, ctx: RequestContext) -> Result<RequestContext, GatewayError> {
        if ctx.auth_bypassed() {
            return Ok(ctx);
        }
        if self.resolver.extract(ctx.headers())?.is_some() {
            return Ok(ctx);
        }
        tracing::warn!(path = %ctx.path(), "Missing credential");
        Err(GatewayError::MissingCredential(self.resolver.auth_type()))
    }
}

/// Verifies the credential and attaches the resolved identity.
pub struct CredentialVerifyFilter {
    resolver: Arc<dyn CredentialResolver>,
}

impl CredentialVerifyFilter {
    pub fn new(resolver: Arc<dyn CredentialResolver>) -> Self {
        Self { resolver }
    }
}

impl Filter for CredentialVerifyFilter {
    fn name(&self) -> &'static str {
        "credential-verify"
    }

    fn apply(&self, ctx: RequestContext) -> Result<RequestContext, GatewayError> {
        if ctx.auth_bypassed() {
            return Ok(ctx);
        }

        let token = self
            .resolver
            .extract(ctx.headers())?
            .map(str::to_string)
            .ok_or(GatewayError::MissingCredential(self.resolver.auth_type()))?;

        let identity = self.resolver.resolve(&token).inspect_err(|e| {
            tracing::warn!(path = %ctx.path(), code = e.error_code(), "Credential rejected");
        })?;

        tracing::debug!(
            user_id = %identity.user_id,
            role = %identity.role,
            path = %ctx.path(),
            "Credential verified"
        );
        Ok(ctx.with_identity(identity))
    }
}
