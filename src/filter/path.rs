// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Forbidden (blacklist) and bypass (whitelist) path filters.

use std::sync::Arc;

use super::credential::CredentialResolver;
use super::{Filter, RequestContext};
use crate::error::{AuthType, GatewayError};
use crate::policy::PatternList;

/// Rejects matching paths with `403`, before any credential is looked at.
pub struct ForbiddenPathFilter {
    patterns: PatternList,
    auth: AuthType,
}

impl ForbiddenPathFilter {
    pub fn new(patterns: PatternList, auth: AuthType) -> Self {
        Self { patterns, auth }
    }
}

impl Filter for ForbiddenPathFilter {
    fn name(&self) -> &'static str {
        "forbidden-path"
    }

    fn apply(&self, ctx: RequestContext) -> Result<RequestContext, GatewayError> {
        match self.patterns.first_match(ctx.path()) {
            Some(pattern) => {
                tracing::warn!(path = %ctx.path(), pattern = %pattern, "Forbidden path requested");
                Err(GatewayError::ForbiddenPath {
                    path: ctx.path().to_string(),
                    auth: self.auth,
                })
            }
            None => Ok(ctx),
        }
    }
}

/// Marks matching paths as not requiring a credential.
///
/// A credential that happens to be present is still resolved so the
/// downstream sees who the caller is, but any failure is ignored.
pub struct BypassPathFilter {
    patterns: PatternList,
    resolver: Arc<dyn CredentialResolver>,
}

impl BypassPathFilter {
    pub fn new(patterns: PatternList, resolver: Arc<dyn CredentialResolver>) -> Self {
        Self { patterns, resolver }
    }
}

impl Filter for BypassPathFilter {
    fn name(&self) -> &'static str {
        "bypass-path"
    }

    fn apply(&self, ctx: RequestContext) -> Result<RequestContext, GatewayError> {
        if !self.patterns.matches(ctx.path()) {
            return Ok(ctx);
        }

        let credential = self
            .resolver
            .extract(ctx.headers())
            .map(|token| token.map(str::to_string));

        let resolved = match credential {
            Ok(Some(token)) => self.resolver.resolve(&token),
            Ok(None) => return Ok(ctx.with_auth_bypassed()),
            Err(e) => Err(e),
        };

        match resolved {
            Ok(identity) => {
                tracing::debug!(path = %ctx.path(), user_id = %identity.user_id, "Bypass path, identity resolved");
                Ok(ctx.with_identity(identity).with_auth_bypassed())
            }
            Err(e) => {
                tracing::debug!(path = %ctx.path(), error = %e, "Bypass path, ignoring unusable credential");
                Ok(ctx.with_auth_bypassed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, TokenCodec, UserId};
    use crate::filter::BearerCredentials;
    use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue, Method, StatusCode};
    use chrono::Duration;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"path-filter-test-key-0123456789abcdef")
    }

    fn ctx(path: &str, bearer: Option<&str>) -> RequestContext {
        let mut headers = HeaderMap::new();
        if let Some(token) = bearer {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
        }
        RequestContext::new(Method::GET, path, None, headers, "10.0.0.1")
    }

    fn bypass() -> BypassPathFilter {
        BypassPathFilter::new(
            PatternList::parse("/auth/**,/health/**"),
            Arc::new(BearerCredentials::new(codec())),
        )
    }

    #[test]
    fn forbidden_path_rejects_with_403() {
        let filter = ForbiddenPathFilter::new(PatternList::parse("/internal/**"), AuthType::Jwt);
        let err = filter.apply(ctx("/internal/metrics", None)).err().unwrap();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(filter.apply(ctx("/api/classes", None)).is_ok());
    }

    #[test]
    fn bypass_with_invalid_token_passes_without_identity() {
        let out = bypass().apply(ctx("/auth/login", Some("not-a-token"))).unwrap();
        assert!(out.auth_bypassed());
        assert!(out.identity().is_none());
    }

    #[test]
    fn bypass_with_valid_token_resolves_identity() {
        let token = codec()
            .issue(UserId(3), Role::Member, "m@gym.test", Duration::minutes(5))
            .unwrap()
            .token;
        let out = bypass().apply(ctx("/health/check", Some(&token))).unwrap();
        assert!(out.auth_bypassed());
        assert_eq!(out.identity().unwrap().user_id, UserId(3));
    }

    #[test]
    fn non_matching_path_is_untouched() {
        let out = bypass().apply(ctx("/api/classes", None)).unwrap();
        assert!(!out.auth_bypassed());
    }
}
