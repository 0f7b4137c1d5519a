// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::http::Method;

use super::{Filter, RequestContext};
use crate::error::{AuthType, GatewayError};

/// Rejects methods outside the configured allow-list with `405`.
pub struct MethodFilter {
    allowed: Vec<Method>,
    auth: AuthType,
}

impl MethodFilter {
    /// An empty list allows every method.
    pub fn new(allowed: Vec<Method>, auth: AuthType) -> Self {
        Self { allowed, auth }
    }
}

impl Filter for MethodFilter {
    fn name(&self) -> &'static str {
        "method"
    }

    fn apply(&self, ctx: RequestContext) -> Result<RequestContext, GatewayError> {
        if self.allowed.is_empty() || self.allowed.contains(ctx.method()) {
            return Ok(ctx);
        }
        Err(GatewayError::MethodNotAllowed {
            method: ctx.method().to_string(),
            auth: self.auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};

    fn ctx(method: Method) -> RequestContext {
        RequestContext::new(method, "/login", None, HeaderMap::new(), "10.0.0.1")
    }

    #[test]
    fn allow_list_is_enforced() {
        let filter = MethodFilter::new(vec![Method::GET, Method::POST], AuthType::ApiToken);
        assert!(filter.apply(ctx(Method::POST)).is_ok());

        let err = filter.apply(ctx(Method::PATCH)).err().unwrap();
        assert_eq!(err.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.auth_type(), AuthType::ApiToken);
    }

    #[test]
    fn empty_list_allows_everything() {
        let filter = MethodFilter::new(Vec::new(), AuthType::Jwt);
        assert!(filter.apply(ctx(Method::TRACE)).is_ok());
    }
}
