// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use super::{Filter, RequestContext};
use crate::auth::propagator;
use crate::error::GatewayError;

/// Rewrites the `X-User-*` / `X-Auth-Token` headers from the resolved
/// identity. Caller-supplied values never survive this filter.
pub struct IdentityInjectionFilter;

impl Filter for IdentityInjectionFilter {
    fn name(&self) -> &'static str {
        "identity-injection"
    }

    fn apply(&self, ctx: RequestContext) -> Result<RequestContext, GatewayError> {
        let headers = propagator::propagate(ctx.headers(), ctx.identity());
        Ok(ctx.with_headers(headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::propagator::{USER_ID_HEADER, USER_ROLE_HEADER};
    use crate::auth::{IdentityContext, Role, UserId};
    use axum::http::{HeaderMap, HeaderValue, Method};

    fn forged() -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("1"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("Admin"));
        RequestContext::new(Method::GET, "/api/x", None, headers, "10.0.0.1")
    }

    #[test]
    fn forged_headers_are_replaced_by_identity() {
        let ctx = forged().with_identity(IdentityContext {
            user_id: UserId(77),
            role: Role::Member,
            email: "m@gym.test".to_string(),
            token: "tok".to_string(),
        });

        let out = IdentityInjectionFilter.apply(ctx).unwrap();
        assert_eq!(out.headers()[USER_ID_HEADER], "77");
        assert_eq!(out.headers()[USER_ROLE_HEADER], "Member");
    }

    #[test]
    fn forged_headers_are_dropped_without_identity() {
        let out = IdentityInjectionFilter.apply(forged()).unwrap();
        assert!(!out.headers().contains_key(USER_ID_HEADER));
        assert!(!out.headers().contains_key(USER_ROLE_HEADER));
    }
}
