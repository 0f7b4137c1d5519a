// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hardening headers added to every response.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use super::{Filter, RequestContext, RequestSummary};
use crate::error::GatewayError;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
    script-src 'self' 'unsafe-inline' 'unsafe-eval'; \
    style-src 'self' 'unsafe-inline'; \
    img-src 'self' data: https:; \
    font-src 'self' data:; \
    connect-src 'self'; \
    frame-ancestors 'none'";

const DEFAULT_HEADERS: [(&str, &str); 9] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains; preload"),
    ("content-security-policy", CONTENT_SECURITY_POLICY),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("x-permitted-cross-domain-policies", "none"),
    ("permissions-policy", "geolocation=(), microphone=(), camera=(), payment=(), usb=()"),
    ("feature-policy", "geolocation 'none'; microphone 'none'; camera 'none'"),
];

const NO_STORE_HEADERS: [(&str, &str); 3] = [
    ("cache-control", "no-cache, no-store, must-revalidate"),
    ("pragma", "no-cache"),
    ("expires", "0"),
];

/// Path prefixes whose responses must not be cached.
const SENSITIVE_PREFIXES: [&str; 2] = ["/auth/", "/admin/"];

/// Response-only filter. Values already set by the upstream are kept.
pub struct SecurityHeadersFilter;

impl Filter for SecurityHeadersFilter {
    fn name(&self) -> &'static str {
        "security-headers"
    }

    fn apply(&self, ctx: RequestContext) -> Result<RequestContext, GatewayError> {
        Ok(ctx)
    }

    fn decorate(&self, request: &RequestSummary, headers: &mut HeaderMap) {
        set_absent(headers, &DEFAULT_HEADERS);

        if SENSITIVE_PREFIXES.iter().any(|p| request.path.contains(p)) {
            set_absent(headers, &NO_STORE_HEADERS);
        }

        headers.remove(header::SERVER);
        headers.remove("x-powered-by");
    }
}

fn set_absent(headers: &mut HeaderMap, pairs: &[(&'static str, &'static str)]) {
    for (name, value) in pairs {
        headers
            .entry(HeaderName::from_static(*name))
            .or_insert_with(|| HeaderValue::from_static(*value));
    }
}
