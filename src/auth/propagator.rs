// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity propagation over request headers.
//!
//! Downstream services never see the caller's own `X-User-*` headers: the
//! chain strips them and, when an identity was resolved, writes its own.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use super::claims::UserId;
use super::identity::IdentityContext;
use super::roles::Role;

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
pub const USER_ROLE_HEADER: HeaderName = HeaderName::from_static("x-user-role");
pub const USER_EMAIL_HEADER: HeaderName = HeaderName::from_static("x-user-email");
pub const AUTH_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-auth-token");
pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

/// Headers owned by the propagator. Inbound values are never trusted.
pub const IDENTITY_HEADERS: [HeaderName; 4] = [
    USER_ID_HEADER,
    USER_ROLE_HEADER,
    USER_EMAIL_HEADER,
    AUTH_TOKEN_HEADER,
];

/// Return `headers` with caller-supplied identity headers removed and, if
/// present, `identity` written in their place.
pub fn propagate(headers: &HeaderMap, identity: Option<&IdentityContext>) -> HeaderMap {
    let mut out = headers.clone();
    for name in &IDENTITY_HEADERS {
        out.remove(name);
    }

    if let Some(identity) = identity {
        set(&mut out, USER_ID_HEADER, &identity.user_id.to_string());
        set(&mut out, USER_ROLE_HEADER, identity.role.as_str());
        set(&mut out, USER_EMAIL_HEADER, &identity.email);
        set(&mut out, AUTH_TOKEN_HEADER, &identity.token);
    }
    out
}

/// Read an identity previously written by [`propagate`].
///
/// Only meaningful behind the chain, which always rewrites these headers.
pub fn read_identity(headers: &HeaderMap) -> Option<IdentityContext> {
    let text = |name: &HeaderName| headers.get(name).and_then(|v| v.to_str().ok());

    Some(IdentityContext {
        user_id: text(&USER_ID_HEADER)?.parse::<UserId>().ok()?,
        role: text(&USER_ROLE_HEADER)?.parse::<Role>().ok()?,
        email: text(&USER_EMAIL_HEADER).unwrap_or_default().to_string(),
        token: text(&AUTH_TOKEN_HEADER).unwrap_or_default().to_string(),
    })
}

fn set(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "Identity value is not a valid header value, omitting"),
    }
}
