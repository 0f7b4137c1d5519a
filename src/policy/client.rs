// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client address resolution behind proxies and load balancers.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Headers consulted, in order, before falling back to the peer address.
pub const CLIENT_ADDRESS_HEADERS: [&str; 6] = [
    "X-Forwarded-For",
    "X-Real-IP",
    "Proxy-Client-IP",
    "WL-Proxy-Client-IP",
    "HTTP_CLIENT_IP",
    "HTTP_X_FORWARDED_FOR",
];

/// Returned when no source yields an address.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Best-effort originating client address.
///
/// The first header holding a usable value wins; for `X-Forwarded-For` only
/// the left-most entry is taken. Values equal to `unknown` (any case) are
/// skipped.
pub fn resolve_client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    for name in CLIENT_ADDRESS_HEADERS {
        let Some(raw) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let candidate = raw.split(',').next().unwrap_or_default().trim();
        if usable(candidate) {
            return candidate.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

fn usable(value: &str) -> bool {
    !value.is_empty() && !value.eq_ignore_ascii_case(UNKNOWN_ADDRESS)
}
