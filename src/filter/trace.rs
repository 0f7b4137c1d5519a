// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trace ids and request logging.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use uuid::Uuid;

use super::{Filter, RequestContext, RequestSummary};
use crate::auth::propagator::TRACE_ID_HEADER;
use crate::error::GatewayError;

/// Requests slower than this are logged at `warn`.
pub const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(2);

const TRACE_ID_LEN: usize = 16;

/// 16 lowercase hex characters.
pub fn new_trace_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(TRACE_ID_LEN);
    id
}

/// Stamps the trace id on the forwarded request and on the response.
pub struct TraceFilter;

impl Filter for TraceFilter {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn apply(&self, ctx: RequestContext) -> Result<RequestContext, GatewayError> {
        tracing::debug!(
            trace_id = %ctx.trace_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            client_ip = %ctx.client_ip(),
            "Request received"
        );

        let value = HeaderValue::from_str(ctx.trace_id())
            .map_err(|e| GatewayError::Internal(format!("trace id header: {e}")))?;
        Ok(ctx.with_header(TRACE_ID_HEADER, value))
    }

    fn decorate(&self, request: &RequestSummary, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&request.trace_id) {
            headers.insert(TRACE_ID_HEADER, value);
        }
    }
}

/// Log the end of a request. Wraps the whole chain plus the downstream call.
pub fn log_completion(request: &RequestSummary, status: StatusCode, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;

    if elapsed > SLOW_REQUEST_THRESHOLD {
        tracing::warn!(
            trace_id = %request.trace_id,
            method = %request.method,
            path = %request.path,
            client_ip = %request.client_ip,
            status = status.as_u16(),
            elapsed_ms,
            "Slow request"
        );
    } else {
        tracing::info!(
            trace_id = %request.trace_id,
            method = %request.method,
            path = %request.path,
            client_ip = %request.client_ip,
            status = status.as_u16(),
            elapsed_ms,
            "Request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn trace_id_reaches_request_and_response() {
        let ctx = RequestContext::new(Method::GET, "/api/x", None, HeaderMap::new(), "10.0.0.1");
        let trace_id = ctx.trace_id().to_string();
        let summary = ctx.summary();

        let ctx = TraceFilter.apply(ctx).unwrap();
        assert_eq!(ctx.headers()[TRACE_ID_HEADER], trace_id.as_str());

        let mut response = HeaderMap::new();
        TraceFilter.decorate(&summary, &mut response);
        assert_eq!(response[TRACE_ID_HEADER], trace_id.as_str());
    }

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(new_trace_id(), new_trace_id());
    }
}
