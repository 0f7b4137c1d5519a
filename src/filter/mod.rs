// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Filter Chain
//!
//! Ordered, independent request filters. Each filter takes ownership of the
//! [`RequestContext`] and either hands back a (possibly rebuilt) context or
//! stops the request with a [`GatewayError`].
//!
//! ## Order
//!
//! 1. trace
//! 2. security headers
//! 3. method allow-list
//! 4. forbidden paths
//! 5. bypass paths (best-effort identity, never enforcing)
//! 6. credential presence
//! 7. credential verification
//! 8. identity injection
//! 9. IP admission for protected paths
//!
//! After the chain, every filter that ran gets a chance to decorate the
//! response headers, innermost first, whether or not the chain succeeded.

pub mod credential;
pub mod identity;
pub mod ip;
pub mod method;
pub mod middleware;
pub mod path;
pub mod security_headers;
pub mod trace;

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::auth::IdentityContext;
use crate::error::GatewayError;

pub use credential::{
    ApiTokenCredentials, BearerCredentials, CredentialPresenceFilter, CredentialResolver,
    CredentialVerifyFilter,
};
pub use identity::IdentityInjectionFilter;
pub use ip::IpAdmissionFilter;
pub use method::MethodFilter;
pub use path::{BypassPathFilter, ForbiddenPathFilter};
pub use security_headers::SecurityHeadersFilter;
pub use trace::TraceFilter;

/// Per-request state threaded through the chain. Never shared between
/// requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    client_ip: String,
    trace_id: String,
    identity: Option<IdentityContext>,
    auth_bypassed: bool,
}

impl RequestContext {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: Option<String>,
        headers: HeaderMap,
        client_ip: impl Into<String>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            query,
            headers,
            client_ip: client_ip.into(),
            trace_id: trace::new_trace_id(),
            identity: None,
            auth_bypassed: false,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn identity(&self) -> Option<&IdentityContext> {
        self.identity.as_ref()
    }

    /// Set by the bypass filter; credential filters then stand aside.
    pub fn auth_bypassed(&self) -> bool {
        self.auth_bypassed
    }

    /// Context with `name` set to `value`.
    pub fn with_header(self, name: HeaderName, value: HeaderValue) -> Self {
        let mut headers = self.headers;
        headers.insert(name, value);
        Self { headers, ..self }
    }

    /// Context with its header map replaced.
    pub fn with_headers(self, headers: HeaderMap) -> Self {
        Self { headers, ..self }
    }

    /// Context carrying `identity`. An identity that is already resolved is
    /// kept; later attempts are ignored.
    pub fn with_identity(self, identity: IdentityContext) -> Self {
        if self.identity.is_some() {
            tracing::debug!(trace_id = %self.trace_id, "Identity already resolved, keeping the first");
            return self;
        }
        Self {
            identity: Some(identity),
            ..self
        }
    }

    pub fn with_auth_bypassed(self) -> Self {
        Self {
            auth_bypassed: true,
            ..self
        }
    }

    /// Owned copy of what response decoration needs.
    pub fn summary(&self) -> RequestSummary {
        RequestSummary {
            method: self.method.clone(),
            path: self.path.clone(),
            client_ip: self.client_ip.clone(),
            trace_id: self.trace_id.clone(),
        }
    }

    /// Split back into the parts needed to rebuild an HTTP request.
    pub fn into_parts(self) -> (HeaderMap, Option<IdentityContext>) {
        (self.headers, self.identity)
    }
}

/// Request facts that survive a failed chain, used for logging and
/// response decoration.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub method: Method,
    pub path: String,
    pub client_ip: String,
    pub trace_id: String,
}

/// One step of the chain.
pub trait Filter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn apply(&self, ctx: RequestContext) -> Result<RequestContext, GatewayError>;

    /// Adjust response headers. Called for every filter that ran.
    fn decorate(&self, _request: &RequestSummary, _headers: &mut HeaderMap) {}
}

/// Which filters ran for a request, kept for response decoration.
#[derive(Debug, Clone)]
pub struct ChainTrail {
    pub summary: RequestSummary,
    ran: usize,
}

impl ChainTrail {
    /// Trail for a chain that never reported back. Every filter decorates.
    pub fn unfinished(summary: RequestSummary) -> Self {
        Self {
            summary,
            ran: usize::MAX,
        }
    }
}

/// Result of running the chain over one request.
pub struct ChainOutcome {
    pub trail: ChainTrail,
    pub result: Result<RequestContext, GatewayError>,
}

/// Fixed, ordered filter list built once at startup.
#[derive(Clone)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self { filters }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run every filter in order, stopping at the first error.
    pub fn run(&self, ctx: RequestContext) -> ChainOutcome {
        let summary = ctx.summary();
        let mut ctx = ctx;

        for (index, filter) in self.filters.iter().enumerate() {
            match filter.apply(ctx) {
                Ok(next) => ctx = next,
                Err(err) => {
                    tracing::info!(
                        trace_id = %summary.trace_id,
                        filter = filter.name(),
                        code = err.error_code(),
                        path = %summary.path,
                        client_ip = %summary.client_ip,
                        "Request rejected"
                    );
                    return ChainOutcome {
                        trail: ChainTrail {
                            summary,
                            ran: index + 1,
                        },
                        result: Err(err),
                    };
                }
            }
        }

        ChainOutcome {
            trail: ChainTrail {
                summary,
                ran: self.filters.len(),
            },
            result: Ok(ctx),
        }
    }

    /// Let every filter that ran decorate the response, innermost first.
    pub fn decorate(&self, trail: &ChainTrail, headers: &mut HeaderMap) {
        let ran = trail.ran.min(self.filters.len());
        for filter in self.filters[..ran].iter().rev() {
            filter.decorate(&trail.summary, headers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, UserId};
    use crate::error::AuthType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        name: &'static str,
        fail: bool,
        decorated: Arc<AtomicUsize>,
    }

    impl Filter for Counting {
        fn name(&self) -> &'static str {
            self.name
        }

        fn apply(&self, ctx: RequestContext) -> Result<RequestContext, GatewayError> {
            if self.fail {
                return Err(GatewayError::MissingCredential(AuthType::Jwt));
            }
            Ok(ctx.with_header(
                HeaderName::from_static("x-seen"),
                HeaderValue::from_static(self.name),
            ))
        }

        fn decorate(&self, _request: &RequestSummary, _headers: &mut HeaderMap) {
            self.decorated.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Method::GET, "/api/x", None, HeaderMap::new(), "10.0.0.1")
    }

    fn identity(id: u64) -> IdentityContext {
        IdentityContext {
            user_id: UserId(id),
            role: Role::Member,
            email: String::new(),
            token: String::new(),
        }
    }

    #[test]
    fn short_circuit_stops_later_filters_but_decorates_earlier_ones() {
        let decorated = Arc::new(AtomicUsize::new(0));
        let make = |name, fail| -> Arc<dyn Filter> {
            Arc::new(Counting {
                name,
                fail,
                decorated: decorated.clone(),
            })
        };
        let chain = FilterChain::new(vec![make("a", false), make("b", true), make("c", false)]);

        let outcome = chain.run(ctx());
        assert!(outcome.result.is_err());

        chain.decorate(&outcome.trail, &mut HeaderMap::new());
        assert_eq!(decorated.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unfinished_trail_decorates_every_filter() {
        let decorated = Arc::new(AtomicUsize::new(0));
        let make = |name| -> Arc<dyn Filter> {
            Arc::new(Counting {
                name,
                fail: false,
                decorated: decorated.clone(),
            })
        };
        let chain = FilterChain::new(vec![make("a"), make("b")]);

        let trail = ChainTrail::unfinished(ctx().summary());
        chain.decorate(&trail, &mut HeaderMap::new());
        assert_eq!(decorated.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn successful_chain_threads_context() {
        let decorated = Arc::new(AtomicUsize::new(0));
        let chain = FilterChain::new(vec![Arc::new(Counting {
            name: "only",
            fail: false,
            decorated,
        })]);

        let ctx = chain.run(ctx()).result.unwrap();
        assert_eq!(ctx.headers()["x-seen"], "only");
    }

    #[test]
    fn identity_is_resolved_at_most_once() {
        let ctx = ctx().with_identity(identity(1)).with_identity(identity(2));
        assert_eq!(ctx.identity().unwrap().user_id, UserId(1));
    }

    #[test]
    fn trace_id_is_sixteen_hex_chars() {
        let id = ctx().trace_id().to_string();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
