// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request forwarding to upstream services.

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use url::Url;

use super::registry::ServiceRegistry;
use super::retry::retry_with_backoff;
use crate::error::GatewayError;
use crate::routing::{ResolvedRoute, RouteDescriptor, Target};

/// Connection-scoped headers that are never forwarded in either direction.
const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("no upstream registered for service `{0}`")]
    UnknownService(String),
    #[error("cannot build upstream URL: {0}")]
    InvalidUrl(String),
    #[error("upstream connection failed: {0}")]
    Connect(String),
    #[error("upstream timed out")]
    Timeout,
    #[error("upstream answered {0}")]
    Unavailable(StatusCode),
    #[error("upstream request failed: {0}")]
    Request(String),
}

impl UpstreamError {
    /// Connect failures, timeouts and 502/503/504 answers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpstreamError::Connect(_) | UpstreamError::Timeout | UpstreamError::Unavailable(_)
        )
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_connect() {
            UpstreamError::Connect(e.to_string())
        } else {
            UpstreamError::Request(e.to_string())
        }
    }
}

/// The request as it leaves the filter chain.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: String,
}

pub struct Forwarder {
    client: reqwest::Client,
    registry: ServiceRegistry,
}

impl Forwarder {
    pub fn new(registry: ServiceRegistry, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            // Upstreams are internal; ambient proxy variables do not apply.
            .no_proxy()
            .build()
            .map_err(|e| UpstreamError::Request(e.to_string()))?;
        Ok(Self { client, registry })
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Full upstream URL for `path` on `target`, with `strip` leading
    /// segments removed.
    pub fn upstream_url(
        &self,
        target: &Target,
        path: &str,
        strip: usize,
        query: Option<&str>,
    ) -> Result<Url, UpstreamError> {
        let mut url = self
            .registry
            .resolve(target)
            .ok_or_else(|| UpstreamError::UnknownService(target.service_name().to_string()))?;

        if url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidUrl(url.to_string()));
        }

        let joined = format!("{}{}", url.path().trim_end_matches('/'), strip_prefix(path, strip));
        url.set_path(&joined);
        url.set_query(query);
        Ok(url)
    }

    /// Forward `request` along `resolved`, retrying per the route's policy.
    ///
    /// Always produces a response: the upstream's on success, otherwise the
    /// route's fallback or a `503` envelope.
    pub async fn forward(
        &self,
        route: &RouteDescriptor,
        resolved: &ResolvedRoute,
        request: UpstreamRequest,
    ) -> Response {
        let target = self.effective_target(route, resolved);

        let url = match self.upstream_url(target, &request.path, route.strip_prefix, request.query.as_deref()) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(route = %resolved.id, error = %e, "Cannot resolve upstream");
                return unavailable(route, target);
            }
        };

        let headers = forward_headers(&request.headers, &request.client_ip);
        let policy = route.retry.for_method(&request.method);

        let result = retry_with_backoff(&policy, &resolved.id, UpstreamError::is_retryable, || {
            self.attempt(request.method.clone(), url.clone(), headers.clone(), request.body.clone())
        })
        .await;

        match result {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(route = %resolved.id, upstream = %url, error = %e, "Upstream unavailable");
                unavailable(route, target)
            }
        }
    }

    /// A canary target missing from the registry falls back to the primary.
    fn effective_target<'a>(&self, route: &'a RouteDescriptor, resolved: &'a ResolvedRoute) -> &'a Target {
        if resolved.canary.is_some() && self.registry.resolve(&resolved.target).is_none() {
            tracing::warn!(
                route = %route.id,
                canary = %resolved.target,
                "Canary target is not registered, using primary"
            );
            return &route.target;
        }
        &resolved.target
    }

    async fn attempt(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response, UpstreamError> {
        let upstream = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        if matches!(
            status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        ) {
            return Err(UpstreamError::Unavailable(status));
        }

        let mut response_headers = upstream.headers().clone();
        strip_hop_by_hop(&mut response_headers);
        let bytes = upstream.bytes().await?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

fn unavailable(route: &RouteDescriptor, target: &Target) -> Response {
    match route.fallback {
        Some(kind) => kind.into_response(),
        None => GatewayError::DownstreamUnavailable {
            service: target.service_name().to_string(),
        }
        .into_response(),
    }
}

/// Remove `segments` leading path segments. The result always starts with
/// `/`; a trailing slash on the input is kept.
pub fn strip_prefix(path: &str, segments: usize) -> String {
    if segments == 0 {
        return if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
    }

    let rest: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .skip(segments)
        .collect();

    let mut stripped = format!("/{}", rest.join("/"));
    if path.ends_with('/') && !rest.is_empty() {
        stripped.push('/');
    }
    stripped
}

fn forward_headers(inbound: &HeaderMap, client_ip: &str) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    let forwarded = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {client_ip}"),
        None => client_ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    headers
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{FallbackKind, RouteTable};
    use axum::body::to_bytes;

    fn forwarder() -> Forwarder {
        let registry = ServiceRegistry::parse("gym-auth=http://auth:8081,gym-server=http://server:8082/ctx/")
            .unwrap();
        Forwarder::new(registry, Duration::from_millis(200)).unwrap()
    }

    #[test]
    fn strip_prefix_drops_leading_segments() {
        assert_eq!(strip_prefix("/auth/login", 1), "/login");
        assert_eq!(strip_prefix("/auth", 1), "/");
        assert_eq!(strip_prefix("/api/a/b/", 1), "/a/b/");
        assert_eq!(strip_prefix("/doc.html", 0), "/doc.html");
    }

    #[test]
    fn builds_upstream_urls() {
        let f = forwarder();
        let auth = Target::LoadBalanced("gym-auth".into());
        let url = f.upstream_url(&auth, "/auth/login", 1, Some("next=%2F")).unwrap();
        assert_eq!(url.as_str(), "http://auth:8081/login?next=%2F");

        let server = Target::LoadBalanced("gym-server".into());
        let url = f.upstream_url(&server, "/api/classes/3", 1, None).unwrap();
        assert_eq!(url.as_str(), "http://server:8082/ctx/classes/3");

        assert!(matches!(
            f.upstream_url(&Target::LoadBalanced("ghost".into()), "/x", 0, None),
            Err(UpstreamError::UnknownService(_))
        ));
    }

    #[test]
    fn hop_by_hop_and_host_are_not_forwarded() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert(header::HOST, HeaderValue::from_static("edge.test"));
        inbound.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        inbound.insert(X_FORWARDED_FOR, HeaderValue::from_static("198.51.100.1"));

        let out = forward_headers(&inbound, "10.0.0.2");
        assert!(!out.contains_key(header::CONNECTION));
        assert!(!out.contains_key(header::HOST));
        assert_eq!(out[header::ACCEPT], "*/*");
        assert_eq!(out[X_FORWARDED_FOR], "198.51.100.1, 10.0.0.2");
    }

    #[test]
    fn unregistered_canary_falls_back_to_primary() {
        let f = forwarder();
        let table = RouteTable::default_routes();
        let route = table.resolve("/api/x").unwrap();
        let resolved = ResolvedRoute {
            id: "gym-server-api-route-canary".into(),
            target: Target::LoadBalanced("gym-server-canary".into()),
            canary: Some(crate::routing::CanaryReason::Header),
        };
        assert_eq!(f.effective_target(route, &resolved), &route.target);
    }

    #[tokio::test]
    async fn unreachable_upstream_yields_fallback_envelope() {
        // Nothing listens on port 9 of the loopback interface.
        let registry = ServiceRegistry::parse("gym-server=http://127.0.0.1:9").unwrap();
        let f = Forwarder::new(registry, Duration::from_millis(200)).unwrap();
        let route = RouteDescriptor::new("r", "/api/**", Target::LoadBalanced("gym-server".into()))
            .strip_prefix(1)
            .fallback(FallbackKind::Server)
            .retry(crate::upstream::retry::RetryPolicy::with_retries(
                1,
                Duration::from_millis(1),
                Duration::from_millis(2),
            ));
        let resolved = ResolvedRoute {
            id: route.id.clone(),
            target: route.target.clone(),
            canary: None,
        };

        let response = f
            .forward(
                &route,
                &resolved,
                UpstreamRequest {
                    method: Method::GET,
                    path: "/api/classes".into(),
                    query: None,
                    headers: HeaderMap::new(),
                    body: Bytes::new(),
                    client_ip: "10.0.0.1".into(),
                },
            )
            .await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body["fallback"], true);
        assert_eq!(body["service"], "gym-server");
        assert_eq!(body["authType"], "GATEWAY");
    }
}
