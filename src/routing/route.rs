// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Static route table.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use super::fallback::FallbackKind;
use crate::policy::PatternList;
use crate::upstream::retry::RetryPolicy;

const LOAD_BALANCED_SCHEME: &str = "lb://";

/// Where a route sends traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `lb://name`, resolved through the service registry.
    LoadBalanced(String),
    /// A literal base URL.
    Url(Url),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("load-balanced target has no service name")]
    EmptyServiceName,
    #[error("invalid target URL `{0}`")]
    InvalidUrl(String),
}

impl Target {
    /// Logical service name, or the host for literal URLs.
    pub fn service_name(&self) -> &str {
        match self {
            Target::LoadBalanced(name) => name,
            Target::Url(url) => url.host_str().unwrap_or("external"),
        }
    }

    pub fn is_load_balanced(&self) -> bool {
        matches!(self, Target::LoadBalanced(_))
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(name) = s.strip_prefix(LOAD_BALANCED_SCHEME) {
            let name = name.trim_end_matches('/');
            if name.is_empty() {
                return Err(TargetError::EmptyServiceName);
            }
            return Ok(Target::LoadBalanced(name.to_string()));
        }
        Url::parse(s)
            .map(Target::Url)
            .map_err(|_| TargetError::InvalidUrl(s.to_string()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::LoadBalanced(name) => write!(f, "{LOAD_BALANCED_SCHEME}{name}"),
            Target::Url(url) => write!(f, "{url}"),
        }
    }
}

/// A gateway route.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub id: String,
    pub predicates: PatternList,
    /// Leading path segments removed before forwarding.
    pub strip_prefix: usize,
    pub target: Target,
    /// Lower runs first.
    pub priority: i32,
    pub retry: RetryPolicy,
    /// Whether the canary router may override the target.
    pub canary: bool,
    pub fallback: Option<FallbackKind>,
}

impl RouteDescriptor {
    pub fn new(id: impl Into<String>, predicates: &str, target: Target) -> Self {
        Self {
            id: id.into(),
            predicates: PatternList::parse(predicates),
            strip_prefix: 0,
            target,
            priority: 0,
            retry: RetryPolicy::none(),
            canary: false,
            fallback: None,
        }
    }

    pub fn strip_prefix(mut self, segments: usize) -> Self {
        self.strip_prefix = segments;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn canary(mut self) -> Self {
        self.canary = true;
        self
    }

    pub fn fallback(mut self, kind: FallbackKind) -> Self {
        self.fallback = Some(kind);
        self
    }

    pub fn matches(&self, path: &str) -> bool {
        self.predicates.matches(path)
    }
}

/// Ordered route list; the first matching route wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
}

impl RouteTable {
    pub fn new(mut routes: Vec<RouteDescriptor>) -> Self {
        // Stable: equal priorities keep declaration order.
        routes.sort_by_key(|r| r.priority);
        Self { routes }
    }

    /// The gym platform's routes.
    pub fn default_routes() -> Self {
        let auth = Target::LoadBalanced("gym-auth".to_string());
        let server = Target::LoadBalanced("gym-server".to_string());

        Self::new(vec![
            RouteDescriptor::new("gym-auth-route", "/auth/**", auth)
                .strip_prefix(1)
                .canary()
                .fallback(FallbackKind::Auth)
                .retry(RetryPolicy::with_retries(
                    3,
                    Duration::from_secs(1),
                    Duration::from_secs(5),
                )),
            RouteDescriptor::new("gym-server-api-route", "/api/**", server.clone())
                .strip_prefix(1)
                .canary()
                .fallback(FallbackKind::Server)
                .retry(
                    RetryPolicy::with_retries(2, Duration::from_millis(500), Duration::from_secs(2))
                        .with_methods(vec![Method::GET, Method::POST]),
                ),
            RouteDescriptor::new("gym-server-admin-route", "/admin/**", server.clone())
                .strip_prefix(1)
                .canary()
                .fallback(FallbackKind::Admin),
            RouteDescriptor::new("health-check-route", "/health/**", server.clone())
                .strip_prefix(1),
            RouteDescriptor::new(
                "static-resource-route",
                "/static/**,/doc.html,/swagger-resources/**,/webjars/**,/v2/api-docs",
                server,
            ),
        ])
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    /// First route whose predicates match `path`.
    pub fn resolve(&self, path: &str) -> Option<&RouteDescriptor> {
        self.routes.iter().find(|r| r.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_targets() {
        assert_eq!(
            "lb://gym-auth".parse::<Target>(),
            Ok(Target::LoadBalanced("gym-auth".to_string()))
        );
        assert!(matches!(
            "http://10.0.0.5:9000".parse::<Target>(),
            Ok(Target::Url(_))
        ));
        assert_eq!("lb://".parse::<Target>(), Err(TargetError::EmptyServiceName));
        assert!("not a url".parse::<Target>().is_err());
        assert_eq!(Target::LoadBalanced("x".to_string()).to_string(), "lb://x");
    }

    #[test]
    fn default_routes_resolve_by_prefix() {
        let table = RouteTable::default_routes();
        assert_eq!(table.resolve("/auth/login").unwrap().id, "gym-auth-route");
        assert_eq!(table.resolve("/api/classes/3").unwrap().id, "gym-server-api-route");
        assert_eq!(table.resolve("/admin/users").unwrap().id, "gym-server-admin-route");
        assert_eq!(table.resolve("/doc.html").unwrap().id, "static-resource-route");
        assert!(table.resolve("/unknown").is_none());
    }

    #[test]
    fn default_route_policies() {
        let table = RouteTable::default_routes();
        let auth = table.resolve("/auth/login").unwrap();
        assert_eq!(auth.retry.max_attempts, 4);
        assert_eq!(auth.strip_prefix, 1);
        assert!(auth.canary);

        let admin = table.resolve("/admin/x").unwrap();
        assert_eq!(admin.retry.max_attempts, 1);
        assert_eq!(admin.fallback, Some(FallbackKind::Admin));

        let docs = table.resolve("/webjars/x.js").unwrap();
        assert_eq!(docs.strip_prefix, 0);
        assert!(!docs.canary);
    }

    #[test]
    fn lower_priority_wins() {
        let lb = |n: &str| Target::LoadBalanced(n.to_string());
        let table = RouteTable::new(vec![
            RouteDescriptor::new("catch-all", "/**", lb("a")).priority(10),
            RouteDescriptor::new("specific", "/api/**", lb("b")).priority(-1),
        ]);
        assert_eq!(table.resolve("/api/x").unwrap().id, "specific");
        assert_eq!(table.resolve("/other").unwrap().id, "catch-all");
    }
}
