// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Canary routing.
//!
//! For a canary-enabled route with a load-balanced target, a request goes to
//! the canary deployment when it carries the canary header with an accepted
//! value, or when the caller's address is in the canary rule set. The
//! canary target is the configured external URL, or `lb://<name>-canary`.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName};

use super::route::{RouteDescriptor, Target, TargetError};
use crate::policy::RuleSet;

const CANARY_SUFFIX: &str = "-canary";

#[derive(Debug, Clone)]
pub struct CanaryConfig {
    pub enabled: bool,
    pub header_key: Option<HeaderName>,
    pub header_values: Vec<String>,
    pub ip_rules: Arc<RuleSet>,
    /// Literal canary URL; when unset the `-canary` service is used.
    pub external_url: Option<String>,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header_key: Some(HeaderName::from_static("x-canary-flag")),
            header_values: vec!["canary".into(), "test".into(), "beta".into()],
            ip_rules: Arc::new(RuleSet::parse("127.0.0.1")),
            external_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanaryReason {
    Header,
    ClientAddress,
}

/// Route after the canary decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub id: String,
    pub target: Target,
    pub canary: Option<CanaryReason>,
}

impl ResolvedRoute {
    fn primary(route: &RouteDescriptor) -> Self {
        Self {
            id: route.id.clone(),
            target: route.target.clone(),
            canary: None,
        }
    }
}

pub struct CanaryRouter {
    config: CanaryConfig,
}

impl CanaryRouter {
    pub fn new(config: CanaryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CanaryConfig {
        &self.config
    }

    /// Whether this request should go to the canary, and why.
    pub fn decide(
        &self,
        route: &RouteDescriptor,
        headers: &HeaderMap,
        client_ip: &str,
    ) -> Option<CanaryReason> {
        if !self.config.enabled || !route.canary || !route.target.is_load_balanced() {
            return None;
        }
        if self.header_matches(headers) {
            return Some(CanaryReason::Header);
        }
        if self.address_matches(client_ip) {
            return Some(CanaryReason::ClientAddress);
        }
        None
    }

    /// Apply the decision to `route`. Failing to build the canary target
    /// keeps the primary route.
    pub fn route(&self, route: &RouteDescriptor, headers: &HeaderMap, client_ip: &str) -> ResolvedRoute {
        let Some(reason) = self.decide(route, headers, client_ip) else {
            return ResolvedRoute::primary(route);
        };

        match self.canary_target(&route.target) {
            Ok(target) => {
                tracing::info!(
                    route = %route.id,
                    reason = ?reason,
                    client_ip = %client_ip,
                    from = %route.target,
                    to = %target,
                    "Canary route selected"
                );
                ResolvedRoute {
                    id: format!("{}{CANARY_SUFFIX}", route.id),
                    target,
                    canary: Some(reason),
                }
            }
            Err(e) => {
                tracing::error!(route = %route.id, error = %e, "Could not build canary route, keeping original");
                ResolvedRoute::primary(route)
            }
        }
    }

    fn header_matches(&self, headers: &HeaderMap) -> bool {
        let Some(key) = &self.config.header_key else {
            return false;
        };
        headers
            .get_all(key)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| self.config.header_values.iter().any(|accepted| accepted == v.trim()))
    }

    fn address_matches(&self, client_ip: &str) -> bool {
        // An empty canary rule set selects nobody.
        !self.config.ip_rules.is_empty() && self.config.ip_rules.matches(client_ip)
    }

    fn canary_target(&self, primary: &Target) -> Result<Target, TargetError> {
        match &self.config.external_url {
            Some(url) => url.parse(),
            None => Ok(Target::LoadBalanced(format!(
                "{}{CANARY_SUFFIX}",
                primary.service_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn route() -> RouteDescriptor {
        RouteDescriptor::new("gym-server-api-route", "/api/**", Target::LoadBalanced("gym-server".into()))
            .canary()
    }

    fn router(external_url: Option<&str>) -> CanaryRouter {
        CanaryRouter::new(CanaryConfig {
            enabled: true,
            ip_rules: Arc::new(RuleSet::parse("10.9.0.0/16")),
            external_url: external_url.map(str::to_string),
            ..CanaryConfig::default()
        })
    }

    fn flag(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-canary-flag", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn header_flag_rewrites_target() {
        let resolved = router(None).route(&route(), &flag("beta"), "203.0.113.1");
        assert_eq!(resolved.target, Target::LoadBalanced("gym-server-canary".into()));
        assert_eq!(resolved.id, "gym-server-api-route-canary");
        assert_eq!(resolved.canary, Some(CanaryReason::Header));
    }

    #[test]
    fn absent_header_leaves_route_unchanged() {
        let resolved = router(None).route(&route(), &HeaderMap::new(), "203.0.113.1");
        assert_eq!(resolved.target, Target::LoadBalanced("gym-server".into()));
        assert_eq!(resolved.id, "gym-server-api-route");
        assert_eq!(resolved.canary, None);

        let resolved = router(None).route(&route(), &flag("prod"), "203.0.113.1");
        assert_eq!(resolved.canary, None);
    }

    #[test]
    fn client_address_in_rules_selects_canary() {
        let resolved = router(None).route(&route(), &HeaderMap::new(), "10.9.4.4");
        assert_eq!(resolved.canary, Some(CanaryReason::ClientAddress));
    }

    #[test]
    fn external_url_is_used_when_configured() {
        let resolved = router(Some("http://canary.internal:9000")).route(&route(), &flag("canary"), "1.1.1.1");
        assert!(matches!(resolved.target, Target::Url(ref u) if u.host_str() == Some("canary.internal")));
    }

    #[test]
    fn invalid_external_url_keeps_original() {
        let resolved = router(Some("::not a url::")).route(&route(), &flag("canary"), "1.1.1.1");
        assert_eq!(resolved.target, Target::LoadBalanced("gym-server".into()));
        assert_eq!(resolved.canary, None);
    }

    #[test]
    fn disabled_or_literal_targets_never_override() {
        let disabled = CanaryRouter::new(CanaryConfig::default());
        assert_eq!(disabled.decide(&route(), &flag("beta"), "1.1.1.1"), None);

        let literal = RouteDescriptor::new(
            "ext",
            "/ext/**",
            Target::Url("http://ext.test".parse().unwrap()),
        )
        .canary();
        assert_eq!(router(None).decide(&literal, &flag("beta"), "1.1.1.1"), None);

        let not_canary = RouteDescriptor::new("h", "/health/**", Target::LoadBalanced("gym-server".into()));
        assert_eq!(router(None).decide(&not_canary, &flag("beta"), "1.1.1.1"), None);
    }
}
