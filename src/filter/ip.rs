// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use super::{Filter, RequestContext};
use crate::error::GatewayError;
use crate::policy::ip::is_strict_ipv4;
use crate::policy::{PatternList, RuleSet};

/// IP admission control for protected paths.
///
/// A request is checked only when admission is enabled, its path matches a
/// protected pattern, and no exempt pattern matches. Addresses that are not
/// dotted-quad IPv4 are denied unless the rules allow everything.
pub struct IpAdmissionFilter {
    enabled: bool,
    rules: Arc<RuleSet>,
    protected: PatternList,
    exempt: PatternList,
}

impl IpAdmissionFilter {
    pub fn new(enabled: bool, rules: Arc<RuleSet>, protected: PatternList, exempt: PatternList) -> Self {
        Self {
            enabled,
            rules,
            protected,
            exempt,
        }
    }

    fn applies_to(&self, path: &str) -> bool {
        self.enabled && !self.exempt.matches(path) && self.protected.matches(path)
    }

    fn admits(&self, address: &str) -> bool {
        if self.rules.is_allow_all() {
            return true;
        }
        if !is_strict_ipv4(address) {
            tracing::warn!(client_ip = %address, "Client address is not IPv4, denying");
            return false;
        }
        self.rules.matches(address)
    }
}

impl Filter for IpAdmissionFilter {
    fn name(&self) -> &'static str {
        "ip-admission"
    }

    fn apply(&self, ctx: RequestContext) -> Result<RequestContext, GatewayError> {
        if !self.applies_to(ctx.path()) {
            return Ok(ctx);
        }

        if self.admits(ctx.client_ip()) {
            tracing::info!(client_ip = %ctx.client_ip(), method = %ctx.method(), path = %ctx.path(), "IP admitted");
            Ok(ctx)
        } else {
            tracing::warn!(client_ip = %ctx.client_ip(), method = %ctx.method(), path = %ctx.path(), "IP denied");
            Err(GatewayError::IpDenied {
                client_ip: ctx.client_ip().to_string(),
            })
        }
    }
}
