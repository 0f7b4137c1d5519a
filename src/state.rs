// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::auth::reset::LoggedDelivery;
use crate::auth::{IdentityStore, InMemoryIdentityStore, PasswordResetFlow, PendingStore, TokenCodec};
use crate::config::{ConfigError, EdgeRole, GatewayConfig};
use crate::error::AuthType;
use crate::filter::{
    ApiTokenCredentials, BearerCredentials, BypassPathFilter, CredentialPresenceFilter,
    CredentialResolver, CredentialVerifyFilter, Filter, FilterChain, ForbiddenPathFilter,
    IdentityInjectionFilter, IpAdmissionFilter, MethodFilter, SecurityHeadersFilter, TraceFilter,
};
use crate::policy::RuleSet;
use crate::routing::{CanaryConfig, CanaryRouter, RouteTable};
use crate::upstream::{Forwarder, UpstreamError};

/// Max outstanding password resets kept in memory.
const PENDING_RESET_CAPACITY: usize = 10_000;

#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Everything a request needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub codec: TokenCodec,
    pub chain: Arc<FilterChain>,
    pub routes: Arc<RouteTable>,
    pub canary: Arc<CanaryRouter>,
    pub forwarder: Arc<Forwarder>,
    pub identity_store: Arc<dyn IdentityStore>,
    pub reset: Arc<PasswordResetFlow>,
    pub started_at: Instant,
}

impl AppState {
    /// Gateway profile. Identities come from token claims, so the identity
    /// store is only an empty placeholder.
    pub fn gateway(config: GatewayConfig) -> Result<Self, StateError> {
        Self::new(config, Arc::new(InMemoryIdentityStore::new()))
    }

    /// Build state for `config.role`, resolving service-side identities
    /// through `identity_store`.
    pub fn new(config: GatewayConfig, identity_store: Arc<dyn IdentityStore>) -> Result<Self, StateError> {
        let codec = TokenCodec::new(config.jwt_secret.as_bytes());

        let chain = match config.role {
            EdgeRole::Gateway => build_chain(
                &config,
                Arc::new(BearerCredentials::new(codec.clone())),
                AuthType::Jwt,
            ),
            EdgeRole::Service => build_chain(
                &config,
                Arc::new(ApiTokenCredentials::new(codec.clone(), identity_store.clone())),
                AuthType::ApiToken,
            ),
        };
        tracing::info!(role = ?config.role, filters = ?chain.names(), "Filter chain built");

        let canary = CanaryRouter::new(CanaryConfig {
            enabled: config.canary_enabled,
            header_key: config.canary_header_key.clone(),
            header_values: config.canary_header_values.clone(),
            ip_rules: Arc::new(RuleSet::parse(&config.canary_ip_rules)),
            external_url: config.canary_external_url.clone(),
        });

        let forwarder = Forwarder::new(config.service_registry.clone(), config.upstream_timeout)?;

        let reset = PasswordResetFlow::new(
            codec.clone(),
            Arc::new(PendingStore::new(PENDING_RESET_CAPACITY, config.reset_token_expiration)),
            config.reset_ttl()?,
            Arc::new(LoggedDelivery),
        );

        // Reject unusable token lifetimes at startup rather than at login.
        config.session_ttl()?;

        Ok(Self {
            config: Arc::new(config),
            codec,
            chain: Arc::new(chain),
            routes: Arc::new(RouteTable::default_routes()),
            canary: Arc::new(canary),
            forwarder: Arc::new(forwarder),
            identity_store,
            reset: Arc::new(reset),
            started_at: Instant::now(),
        })
    }
}

fn build_chain(config: &GatewayConfig, resolver: Arc<dyn CredentialResolver>, auth: AuthType) -> FilterChain {
    let ip_rules = Arc::new(RuleSet::parse(&config.ip_whitelist));

    let filters: Vec<Arc<dyn Filter>> = vec![
        Arc::new(TraceFilter),
        Arc::new(SecurityHeadersFilter),
        Arc::new(MethodFilter::new(config.allowed_methods.clone(), auth)),
        Arc::new(ForbiddenPathFilter::new(config.forbidden_paths.clone(), auth)),
        Arc::new(BypassPathFilter::new(config.bypass_paths.clone(), resolver.clone())),
        Arc::new(CredentialPresenceFilter::new(resolver.clone())),
        Arc::new(CredentialVerifyFilter::new(resolver)),
        Arc::new(IdentityInjectionFilter),
        Arc::new(IpAdmissionFilter::new(
            config.ip_whitelist_enabled,
            ip_rules,
            config.protected_paths.clone(),
            config.exempt_paths.clone(),
        )),
    ];

    FilterChain::new(filters)
}
