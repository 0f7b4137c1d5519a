// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`GatewayConfig`] loaded
//! from them once at startup. The loaded config is shared as
//! `Arc<GatewayConfig>` and never mutated.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `EDGE_ROLE` | `gateway` or `service` | `gateway` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | unset |
//! | `JWT_SECRET` | Shared token signing key | Required in release builds |
//! | `JWT_EXPIRATION_MS` | Session token lifetime | `86400000` |
//! | `RESET_TOKEN_EXPIRATION_MS` | Reset token lifetime | `900000` |
//! | `ALLOWED_METHODS` | Method allow-list | `GET,POST,PUT,DELETE,OPTIONS` |
//! | `FORBIDDEN_PATHS` | Always-rejected path patterns | empty |
//! | `BYPASS_PATHS` | Paths that need no credential | per role |
//! | `IP_WHITELIST_ENABLED` | IP admission on protected paths | `false` |
//! | `IP_WHITELIST` | `;`-separated IP rules | `127.0.0.1` |
//! | `PROTECTED_PATHS` | Paths under IP admission | `/admin/**,/internal/**` |
//! | `EXEMPT_PATHS` | Paths never under IP admission | `/health/**,/actuator/**` |
//! | `CANARY_ENABLED` | Canary routing | `false` |
//! | `CANARY_HEADER_KEY` | Canary header | `X-Canary-Flag` |
//! | `CANARY_HEADER_VALUES` | Accepted canary header values | `canary,test,beta` |
//! | `CANARY_IP_RULES` | `;`-separated canary IP rules | `127.0.0.1` |
//! | `CANARY_EXTERNAL_URL` | Literal canary target | unset |
//! | `SERVICE_REGISTRY` | `name=url,...` upstream map | empty |
//! | `UPSTREAM_TIMEOUT_MS` | Per-attempt upstream timeout | `10000` |
//! | `IDENTITY_STORE_URL` | User service base URL (service role) | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! Malformed numbers and booleans fall back to their default with a warning.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::{HeaderName, Method};
use thiserror::Error;

use crate::policy::PatternList;
use crate::upstream::{RegistryError, ServiceRegistry};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const EDGE_ROLE_ENV: &str = "EDGE_ROLE";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

/// Shared HS256 key. Every service that verifies tokens must use the same
/// value.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_EXPIRATION_MS_ENV: &str = "JWT_EXPIRATION_MS";
pub const RESET_TOKEN_EXPIRATION_MS_ENV: &str = "RESET_TOKEN_EXPIRATION_MS";

pub const ALLOWED_METHODS_ENV: &str = "ALLOWED_METHODS";
pub const FORBIDDEN_PATHS_ENV: &str = "FORBIDDEN_PATHS";
pub const BYPASS_PATHS_ENV: &str = "BYPASS_PATHS";

pub const IP_WHITELIST_ENABLED_ENV: &str = "IP_WHITELIST_ENABLED";
/// `;`-separated rules; `0.0` allows and `0` denies every address.
pub const IP_WHITELIST_ENV: &str = "IP_WHITELIST";
pub const PROTECTED_PATHS_ENV: &str = "PROTECTED_PATHS";
pub const EXEMPT_PATHS_ENV: &str = "EXEMPT_PATHS";

pub const CANARY_ENABLED_ENV: &str = "CANARY_ENABLED";
pub const CANARY_HEADER_KEY_ENV: &str = "CANARY_HEADER_KEY";
pub const CANARY_HEADER_VALUES_ENV: &str = "CANARY_HEADER_VALUES";
pub const CANARY_IP_RULES_ENV: &str = "CANARY_IP_RULES";
pub const CANARY_EXTERNAL_URL_ENV: &str = "CANARY_EXTERNAL_URL";

/// `name=url` pairs, comma-separated; `lb://name` targets resolve here.
pub const SERVICE_REGISTRY_ENV: &str = "SERVICE_REGISTRY";
pub const UPSTREAM_TIMEOUT_MS_ENV: &str = "UPSTREAM_TIMEOUT_MS";
pub const IDENTITY_STORE_URL_ENV: &str = "IDENTITY_STORE_URL";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_JWT_EXPIRATION_MS: u64 = 86_400_000;
const DEFAULT_RESET_TOKEN_EXPIRATION_MS: u64 = 900_000;
const DEFAULT_ALLOWED_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";
const DEFAULT_IP_WHITELIST: &str = "127.0.0.1";
const DEFAULT_PROTECTED_PATHS: &str = "/admin/**,/internal/**";
const DEFAULT_EXEMPT_PATHS: &str = "/health/**,/actuator/**";
const DEFAULT_CANARY_HEADER_KEY: &str = "X-Canary-Flag";
const DEFAULT_CANARY_HEADER_VALUES: &str = "canary,test,beta";
const DEFAULT_CANARY_IP_RULES: &str = "127.0.0.1";
const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 10_000;

/// Public gateway endpoints: sign-in/up flows, health, docs and static files.
pub const GATEWAY_BYPASS_PATHS: &str = "/auth/**,\
    /api/user/signup,/api/user/verify-code,/api/user/login,\
    /api/user/forgot-password,/api/user/reset-password,/api/user/google-login,\
    /health/**,/actuator/**,\
    /doc.html,/swagger-resources/**,/webjars/**,/v2/api-docs,/static/**,\
    /actuator/gateway/**";

/// Public authentication-service endpoints. Sign-in and sign-up live in the
/// business service, which issues the session tokens this service checks.
pub const SERVICE_BYPASS_PATHS: &str = "/health/**,/forgot-password,/reset-password";

/// Only used when `JWT_SECRET` is unset in a debug build.
const DEV_JWT_SECRET: &str = "edge-gate-development-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Which chain profile this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRole {
    /// Public edge: bearer tokens, routing to upstreams.
    Gateway,
    /// Authentication service: `X-API-Token`, identity store lookups.
    Service,
}

impl FromStr for EdgeRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gateway" => Ok(EdgeRole::Gateway),
            "service" | "auth" => Ok(EdgeRole::Service),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub role: EdgeRole,
    pub tls: Option<TlsPaths>,

    pub jwt_secret: String,
    pub jwt_expiration: Duration,
    pub reset_token_expiration: Duration,

    pub allowed_methods: Vec<Method>,
    pub forbidden_paths: PatternList,
    pub bypass_paths: PatternList,

    pub ip_whitelist_enabled: bool,
    pub ip_whitelist: String,
    pub protected_paths: PatternList,
    pub exempt_paths: PatternList,

    pub canary_enabled: bool,
    pub canary_header_key: Option<HeaderName>,
    pub canary_header_values: Vec<String>,
    pub canary_ip_rules: String,
    pub canary_external_url: Option<String>,

    pub service_registry: ServiceRegistry,
    pub upstream_timeout: Duration,
    pub identity_store_url: Option<String>,

    pub log_format: LogFormat,
}

impl GatewayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` for variable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let role = env.parsed(EDGE_ROLE_ENV, EdgeRole::Gateway);
        let default_bypass = match role {
            EdgeRole::Gateway => GATEWAY_BYPASS_PATHS,
            EdgeRole::Service => SERVICE_BYPASS_PATHS,
        };

        let tls = match (env.get(TLS_CERT_PATH_ENV), env.get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths { cert, key }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let jwt_secret = match env.get(JWT_SECRET_ENV) {
            Some(secret) => secret,
            None if cfg!(debug_assertions) => {
                tracing::warn!("{JWT_SECRET_ENV} not set, using the development signing key");
                DEV_JWT_SECRET.to_string()
            }
            None => return Err(ConfigError::Missing(JWT_SECRET_ENV)),
        };

        let canary_header_key = env
            .get_or(CANARY_HEADER_KEY_ENV, DEFAULT_CANARY_HEADER_KEY)
            .trim()
            .to_string();
        let canary_header_key = if canary_header_key.is_empty() {
            None
        } else {
            Some(HeaderName::from_str(&canary_header_key).map_err(|_| ConfigError::Invalid {
                name: CANARY_HEADER_KEY_ENV,
                value: canary_header_key.clone(),
            })?)
        };

        Ok(Self {
            host: env.get_or(HOST_ENV, DEFAULT_HOST),
            port: env.parsed(PORT_ENV, DEFAULT_PORT),
            role,
            tls,

            jwt_secret,
            jwt_expiration: env.millis(JWT_EXPIRATION_MS_ENV, DEFAULT_JWT_EXPIRATION_MS),
            reset_token_expiration: env.millis(
                RESET_TOKEN_EXPIRATION_MS_ENV,
                DEFAULT_RESET_TOKEN_EXPIRATION_MS,
            ),

            allowed_methods: parse_methods(&env.get_or(ALLOWED_METHODS_ENV, DEFAULT_ALLOWED_METHODS))?,
            forbidden_paths: PatternList::parse(&env.get_or(FORBIDDEN_PATHS_ENV, "")),
            bypass_paths: PatternList::parse(&env.get_or(BYPASS_PATHS_ENV, default_bypass)),

            ip_whitelist_enabled: env.flag(IP_WHITELIST_ENABLED_ENV, false),
            ip_whitelist: env.get_or(IP_WHITELIST_ENV, DEFAULT_IP_WHITELIST),
            protected_paths: PatternList::parse(&env.get_or(PROTECTED_PATHS_ENV, DEFAULT_PROTECTED_PATHS)),
            exempt_paths: PatternList::parse(&env.get_or(EXEMPT_PATHS_ENV, DEFAULT_EXEMPT_PATHS)),

            canary_enabled: env.flag(CANARY_ENABLED_ENV, false),
            canary_header_key,
            canary_header_values: split_csv(&env.get_or(
                CANARY_HEADER_VALUES_ENV,
                DEFAULT_CANARY_HEADER_VALUES,
            )),
            canary_ip_rules: env.get_or(CANARY_IP_RULES_ENV, DEFAULT_CANARY_IP_RULES),
            canary_external_url: env.get(CANARY_EXTERNAL_URL_ENV).filter(|u| !u.trim().is_empty()),

            service_registry: ServiceRegistry::parse(&env.get_or(SERVICE_REGISTRY_ENV, ""))?,
            upstream_timeout: env.millis(UPSTREAM_TIMEOUT_MS_ENV, DEFAULT_UPSTREAM_TIMEOUT_MS),
            identity_store_url: env.get(IDENTITY_STORE_URL_ENV).filter(|u| !u.trim().is_empty()),

            log_format: log_format_from(env.get(LOG_FORMAT_ENV).as_deref()),
        })
    }

    pub fn session_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        token_ttl(JWT_EXPIRATION_MS_ENV, self.jwt_expiration)
    }

    pub fn reset_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        token_ttl(RESET_TOKEN_EXPIRATION_MS_ENV, self.reset_token_expiration)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            name: HOST_ENV,
            value: raw,
        })
    }
}

/// `LOG_FORMAT=json` selects JSON output; anything else is pretty.
pub fn log_format_from(value: Option<&str>) -> LogFormat {
    match value {
        Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

struct Env<F: Fn(&str) -> Option<String>>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }

    fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, name: &str, default: T) -> T {
        match self.get(name) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(variable = name, value = %raw, "Invalid value, using default");
                default
            }),
        }
    }

    fn flag(&self, name: &str, default: bool) -> bool {
        match self.get(name).map(|v| v.trim().to_ascii_lowercase()) {
            None => default,
            Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => false,
            Some(v) => {
                tracing::warn!(variable = name, value = %v, "Invalid boolean, using default");
                default
            }
        }
    }

    fn millis(&self, name: &str, default: u64) -> Duration {
        Duration::from_millis(self.parsed(name, default))
    }
}

fn token_ttl(name: &'static str, ttl: Duration) -> Result<chrono::Duration, ConfigError> {
    chrono::Duration::from_std(ttl)
        .ok()
        .filter(|d| *d > chrono::Duration::zero() && *d < chrono::Duration::days(3650))
        .ok_or_else(|| ConfigError::Invalid {
            name,
            value: ttl.as_millis().to_string(),
        })
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_methods(raw: &str) -> Result<Vec<Method>, ConfigError> {
    split_csv(raw)
        .into_iter()
        .map(|m| {
            Method::from_str(&m.to_ascii_uppercase()).map_err(|_| ConfigError::Invalid {
                name: ALLOWED_METHODS_ENV,
                value: m,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(move |name| map.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.role, EdgeRole::Gateway);
        assert_eq!(config.jwt_expiration, Duration::from_millis(86_400_000));
        assert_eq!(config.reset_token_expiration, Duration::from_secs(900));
        assert_eq!(config.allowed_methods.len(), 5);
        assert!(config.bypass_paths.matches("/auth/login"));
        assert!(config.bypass_paths.matches("/api/user/google-login"));
        assert!(!config.ip_whitelist_enabled);
        assert_eq!(config.ip_whitelist, "127.0.0.1");
        assert_eq!(config.canary_header_values, vec!["canary", "test", "beta"]);
        assert_eq!(config.canary_header_key.unwrap().as_str(), "x-canary-flag");
        assert!(config.tls.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn service_role_has_its_own_bypass_list() {
        let config = load(&[(EDGE_ROLE_ENV, "service")]).unwrap();
        assert_eq!(config.role, EdgeRole::Service);
        assert!(config.bypass_paths.matches("/forgot-password"));
        assert!(!config.bypass_paths.matches("/login"));
        assert!(!config.bypass_paths.matches("/auth/login"));
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let config = load(&[
            (PORT_ENV, "eighty"),
            (IP_WHITELIST_ENABLED_ENV, "maybe"),
            (CANARY_ENABLED_ENV, "TRUE"),
            (UPSTREAM_TIMEOUT_MS_ENV, "-5"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!(!config.ip_whitelist_enabled);
        assert!(config.canary_enabled);
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
    }

    #[test]
    fn methods_are_case_insensitive() {
        let config = load(&[(ALLOWED_METHODS_ENV, "get, post")]).unwrap();
        assert_eq!(config.allowed_methods, vec![Method::GET, Method::POST]);
    }

    #[test]
    fn half_configured_tls_is_an_error() {
        assert!(matches!(
            load(&[(TLS_CERT_PATH_ENV, "/etc/cert.pem")]),
            Err(ConfigError::Missing(TLS_KEY_PATH_ENV))
        ));
    }

    #[test]
    fn bad_registry_is_an_error() {
        assert!(matches!(
            load(&[(SERVICE_REGISTRY_ENV, "gym-auth")]),
            Err(ConfigError::Registry(_))
        ));
    }

    #[test]
    fn zero_token_lifetime_is_rejected() {
        let config = load(&[(JWT_EXPIRATION_MS_ENV, "0")]).unwrap();
        assert!(config.session_ttl().is_err());
        assert_eq!(load(&[]).unwrap().reset_ttl().unwrap(), chrono::Duration::minutes(15));
    }

    #[test]
    fn bind_addr_combines_host_and_port() {
        let config = load(&[(HOST_ENV, "127.0.0.1"), (PORT_ENV, "9090")]).unwrap();
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:9090");
    }
}
