// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Static service registry: logical service name to base URL.

use std::collections::HashMap;

use thiserror::Error;
use url::Url;

use crate::routing::Target;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("service registry entry `{0}` is not of the form name=url")]
    MalformedEntry(String),
    #[error("service `{name}` has an invalid URL `{url}`")]
    InvalidUrl { name: String, url: String },
}

#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Url>,
}

impl ServiceRegistry {
    /// Parse `gym-auth=http://auth:8081,gym-server=http://server:8082`.
    pub fn parse(csv: &str) -> Result<Self, RegistryError> {
        let mut services = HashMap::new();

        for entry in csv.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, url) = entry
                .split_once('=')
                .map(|(n, u)| (n.trim(), u.trim()))
                .filter(|(n, u)| !n.is_empty() && !u.is_empty())
                .ok_or_else(|| RegistryError::MalformedEntry(entry.to_string()))?;

            let parsed = Url::parse(url).map_err(|_| RegistryError::InvalidUrl {
                name: name.to_string(),
                url: url.to_string(),
            })?;
            services.insert(name.to_string(), parsed);
        }

        Ok(Self { services })
    }

    pub fn with_service(mut self, name: impl Into<String>, url: Url) -> Self {
        self.services.insert(name.into(), url);
        self
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Base URL for `target`. Literal targets resolve to themselves.
    pub fn resolve(&self, target: &Target) -> Option<Url> {
        match target {
            Target::LoadBalanced(name) => self.services.get(name).cloned(),
            Target::Url(url) => Some(url.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries() {
        let registry =
            ServiceRegistry::parse(" gym-auth=http://auth:8081 , gym-server=http://server:8082/,").unwrap();
        assert_eq!(registry.names(), vec!["gym-auth", "gym-server"]);

        let url = registry
            .resolve(&Target::LoadBalanced("gym-auth".into()))
            .unwrap();
        assert_eq!(url.as_str(), "http://auth:8081/");
        assert!(registry
            .resolve(&Target::LoadBalanced("gym-auth-canary".into()))
            .is_none());
    }

    #[test]
    fn rejects_malformed_entries() {
        assert_eq!(
            ServiceRegistry::parse("gym-auth").unwrap_err(),
            RegistryError::MalformedEntry("gym-auth".into())
        );
        assert!(matches!(
            ServiceRegistry::parse("gym-auth=not a url"),
            Err(RegistryError::InvalidUrl { .. })
        ));
        assert!(ServiceRegistry::parse("").unwrap().is_empty());
    }
}
