// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity store collaborator and the resolved identity context.
//!
//! The user store itself lives in the business service. The pipeline only
//! needs to look a user up by id (service-side credential check) or email
//! (password reset), so it talks to it through [`IdentityStore`].

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::claims::{Claims, UserId};
use super::roles::Role;

/// Account lifecycle state as kept by the user service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Pending,
    Approved,
    Suspended,
}

/// User record returned by the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "userID", alias = "userId")]
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    pub account_status: AccountStatus,
}

impl UserRecord {
    pub fn is_approved(&self) -> bool {
        self.account_status == AccountStatus::Approved
    }
}

#[derive(Debug, Error)]
pub enum IdentityStoreError {
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

/// Lookup interface onto the user service.
///
/// Calls are blocking; the service-side chain invokes them from a blocking
/// worker thread.
pub trait IdentityStore: Send + Sync {
    fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, IdentityStoreError>;
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, IdentityStoreError>;
}

/// Fixed in-process user table. Used in tests and when no remote store is
/// configured.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    users: HashMap<UserId, UserRecord>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: UserRecord) -> Self {
        self.users.insert(user.id, user);
        self
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, IdentityStoreError> {
        Ok(self.users.get(&id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, IdentityStoreError> {
        Ok(self
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

/// Identity store backed by the user service's internal HTTP API
/// (`GET {base}/internal/users/{id}`, `GET {base}/internal/users/email/{email}`).
///
/// Must be called from a blocking context (e.g. `spawn_blocking`), never from
/// an async task.
pub struct HttpIdentityStore {
    base_url: String,
    client: reqwest::Client,
    runtime: tokio::runtime::Handle,
}

impl HttpIdentityStore {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self, IdentityStoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityStoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            runtime,
        })
    }

    fn fetch(&self, url: String) -> Result<Option<UserRecord>, IdentityStoreError> {
        self.runtime.block_on(async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| IdentityStoreError::Unavailable(e.to_string()))?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !response.status().is_success() {
                return Err(IdentityStoreError::Unavailable(format!(
                    "HTTP {} from identity store",
                    response.status()
                )));
            }

            let envelope: StoreEnvelope = response
                .json()
                .await
                .map_err(|e| IdentityStoreError::Unavailable(e.to_string()))?;
            Ok(envelope.data)
        })
    }
}

/// The user service wraps payloads as `{ "data": ... }`.
#[derive(Deserialize)]
struct StoreEnvelope {
    #[serde(default)]
    data: Option<UserRecord>,
}

impl IdentityStore for HttpIdentityStore {
    fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, IdentityStoreError> {
        self.fetch(format!("{}/internal/users/{}", self.base_url, id))
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, IdentityStoreError> {
        let mut url = url::Url::parse(&format!("{}/internal/users/email/", self.base_url))
            .map_err(|e| IdentityStoreError::Unavailable(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| IdentityStoreError::Unavailable("base url cannot be a base".to_string()))?
            .pop_if_empty()
            .push(email);
        self.fetch(url.to_string())
    }
}

/// Identity resolved for the current request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    pub user_id: UserId,
    pub role: Role,
    pub email: String,
    /// The credential the identity was resolved from.
    #[serde(skip)]
    pub token: String,
}

impl IdentityContext {
    pub fn from_claims(claims: &Claims, token: &str) -> Self {
        Self {
            user_id: claims.subject,
            role: claims.role,
            email: claims.email.clone(),
            token: token.to_string(),
        }
    }

    pub fn from_record(user: &UserRecord, token: &str) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            email: user.email.clone(),
            token: token.to_string(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
