// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password-reset token flow.
//!
//! 1. `begin` looks the account up by email, issues a `reset`-purpose token
//!    and records a pending reset keyed by the normalised email.
//! 2. The link is handed to a [`ResetDelivery`] (mail lives elsewhere).
//! 3. `redeem` verifies the token as a reset token and consumes the pending
//!    record, so each link works once and only the newest link works.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::claims::{Claims, UserId};
use super::codec::{IssuedToken, TokenCodec};
use super::error::TokenError;
use super::identity::{IdentityStore, IdentityStoreError};
use super::pending::PendingStore;

/// Pending reset, keyed by lowercase email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReset {
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ResetError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("no account is registered for this email")]
    UnknownAccount,
    #[error("account is not eligible for password reset")]
    NotEligible,
    #[error("reset link was already used or has been superseded")]
    NotPending,
    #[error(transparent)]
    Store(#[from] IdentityStoreError),
}

/// Hands a freshly issued reset token to the user.
pub trait ResetDelivery: Send + Sync {
    fn deliver(&self, email: &str, token: &str);
}

/// Delivery that only records the event; mail is sent by the business
/// service.
pub struct LoggedDelivery;

impl ResetDelivery for LoggedDelivery {
    fn deliver(&self, email: &str, _token: &str) {
        tracing::info!(email = %email, "Password reset token issued");
    }
}

pub struct PasswordResetFlow {
    codec: TokenCodec,
    pending: Arc<PendingStore<String, PendingReset>>,
    ttl: Duration,
    delivery: Arc<dyn ResetDelivery>,
}

impl PasswordResetFlow {
    pub fn new(
        codec: TokenCodec,
        pending: Arc<PendingStore<String, PendingReset>>,
        ttl: Duration,
        delivery: Arc<dyn ResetDelivery>,
    ) -> Self {
        Self {
            codec,
            pending,
            ttl,
            delivery,
        }
    }

    /// Start a reset for `email`.
    pub fn begin(&self, store: &dyn IdentityStore, email: &str) -> Result<IssuedToken, ResetError> {
        let user = store
            .find_by_email(email.trim())?
            .ok_or(ResetError::UnknownAccount)?;

        if !user.is_approved() {
            return Err(ResetError::NotEligible);
        }

        let issued = self
            .codec
            .issue_reset(user.id, user.role, &user.email, self.ttl)?;

        self.pending.put(
            normalise(&user.email),
            PendingReset {
                user_id: user.id,
                issued_at: issued.claims.issued_at,
            },
        );
        self.delivery.deliver(&user.email, &issued.token);

        Ok(issued)
    }

    /// Redeem a reset token. Returns the verified claims of the account
    /// whose password may now be changed.
    pub fn redeem(&self, token: &str) -> Result<Claims, ResetError> {
        let claims = self.codec.verify_reset(token)?;
        let key = normalise(&claims.email);

        self.pending
            .take_if(&key, |pending| {
                pending.user_id == claims.subject && pending.issued_at == claims.issued_at
            })
            .map(|_| claims)
            .ok_or(ResetError::NotPending)
    }
}

fn normalise(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::{AccountStatus, InMemoryIdentityStore, UserRecord};
    use crate::auth::roles::Role;

    fn store() -> InMemoryIdentityStore {
        InMemoryIdentityStore::new()
            .with_user(UserRecord {
                id: UserId(1),
                email: "Ann@Gym.test".to_string(),
                name: "Ann".to_string(),
                role: Role::Member,
                account_status: AccountStatus::Approved,
            })
            .with_user(UserRecord {
                id: UserId(2),
                email: "new@gym.test".to_string(),
                name: "New".to_string(),
                role: Role::Trainer,
                account_status: AccountStatus::Pending,
            })
    }

    fn flow() -> PasswordResetFlow {
        PasswordResetFlow::new(
            TokenCodec::new(b"reset-flow-test-key-0123456789abcdef"),
            Arc::new(PendingStore::new(16, std::time::Duration::from_secs(900))),
            Duration::minutes(15),
            Arc::new(LoggedDelivery),
        )
    }

    #[test]
    fn reset_token_redeems_once() {
        let flow = flow();
        let issued = flow.begin(&store(), "ann@gym.test").unwrap();

        let claims = flow.redeem(&issued.token).unwrap();
        assert_eq!(claims.subject, UserId(1));
        assert!(matches!(flow.redeem(&issued.token), Err(ResetError::NotPending)));
    }

    #[test]
    fn unknown_and_ineligible_accounts_are_refused() {
        let flow = flow();
        assert!(matches!(
            flow.begin(&store(), "ghost@gym.test"),
            Err(ResetError::UnknownAccount)
        ));
        assert!(matches!(
            flow.begin(&store(), "new@gym.test"),
            Err(ResetError::NotEligible)
        ));
    }

    #[test]
    fn concurrent_redeems_succeed_once() {
        use std::sync::Barrier;

        for _ in 0..200 {
            let flow = Arc::new(flow());
            let token = flow.begin(&store(), "ann@gym.test").unwrap().token;
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let flow = flow.clone();
                    let token = token.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        flow.redeem(&token).is_ok()
                    })
                })
                .collect();

            let successes = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count();
            assert_eq!(successes, 1);
        }
    }

    #[test]
    fn superseded_token_leaves_newest_usable() {
        let flow = flow();
        let first = flow.begin(&store(), "ann@gym.test").unwrap();
        // Reset tokens carry second-resolution timestamps.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let second = flow.begin(&store(), "ann@gym.test").unwrap();

        assert!(matches!(flow.redeem(&first.token), Err(ResetError::NotPending)));
        assert!(flow.redeem(&second.token).is_ok());
    }

    #[test]
    fn session_token_cannot_redeem() {
        let flow = flow();
        let session = flow
            .codec
            .issue(UserId(1), Role::Member, "ann@gym.test", Duration::minutes(5))
            .unwrap();

        assert!(matches!(
            flow.redeem(&session.token),
            Err(ResetError::Token(TokenError::WrongPurpose))
        ));
    }
}
