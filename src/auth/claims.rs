// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::error::TokenError;
use super::roles::Role;

/// Numeric user identifier, as assigned by the identity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(UserId)
    }
}

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    /// Issued at login; accepted by the filter chain.
    Session,
    /// Issued by the forgot-password flow; accepted only by reset redemption.
    Reset,
}

/// Claims as they appear on the wire.
///
/// `sub` is a string per RFC 7519; `iat`/`exp` are Unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireClaims {
    pub sub: String,
    pub role: Role,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub purpose: TokenPurpose,
}

/// Verified claims.
///
/// Only produced by [`TokenCodec`](super::TokenCodec) after structure,
/// signature, expiry and purpose have all been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: UserId,
    pub role: Role,
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub purpose: TokenPurpose,
}

impl Claims {
    pub(crate) fn to_wire(&self) -> WireClaims {
        WireClaims {
            sub: self.subject.to_string(),
            role: self.role,
            email: self.email.clone(),
            iat: self.issued_at.timestamp(),
            exp: self.expires_at.timestamp(),
            purpose: self.purpose,
        }
    }

    pub(crate) fn from_wire(wire: WireClaims) -> Result<Self, TokenError> {
        let subject = wire.sub.parse().map_err(|_| TokenError::Malformed)?;
        let issued_at = timestamp(wire.iat)?;
        let expires_at = timestamp(wire.exp)?;

        Ok(Self {
            subject,
            role: wire.role,
            email: wire.email,
            issued_at,
            expires_at,
            purpose: wire.purpose,
        })
    }

    /// `true` once `now >= expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or(TokenError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_claims() -> Claims {
        Claims {
            subject: UserId(42),
            role: Role::Trainer,
            email: "coach@gym.test".to_string(),
            issued_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            expires_at: Utc.timestamp_opt(1_700_003_600, 0).unwrap(),
            purpose: TokenPurpose::Session,
        }
    }

    #[test]
    fn wire_form_keeps_subject_as_string() {
        let wire = sample_claims().to_wire();
        assert_eq!(wire.sub, "42");
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["purpose"], "session");
        assert_eq!(json["role"], "Trainer");
    }

    #[test]
    fn from_wire_rejects_non_numeric_subject() {
        let mut wire = sample_claims().to_wire();
        wire.sub = "user_42".to_string();
        assert_eq!(Claims::from_wire(wire), Err(TokenError::Malformed));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let claims = sample_claims();
        assert!(!claims.is_expired_at(claims.expires_at - chrono::Duration::seconds(1)));
        assert!(claims.is_expired_at(claims.expires_at));
    }
}
