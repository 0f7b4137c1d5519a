// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed token issuance and verification (HS256).
//!
//! Tokens are standard compact JWTs. Besides `sub`/`iat`/`exp` they carry the
//! user's `role`, `email`, and a `purpose` claim that scopes the token either
//! to regular sessions or to password reset.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::claims::{Claims, TokenPurpose, UserId, WireClaims};
use super::error::TokenError;
use super::roles::Role;

/// A freshly signed token together with the claims it encodes.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Symmetric-key token codec.
///
/// Pure and side-effect free: the same codec instance is shared by the
/// gateway and the service-side chain.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec from the shared signing key.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against an explicit `now` in `verify_at`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a session token valid for `ttl`.
    pub fn issue(
        &self,
        user_id: UserId,
        role: Role,
        email: &str,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, role, email, ttl, TokenPurpose::Session, Utc::now())
    }

    /// Issue a password-reset token valid for `ttl`.
    pub fn issue_reset(
        &self,
        user_id: UserId,
        role: Role,
        email: &str,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, role, email, ttl, TokenPurpose::Reset, Utc::now())
    }

    /// Issue a token with an explicit issue time.
    pub fn issue_at(
        &self,
        user_id: UserId,
        role: Role,
        email: &str,
        ttl: Duration,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        // Claims are second-granular on the wire; truncate so the returned
        // claims equal what `verify` will decode.
        let issued_at = whole_seconds(now)?;
        let expires_at = whole_seconds(issued_at + ttl)?;

        let claims = Claims {
            subject: user_id,
            role,
            email: email.to_string(),
            issued_at,
            expires_at,
            purpose,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims.to_wire(), &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }

    /// Verify a session token.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, TokenPurpose::Session, Utc::now())
    }

    /// Verify a password-reset token.
    pub fn verify_reset(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, TokenPurpose::Reset, Utc::now())
    }

    /// Verify `token` for `purpose` as of `now`.
    ///
    /// Checks structure, then signature, then expiry, then purpose. Claims are
    /// returned only when every check passes.
    pub fn verify_at(
        &self,
        token: &str,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        let data = decode::<WireClaims>(token.trim(), &self.decoding, &self.validation)?;
        let claims = Claims::from_wire(data.claims)?;

        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        if claims.purpose != purpose {
            return Err(TokenError::WrongPurpose);
        }

        Ok(claims)
    }
}

fn whole_seconds(t: DateTime<Utc>) -> Result<DateTime<Utc>, TokenError> {
    Utc.timestamp_opt(t.timestamp(), 0)
        .single()
        .ok_or_else(|| TokenError::Signing("timestamp out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const SECRET: &[u8] = b"unit-test-signing-key-0123456789abcdef";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET)
    }

    #[test]
    fn verify_returns_issued_claims() {
        let codec = codec();
        let issued = codec
            .issue(UserId(7), Role::Member, "m@gym.test", Duration::hours(1))
            .unwrap();

        let claims = codec.verify(&issued.token).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.subject, UserId(7));
        assert_eq!(claims.role, Role::Member);
        assert_eq!(claims.email, "m@gym.test");
        assert_eq!(claims.expires_at - claims.issued_at, Duration::hours(1));
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec();
        let two_hours_ago = Utc::now() - Duration::hours(2);
        let issued = codec
            .issue_at(
                UserId(1),
                Role::Admin,
                "a@gym.test",
                Duration::hours(1),
                TokenPurpose::Session,
                two_hours_ago,
            )
            .unwrap();

        assert_eq!(codec.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn token_expires_exactly_at_expiry() {
        let codec = codec();
        let now = Utc.timestamp_opt(1_800_000_000, 0).unwrap();
        let issued = codec
            .issue_at(UserId(1), Role::Member, "x@gym.test", Duration::seconds(30), TokenPurpose::Session, now)
            .unwrap();

        let just_before = now + Duration::seconds(29);
        let at_expiry = now + Duration::seconds(30);
        assert!(codec.verify_at(&issued.token, TokenPurpose::Session, just_before).is_ok());
        assert_eq!(
            codec.verify_at(&issued.token, TokenPurpose::Session, at_expiry),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn foreign_key_fails_signature() {
        let issued = codec()
            .issue(UserId(1), Role::Member, "x@gym.test", Duration::hours(1))
            .unwrap();
        let other = TokenCodec::new(b"some-other-signing-key-fedcba9876543210");

        assert_eq!(other.verify(&issued.token), Err(TokenError::BadSignature));
    }

    #[test]
    fn tampered_payload_fails_signature() {
        let codec = codec();
        let issued = codec
            .issue(UserId(1), Role::Member, "x@gym.test", Duration::hours(1))
            .unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();

        let mut wire = issued.claims.to_wire();
        wire.role = Role::Admin;
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&wire).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(codec.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.verify("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(codec.verify(""), Err(TokenError::Malformed));
        assert_eq!(codec.verify("a.b.c"), Err(TokenError::Malformed));
    }

    #[test]
    fn expired_signature_check_precedes_expiry() {
        let expired = codec()
            .issue_at(
                UserId(1),
                Role::Member,
                "x@gym.test",
                Duration::seconds(1),
                TokenPurpose::Session,
                Utc::now() - Duration::days(1),
            )
            .unwrap();
        let other = TokenCodec::new(b"some-other-signing-key-fedcba9876543210");

        assert_eq!(other.verify(&expired.token), Err(TokenError::BadSignature));
    }

    #[test]
    fn purposes_do_not_cross() {
        let codec = codec();
        let reset = codec
            .issue_reset(UserId(3), Role::Member, "r@gym.test", Duration::minutes(15))
            .unwrap();
        let session = codec
            .issue(UserId(3), Role::Member, "r@gym.test", Duration::minutes(15))
            .unwrap();

        assert_eq!(codec.verify(&reset.token), Err(TokenError::WrongPurpose));
        assert_eq!(codec.verify_reset(&session.token), Err(TokenError::WrongPurpose));
        assert_eq!(codec.verify_reset(&reset.token).unwrap().purpose, TokenPurpose::Reset);
    }
}
