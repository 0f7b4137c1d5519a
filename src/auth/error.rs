// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token errors.

use thiserror::Error;

/// Failure modes of token issuance and verification.
///
/// Verification reports the first failing check in this order: structure,
/// signature, expiry, purpose.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Not a decodable three-part token, or the claims do not parse.
    #[error("Token is malformed")]
    Malformed,
    /// Signature does not verify against the signing key.
    #[error("Token signature is invalid")]
    BadSignature,
    /// `now >= expiresAt`.
    #[error("Token has expired")]
    Expired,
    /// A reset token was presented where a session token is expected, or the
    /// reverse.
    #[error("Token is not valid for this purpose")]
    WrongPurpose,
    /// The signing backend rejected the claims.
    #[error("Failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    /// Stable machine-readable code, used in logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed_token",
            TokenError::BadSignature => "bad_signature",
            TokenError::Expired => "token_expired",
            TokenError::WrongPurpose => "wrong_purpose",
            TokenError::Signing(_) => "signing_error",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_mention_the_failure() {
        assert_eq!(TokenError::Expired.to_string(), "Token has expired");
        assert_eq!(TokenError::BadSignature.error_code(), "bad_signature");
    }

    #[test]
    fn jsonwebtoken_kinds_are_classified() {
        use jsonwebtoken::errors::{Error, ErrorKind};

        assert_eq!(
            TokenError::from(Error::from(ErrorKind::InvalidSignature)),
            TokenError::BadSignature
        );
        assert_eq!(
            TokenError::from(Error::from(ErrorKind::InvalidToken)),
            TokenError::Malformed
        );
    }
}
