// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Degraded responses served when an upstream cannot be reached.

use std::str::FromStr;

use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::error::{AuthType, ErrorEnvelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    Auth,
    Server,
    Admin,
    Health,
    Default,
}

impl FallbackKind {
    pub fn service(&self) -> &'static str {
        match self {
            FallbackKind::Auth => "gym-auth",
            FallbackKind::Server => "gym-server",
            FallbackKind::Admin => "gym-admin",
            FallbackKind::Health => "health-check",
            FallbackKind::Default => "unknown",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FallbackKind::Auth => {
                "Authentication service is temporarily unavailable, please retry later. \
                 If the problem persists, contact the system administrator."
            }
            FallbackKind::Server => {
                "Service is busy, please retry later. We are working on restoring it."
            }
            FallbackKind::Admin => {
                "Administration is temporarily unavailable, please retry later or contact support."
            }
            FallbackKind::Health => "Health check service is unavailable",
            FallbackKind::Default => "Service is temporarily unavailable, please retry later.",
        }
    }

    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            FallbackKind::Auth => Some("Check your network connection or retry later"),
            FallbackKind::Server => Some("Retry later"),
            FallbackKind::Admin => Some("Contact technical support or retry later"),
            FallbackKind::Health | FallbackKind::Default => None,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let mut envelope = ErrorEnvelope::new(
            StatusCode::SERVICE_UNAVAILABLE,
            self.message(),
            AuthType::Gateway,
        );
        envelope.fallback = Some(true);
        envelope.service = Some(self.service().to_string());
        envelope.suggestion = self.suggestion().map(str::to_string);
        envelope
    }
}

impl FromStr for FallbackKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(FallbackKind::Auth),
            "server" => Ok(FallbackKind::Server),
            "admin" => Ok(FallbackKind::Admin),
            "health" => Ok(FallbackKind::Health),
            "default" => Ok(FallbackKind::Default),
            _ => Err(()),
        }
    }
}

impl IntoResponse for FallbackKind {
    fn into_response(self) -> axum::response::Response {
        tracing::warn!(service = self.service(), "Serving fallback response");
        (StatusCode::SERVICE_UNAVAILABLE, Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_marks_fallback() {
        let envelope = FallbackKind::Admin.envelope();
        assert_eq!(envelope.code, 503);
        assert_eq!(envelope.fallback, Some(true));
        assert_eq!(envelope.service.as_deref(), Some("gym-admin"));
        assert!(envelope.suggestion.is_some());
    }

    #[test]
    fn parses_path_names() {
        assert_eq!("server".parse::<FallbackKind>(), Ok(FallbackKind::Server));
        assert!("nope".parse::<FallbackKind>().is_err());
    }
}
