// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-terminating errors and the JSON envelope they render to.
//!
//! Every rejection produced at the edge has the same body shape:
//!
//! ```json
//! {"success":false,"message":"Token has expired","code":401,
//!  "timestamp":1760000000000,"authType":"JWT"}
//! ```

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::auth::TokenError;

/// Which check produced a rejection. Serialized into `authType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    /// Gateway bearer-token checks.
    Jwt,
    /// Service-side `X-API-Token` checks.
    ApiToken,
    /// IP admission control.
    IpWhitelist,
    /// Routing and upstream failures.
    Gateway,
}

/// Terminal outcome of a filter or of the upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{source}")]
    Token { source: TokenError, auth: AuthType },

    #[error("Missing authentication credential")]
    MissingCredential(AuthType),

    #[error("{reason}")]
    InvalidCredential { reason: String, auth: AuthType },

    #[error("HTTP method {method} is not allowed")]
    MethodNotAllowed { method: String, auth: AuthType },

    #[error("Insufficient permissions")]
    InsufficientPermissions(AuthType),

    #[error("Access to this path is forbidden")]
    ForbiddenPath { path: String, auth: AuthType },

    #[error("IP address is not in the whitelist, access denied")]
    IpDenied { client_ip: String },

    #[error("Service {service} is temporarily unavailable, please retry later")]
    DownstreamUnavailable { service: String },

    #[error("Internal gateway error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Token { .. }
            | GatewayError::MissingCredential(_)
            | GatewayError::InvalidCredential { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::InsufficientPermissions(_)
            | GatewayError::ForbiddenPath { .. }
            | GatewayError::IpDenied { .. } => StatusCode::FORBIDDEN,
            GatewayError::DownstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn auth_type(&self) -> AuthType {
        match self {
            GatewayError::Token { auth, .. }
            | GatewayError::MissingCredential(auth)
            | GatewayError::InsufficientPermissions(auth)
            | GatewayError::InvalidCredential { auth, .. }
            | GatewayError::MethodNotAllowed { auth, .. }
            | GatewayError::ForbiddenPath { auth, .. } => *auth,
            GatewayError::IpDenied { .. } => AuthType::IpWhitelist,
            GatewayError::DownstreamUnavailable { .. } | GatewayError::Internal(_) => {
                AuthType::Gateway
            }
        }
    }

    /// Stable machine-readable code, used in logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Token { source, .. } => source.error_code(),
            GatewayError::MissingCredential(_) => "missing_credential",
            GatewayError::InvalidCredential { .. } => "invalid_credential",
            GatewayError::MethodNotAllowed { .. } => "method_not_allowed",
            GatewayError::InsufficientPermissions(_) => "insufficient_permissions",
            GatewayError::ForbiddenPath { .. } => "forbidden_path",
            GatewayError::IpDenied { .. } => "ip_denied",
            GatewayError::DownstreamUnavailable { .. } => "downstream_unavailable",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        let mut envelope = ErrorEnvelope::new(self.status_code(), self.to_string(), self.auth_type());
        match self {
            GatewayError::IpDenied { client_ip } => {
                envelope.client_ip = Some(client_ip.clone());
            }
            GatewayError::DownstreamUnavailable { service } => {
                envelope.fallback = Some(true);
                envelope.service = Some(service.clone());
            }
            _ => {}
        }
        envelope
    }
}

/// Structured error body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    pub code: u16,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub auth_type: AuthType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(status: StatusCode, message: impl Into<String>, auth_type: AuthType) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: status.as_u16(),
            timestamp: Utc::now().timestamp_millis(),
            auth_type,
            client_ip: None,
            fallback: None,
            service: None,
            suggestion: None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.envelope())).into_response()
    }
}

/// Handler-level error for the few endpoints the edge serves itself.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

/// `Json` body extractor whose rejections use the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorEnvelope::new(self.status, self.message, AuthType::Gateway));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn expired_token_renders_401_envelope() {
        let err = GatewayError::Token {
            source: TokenError::Expired,
            auth: AuthType::Jwt,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], 401);
        assert_eq!(body["authType"], "JWT");
        assert!(body["message"].as_str().unwrap().contains("expired"));
        assert!(body["timestamp"].as_i64().unwrap() > 0);
        assert!(body.get("clientIp").is_none());
    }

    #[tokio::test]
    async fn ip_denied_carries_client_ip() {
        let response = GatewayError::IpDenied {
            client_ip: "10.1.2.3".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["authType"], "IP_WHITELIST");
        assert_eq!(body["clientIp"], "10.1.2.3");
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        let method = GatewayError::MethodNotAllowed {
            method: "TRACE".to_string(),
            auth: AuthType::ApiToken,
        };
        assert_eq!(method.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(method.auth_type(), AuthType::ApiToken);

        let down = GatewayError::DownstreamUnavailable {
            service: "gym-server".to_string(),
        };
        assert_eq!(down.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(down.envelope().fallback, Some(true));
        assert_eq!(
            GatewayError::MissingCredential(AuthType::Jwt).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn api_error_uses_envelope() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["message"], "bad data");
        assert_eq!(body["code"], 400);
        assert_eq!(body["authType"], "GATEWAY");
    }
}
