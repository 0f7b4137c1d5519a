// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auth-service endpoints: password reset and identity echo.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{AdminOnly, Auth, IdentityContext, IdentityStoreError, ResetError, UserId};
use crate::error::{ApiError, AuthType, GatewayError, JsonBody};
use crate::state::AppState;

const IDENTITY_STORE: &str = "identity-store";

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// `POST /forgot-password`
///
/// Unknown and ineligible accounts get the same answer as known ones.
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<AccountResponse>, GatewayError> {
    let reset = state.reset.clone();
    let store = state.identity_store.clone();
    let email = request.email;

    let outcome = tokio::task::spawn_blocking(move || reset.begin(store.as_ref(), &email))
        .await
        .map_err(|e| GatewayError::Internal(format!("reset task failed: {e}")))?;

    match outcome {
        Ok(_) | Err(ResetError::UnknownAccount) | Err(ResetError::NotEligible) => {}
        Err(ResetError::Store(e)) => return Err(store_unavailable(e)),
        Err(e) => return Err(GatewayError::Internal(e.to_string())),
    }

    Ok(Json(AccountResponse {
        success: true,
        message: "If the account exists, a reset link has been sent".to_string(),
        user_id: None,
        email: None,
    }))
}

/// `POST /reset-password`
///
/// Redeems a reset token. The password change itself belongs to the user
/// service; this confirms which account it applies to.
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ResetPasswordRequest>,
) -> Result<Json<AccountResponse>, GatewayError> {
    let claims = state.reset.redeem(request.token.trim()).map_err(|e| match e {
        ResetError::Token(source) => GatewayError::Token {
            source,
            auth: AuthType::ApiToken,
        },
        ResetError::NotPending => GatewayError::InvalidCredential {
            reason: ResetError::NotPending.to_string(),
            auth: AuthType::ApiToken,
        },
        ResetError::Store(e) => store_unavailable(e),
        other => GatewayError::Internal(other.to_string()),
    })?;

    tracing::info!(user_id = %claims.subject, "Password reset token redeemed");

    Ok(Json(AccountResponse {
        success: true,
        message: "Reset token accepted".to_string(),
        user_id: Some(claims.subject),
        email: Some(claims.email),
    }))
}

/// `GET /me`
pub async fn me(Auth(identity): Auth) -> Json<IdentityContext> {
    Json(identity)
}

/// `GET /users/{id}` (admin only)
pub async fn user(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Path(id): Path<u64>,
) -> Result<Response, GatewayError> {
    let store = state.identity_store.clone();
    let found = tokio::task::spawn_blocking(move || store.find_by_id(UserId(id)))
        .await
        .map_err(|e| GatewayError::Internal(format!("lookup task failed: {e}")))?
        .map_err(store_unavailable)?;

    tracing::info!(admin = %admin.user_id, user_id = id, found = found.is_some(), "Admin user lookup");

    Ok(match found {
        Some(user) => Json(user).into_response(),
        None => ApiError::new(StatusCode::NOT_FOUND, format!("No user with id {id}")).into_response(),
    })
}

fn store_unavailable(e: IdentityStoreError) -> GatewayError {
    tracing::error!(error = %e, "Identity store lookup failed");
    GatewayError::DownstreamUnavailable {
        service: IDENTITY_STORE.to_string(),
    }
}
