// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Signed-token issuance/verification and identity handling for the edge
//! pipeline.
//!
//! ## Auth Flow
//!
//! 1. The auth service issues an HS256 token at login (or a `reset` token
//!    from the forgot-password flow)
//! 2. Callers send `Authorization: Bearer <token>` to the gateway, or
//!    `X-API-Token: <token>` to the auth service directly
//! 3. The filter chain:
//!    - verifies structure, signature, expiry and purpose
//!    - resolves an [`IdentityContext`] (from claims, or from the
//!      [`IdentityStore`] on the service side)
//!    - propagates it downstream as `X-User-*` headers
//!
//! ## Security
//!
//! - Reset tokens are never accepted as session tokens, and vice versa
//! - Caller-supplied `X-User-*` headers are always overwritten or removed
//! - No revocation list; token lifetime is the only bound

pub mod claims;
pub mod codec;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod pending;
pub mod propagator;
pub mod reset;
pub mod roles;

pub use claims::{Claims, TokenPurpose, UserId};
pub use codec::{IssuedToken, TokenCodec};
pub use error::TokenError;
pub use extractor::{AdminOnly, Auth, OptionalAuth};
pub use identity::{
    AccountStatus, HttpIdentityStore, IdentityContext, IdentityStore, IdentityStoreError,
    InMemoryIdentityStore, UserRecord,
};
pub use pending::PendingStore;
pub use reset::{PasswordResetFlow, PendingReset, ResetError};
pub use roles::Role;
