// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::extract::Path;

use crate::routing::FallbackKind;

/// `GET /fallback/{kind}`. Unknown kinds get the default response.
pub async fn fallback(Path(kind): Path<String>) -> FallbackKind {
    kind.parse().unwrap_or(FallbackKind::Default)
}
