// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route table, canary override and fallback responses.

pub mod canary;
pub mod fallback;
pub mod route;

pub use canary::{CanaryConfig, CanaryReason, CanaryRouter, ResolvedRoute};
pub use fallback::FallbackKind;
pub use route::{RouteDescriptor, RouteTable, Target, TargetError};
