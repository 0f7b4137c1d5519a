// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Edge Gate - Gateway and Auth-Service Traffic Control
//!
//! The request pipeline that sits in front of the gym platform's services:
//! signed-token authentication, IP admission control, path policy and
//! canary routing, followed by forwarding to the selected upstream.
//!
//! ## Modules
//!
//! - `api` - HTTP router and the handful of endpoints served locally
//! - `auth` - Token codec, identity store, identity propagation, password reset
//! - `filter` - The ordered filter chain and its axum middleware
//! - `policy` - Path patterns, IPv4 rule sets, client address resolution
//! - `routing` - Route table, canary override, fallback responses
//! - `upstream` - Service registry, retrying forwarder

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod policy;
pub mod routing;
pub mod state;
pub mod upstream;
