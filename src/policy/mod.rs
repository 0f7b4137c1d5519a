// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pure request-policy primitives: path patterns, IPv4 rules and client
//! address resolution. Nothing here touches the network or shared state.

pub mod client;
pub mod ip;
pub mod path;

pub use client::resolve_client_address;
pub use ip::{IpRule, RuleParseError, RuleSet};
pub use path::PatternList;
