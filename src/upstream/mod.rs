// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Upstream forwarding: service registry, retry policy and the HTTP client.

pub mod forward;
pub mod registry;
pub mod retry;

pub use forward::{Forwarder, UpstreamError, UpstreamRequest};
pub use registry::{RegistryError, ServiceRegistry};
pub use retry::RetryPolicy;
