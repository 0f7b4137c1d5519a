// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles carried in tokens and propagated downstream.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// User roles.
///
/// ## Role Hierarchy
///
/// - `Admin` - Back-office access, including `/admin/**` routes
/// - `Trainer` - Trainer accounts (profiles, sessions)
/// - `Member` - Regular gym members
///
/// The wire form is the capitalised variant name (`"Member"`), which is also
/// what downstream services read from `X-User-Role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Member,
    Trainer,
    Admin,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            (Role::Admin, _) => true,
            (Role::Trainer, Role::Trainer | Role::Member) => true,
            (Role::Member, Role::Member) => true,
            _ => false,
        }
    }

    /// Header/claim representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "Member",
            Role::Trainer => "Trainer",
            Role::Admin => "Admin",
        }
    }
}

impl Default for Role {
    /// Default role is Member (least privilege).
    fn default() -> Self {
        Role::Member
    }
}

impl FromStr for Role {
    type Err = ();

    /// Case-insensitive parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "member" => Ok(Role::Member),
            "trainer" => Ok(Role::Trainer),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
