// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Core identifier types for ledger records and the acting user.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

record_id!(
    /// Unique identifier for a product in the inventory.
    ProductId
);

record_id!(
    /// Unique identifier for a client.
    ClientId
);

record_id!(
    /// Unique identifier for a registered sale.
    SaleId
);

record_id!(
    /// Unique identifier for a debt.
    DebtId
);

record_id!(
    /// Unique identifier for a product category.
    CategoryId
);

record_id!(
    /// Unique identifier for a shop user account.
    UserId
);

record_id!(
    /// Unique identifier for a debt line.
    ///
    /// Debt line ids are unique across all debts, not only within their parent.
    DebtLineId
);

/// The user on whose behalf a mutating operation runs.
///
/// Every mutating call takes the actor explicitly; it ends up in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Actor(String);

impl Actor {
    const SYSTEM: &'static str = "sistema";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The actor used when no user is logged in.
    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Actor {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Actor {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
