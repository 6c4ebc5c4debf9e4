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

//! Error types for ledger operations.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::base::ProductId;

/// Ledger operation errors.
///
/// Business errors are hard failures and are never retried. Audit log
/// failures never surface here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u32 },

    /// Amount out of range, empty required field, duplicate name, ...
    #[error("validation failed: {0}")]
    Validation(String),

    /// A sale asks for more units than the product has on hand
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: Decimal,
        available: Decimal,
    },

    /// Snapshot could not be read or written
    #[error("storage error: {0}")]
    Storage(String),

    /// A password could not be hashed or a stored hash is malformed
    #[error("credential error: {0}")]
    Credential(String),
}

impl LedgerError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<u32>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
