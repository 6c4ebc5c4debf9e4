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

//! Inventory products.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::base::ProductId;
use crate::error::LedgerError;
use crate::money::{ensure_positive_money, round_money};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "precio")]
    pub price: Decimal,
    #[serde(rename = "cantidad")]
    pub quantity: Decimal,
    /// Name of a registered category.
    #[serde(rename = "categoria")]
    pub category: String,
}

/// Fields of a product as entered in the inventory form.
///
/// Used both for creating and for replacing a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductForm {
    pub name: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub category: String,
}

impl ProductForm {
    pub fn new(
        name: impl Into<String>,
        price: Decimal,
        quantity: Decimal,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            price,
            quantity,
            category: category.into(),
        }
    }

    /// Trims text fields and rounds the price, rejecting invalid input.
    pub(crate) fn normalized(&self) -> Result<Self, LedgerError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(LedgerError::validation("product name cannot be empty"));
        }
        let category = self.category.trim();
        if category.is_empty() {
            return Err(LedgerError::validation("product category cannot be empty"));
        }
        let price = ensure_positive_money("price", round_money(self.price))?;
        if self.quantity < Decimal::ZERO {
            return Err(LedgerError::validation("product quantity cannot be negative"));
        }
        Ok(Self {
            name: name.to_string(),
            price,
            quantity: self.quantity,
            category: category.to_string(),
        })
    }

    pub(crate) fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
            quantity: self.quantity,
            category: self.category,
        }
    }
}

impl Product {
    /// Case-insensitive name comparison used for uniqueness checks.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }
}
