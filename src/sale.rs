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

//! Sales and the split of an underpaid sale into unpaid product lines.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::base::{Actor, ClientId, ProductId, SaleId};
use crate::debt::NewDebtLine;
use crate::error::LedgerError;
use crate::money::round_money;

/// How a sale was settled at the counter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PaymentType {
    #[serde(rename = "efectivo")]
    Cash,
    #[serde(rename = "transferencia")]
    Transfer,
    #[serde(rename = "tarjeta")]
    Card,
    #[serde(rename = "otro")]
    Other,
    /// Nothing was collected; the whole sale becomes a debt.
    #[serde(rename = "pendiente")]
    Pending,
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cash => "cash",
            Self::Transfer => "transfer",
            Self::Card => "card",
            Self::Other => "other",
            Self::Pending => "pending",
        };
        f.write_str(name)
    }
}

impl FromStr for PaymentType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" | "efectivo" => Ok(Self::Cash),
            "transfer" | "transferencia" => Ok(Self::Transfer),
            "card" | "tarjeta" => Ok(Self::Card),
            "other" | "otro" => Ok(Self::Other),
            "pending" | "pendiente" => Ok(Self::Pending),
            other => Err(LedgerError::validation(format!(
                "unknown payment type '{other}'"
            ))),
        }
    }
}

/// One product line of a sale, with the name as it was at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    #[serde(rename = "id_producto")]
    pub product_id: ProductId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "cantidad")]
    pub quantity: Decimal,
    #[serde(rename = "precio_unitario")]
    pub unit_price: Decimal,
}

impl SaleLine {
    /// `quantity * unit_price` rounded to cents, saturating at
    /// `Decimal::MAX`. Lines are range-checked when the sale is registered.
    pub fn subtotal(&self) -> Decimal {
        round_money(self.quantity.checked_mul(self.unit_price).unwrap_or(Decimal::MAX))
    }
}

/// Invoice-only fields that may be edited after the sale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleExtras {
    #[serde(rename = "observaciones", default, skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    #[serde(rename = "vendedor", default, skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
    #[serde(rename = "telefono_vendedor", default, skip_serializing_if = "Option::is_none")]
    pub seller_phone: Option<String>,
    #[serde(rename = "chofer", default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(rename = "chapa", default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
}

impl SaleExtras {
    /// Overwrites the fields that are set in `changes`.
    pub fn merge(&mut self, changes: SaleExtras) {
        fn take(slot: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.observations, changes.observations);
        take(&mut self.seller, changes.seller);
        take(&mut self.seller_phone, changes.seller_phone);
        take(&mut self.driver, changes.driver);
        take(&mut self.plate, changes.plate);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    #[serde(rename = "cliente_id")]
    pub client_id: ClientId,
    #[serde(rename = "productos_vendidos")]
    pub lines: Vec<SaleLine>,
    pub total: Decimal,
    #[serde(rename = "pagado")]
    pub paid: Decimal,
    #[serde(rename = "tipo_pago")]
    pub payment_type: PaymentType,
    #[serde(rename = "usuario")]
    pub actor: Actor,
    #[serde(rename = "fecha")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extras: SaleExtras,
}

impl Sale {
    /// Amount left unpaid at the counter.
    pub fn outstanding(&self) -> Decimal {
        (self.total - self.paid).max(Decimal::ZERO)
    }

    /// Splits the unpaid part of the sale into debt lines.
    ///
    /// The paid amount covers lines in order. A fully covered line yields
    /// nothing; a partly covered one keeps its quantity with a unit price
    /// reduced to the unpaid remainder. The outstanding amounts of the
    /// returned lines add up to [`Sale::outstanding`].
    pub fn unpaid_lines(&self) -> Vec<NewDebtLine> {
        let mut covered = self.paid;
        let mut unpaid = Vec::new();
        for line in &self.lines {
            let subtotal = line.subtotal();
            if covered >= subtotal {
                covered -= subtotal;
                continue;
            }
            let remainder = subtotal - covered;
            covered = Decimal::ZERO;
            let unit_price = if remainder == subtotal {
                line.unit_price
            } else {
                remainder / line.quantity
            };
            unpaid.push(NewDebtLine::new(line.product_id, line.quantity, unit_price));
        }
        unpaid
    }
}

/// A product requested in a new sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: ProductId,
    pub quantity: Decimal,
    /// Price charged; the product's list price when `None`.
    pub unit_price: Option<Decimal>,
}

impl SaleItem {
    pub fn new(product_id: ProductId, quantity: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            unit_price: None,
        }
    }

    pub fn at_price(mut self, unit_price: Decimal) -> Self {
        self.unit_price = Some(unit_price);
        self
    }
}

/// Input of [`Engine::register_sale`](crate::Engine::register_sale).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSale {
    pub client_id: ClientId,
    pub items: Vec<SaleItem>,
    pub paid: Decimal,
    pub payment_type: PaymentType,
}
