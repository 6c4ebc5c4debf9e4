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

//! Sales and the sale-to-debt bridge.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;

use crate::base::{Actor, SaleId};
use crate::debt::Debt;
use crate::engine::Engine;
use crate::error::LedgerError;
use crate::money::{checked_total, ensure_non_negative_money, line_amount};
use crate::ops::debts::insert_debt;
use crate::ops::inventory::adjust_stock;
use crate::sale::{NewSale, Sale, SaleExtras, SaleLine};

/// A registered sale and the debt created for its unpaid part, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub debt: Option<Debt>,
}

impl Engine {
    /// Registers a sale, takes its items out of stock and, if it was not
    /// fully paid, opens a debt for the remainder. All of it commits or none
    /// of it does.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] - Unknown client or product.
    /// - [`LedgerError::Validation`] - No items, non-positive quantity or
    ///   price, negative paid amount, amounts too large to represent.
    /// - [`LedgerError::InsufficientStock`] - An item exceeds the stock.
    pub fn register_sale(&self, new_sale: &NewSale, actor: &Actor) -> Result<SaleReceipt, LedgerError> {
        if new_sale.items.is_empty() {
            return Err(LedgerError::validation("a sale needs at least one product"));
        }
        let paid = ensure_non_negative_money("paid amount", new_sale.paid)?;

        let receipt = self.store.transaction(|state| {
            state.clients.require(new_sale.client_id)?;

            let mut lines = Vec::with_capacity(new_sale.items.len());
            let mut subtotals = Vec::with_capacity(new_sale.items.len());
            for item in &new_sale.items {
                if item.quantity <= Decimal::ZERO {
                    return Err(LedgerError::validation(format!(
                        "quantity for product {} must be positive",
                        item.product_id
                    )));
                }
                let product = adjust_stock(state, item.product_id, -item.quantity)?;
                let unit_price = item.unit_price.unwrap_or(product.price);
                if unit_price <= Decimal::ZERO {
                    return Err(LedgerError::validation(format!(
                        "unit price for product {} must be positive",
                        item.product_id
                    )));
                }
                subtotals.push(line_amount(item.quantity, unit_price)?);
                lines.push(SaleLine {
                    product_id: product.id,
                    name: product.name,
                    quantity: item.quantity,
                    unit_price,
                });
            }

            let now = Utc::now();
            let sale = Sale {
                id: state.sales.allocate_id()?,
                client_id: new_sale.client_id,
                total: checked_total(subtotals)?,
                lines,
                paid,
                payment_type: new_sale.payment_type,
                actor: actor.clone(),
                created_at: now,
                extras: SaleExtras::default(),
            };
            state.sales.insert(sale.clone())?;

            let unpaid = sale.unpaid_lines();
            let debt = if unpaid.is_empty() {
                None
            } else {
                Some(insert_debt(state, sale.client_id, Some(sale.id), &unpaid, now)?)
            };
            Ok(SaleReceipt { sale, debt })
        })?;

        let sale = &receipt.sale;
        tracing::debug!(sale = %sale.id, total = %sale.total, paid = %sale.paid, "registered sale");
        self.record_event(
            actor,
            "registrar_venta",
            json!({ "venta_id": sale.id, "total": sale.total, "pagado": sale.paid }),
        );
        if let Some(debt) = &receipt.debt {
            self.record_debt_created(debt, actor);
        }
        Ok(receipt)
    }

    /// Edits the invoice-only fields of a sale. Fields left as `None` keep
    /// their value.
    pub fn edit_sale_extras(
        &self,
        sale_id: SaleId,
        changes: SaleExtras,
        actor: &Actor,
    ) -> Result<Sale, LedgerError> {
        let sale = self.store.transaction(|state| {
            state.sales.update(sale_id, |sale| {
                sale.extras.merge(changes);
                Ok(sale.clone())
            })
        })?;
        self.record_event(
            actor,
            "editar_venta_extra",
            json!({ "venta_id": sale.id, "venta": sale }),
        );
        Ok(sale)
    }

    pub fn get_sale(&self, sale_id: SaleId) -> Option<Sale> {
        self.store.read(|state| state.sales.get(sale_id).cloned())
    }

    /// All sales, newest first.
    pub fn list_sales(&self) -> Vec<Sale> {
        let mut sales = self.store.read(|state| state.sales.list(|_| true));
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        sales
    }

    /// Deletes a sale record. Stock and any debt opened by the sale are left
    /// as they are.
    ///
    /// Returns `false` if the sale does not exist.
    pub fn delete_sale(&self, sale_id: SaleId, actor: &Actor) -> Result<bool, LedgerError> {
        let removed = self
            .store
            .transaction(|state| Ok(state.sales.delete(sale_id)))?;
        let Some(sale) = removed else {
            return Ok(false);
        };
        self.record_event(
            actor,
            "eliminar_venta",
            json!({ "venta_id": sale_id, "venta": sale }),
        );
        Ok(true)
    }
}
