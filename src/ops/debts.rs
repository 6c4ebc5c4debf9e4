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

//! Debt engine: debt creation, per-line payments and deletion.
//!
//! Each operation changes the debt and the client's cached total in one
//! store transaction, then records its audit event.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::base::{Actor, ClientId, DebtId, DebtLineId, ProductId, SaleId};
use crate::debt::{Debt, DebtStatus, NewDebtLine};
use crate::engine::Engine;
use crate::error::LedgerError;
use crate::money::checked_total;
use crate::ops::clients::adjust_debt_total;
use crate::store::LedgerState;

/// One debt line together with the state of its parent debt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebtLineView {
    pub line_id: DebtLineId,
    pub debt_id: DebtId,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub status: DebtStatus,
    pub client_id: ClientId,
    pub created_at: DateTime<Utc>,
    pub debt_total: Decimal,
    pub debt_status: DebtStatus,
}

/// A client that owes money.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Debtor {
    pub client_id: ClientId,
    pub name: String,
    pub debt_total: Decimal,
    pub open_debts: usize,
}

/// Validates the lines, stores a pending debt and adds its total to the
/// client's balance.
pub(crate) fn insert_debt(
    state: &mut LedgerState,
    client_id: ClientId,
    sale_id: Option<SaleId>,
    lines: &[NewDebtLine],
    created_at: DateTime<Utc>,
) -> Result<Debt, LedgerError> {
    state.clients.require(client_id)?;
    if lines.is_empty() {
        return Err(LedgerError::validation("a debt needs at least one line"));
    }
    let amounts = lines
        .iter()
        .map(NewDebtLine::validate)
        .collect::<Result<Vec<_>, _>>()?;
    checked_total(amounts)?;

    let debt_id = state.debts.allocate_id()?;
    let mut numbered = Vec::with_capacity(lines.len());
    for line in lines {
        numbered.push((state.allocate_debt_line_id()?, *line));
    }
    let debt = Debt::new(debt_id, client_id, sale_id, numbered, created_at);
    state.debts.insert(debt.clone())?;
    adjust_debt_total(state, client_id, debt.total)?;
    Ok(debt)
}

impl Engine {
    /// Creates a pending debt for a client.
    ///
    /// The debt total is the sum of `quantity * unit_price` over the lines
    /// and is added to the client's debt total.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] - Unknown client.
    /// - [`LedgerError::Validation`] - No lines, a line with a
    ///   non-positive quantity or price, or amounts too large to represent.
    pub fn create_debt(
        &self,
        client_id: ClientId,
        sale_id: Option<SaleId>,
        lines: &[NewDebtLine],
        actor: &Actor,
    ) -> Result<Debt, LedgerError> {
        let debt = self
            .store
            .transaction(|state| insert_debt(state, client_id, sale_id, lines, Utc::now()))?;
        tracing::debug!(debt = %debt.id, client = %client_id, total = %debt.total, "created debt");
        self.record_debt_created(&debt, actor);
        Ok(debt)
    }

    pub(crate) fn record_debt_created(&self, debt: &Debt, actor: &Actor) {
        self.record_event(
            actor,
            "crear_deuda",
            json!({
                "deuda_id": debt.id,
                "cliente_id": debt.client_id,
                "venta_id": debt.sale_id,
                "monto_total": debt.total,
            }),
        );
    }

    /// Pays part or all of one debt line and returns the updated debt.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] - Unknown debt, or no such line in it.
    /// - [`LedgerError::Validation`] - Amount outside `(0, outstanding]`
    ///   (which includes any payment on an already paid line).
    pub fn pay_line(
        &self,
        debt_id: DebtId,
        line_id: DebtLineId,
        amount: Decimal,
        actor: &Actor,
    ) -> Result<Debt, LedgerError> {
        let (debt, payment) = self.store.transaction(|state| {
            let (debt, payment) = state.debts.update(debt_id, |debt| {
                let payment = debt.apply_payment(line_id, amount)?;
                Ok((debt.clone(), payment))
            })?;
            adjust_debt_total(state, debt.client_id, -amount)?;
            Ok((debt, payment))
        })?;
        tracing::debug!(
            debt = %debt_id,
            line = %line_id,
            %amount,
            remaining = %debt.total,
            "applied debt payment"
        );
        self.record_event(
            actor,
            "pago_deuda_producto",
            json!({
                "deuda_id": debt_id,
                "cliente_id": debt.client_id,
                "linea_id": line_id,
                "monto_pago": amount,
                "saldo_restante": payment.remaining,
                "estado_final": payment.line_status,
            }),
        );
        Ok(debt)
    }

    /// Deletes a debt and its lines, removing what is still owed on it from
    /// the client's debt total.
    ///
    /// Returns `Ok(false)`, changing nothing, if the debt does not exist.
    pub fn delete_debt(&self, debt_id: DebtId, actor: &Actor) -> Result<bool, LedgerError> {
        let removed = self.store.transaction(|state| {
            let Some(debt) = state.debts.delete(debt_id) else {
                return Ok(None);
            };
            if debt.total > Decimal::ZERO {
                adjust_debt_total(state, debt.client_id, -debt.total)?;
            }
            Ok(Some(debt))
        })?;
        let Some(debt) = removed else {
            tracing::debug!(debt = %debt_id, "delete of missing debt ignored");
            return Ok(false);
        };
        self.record_event(
            actor,
            "eliminar_deuda",
            json!({
                "deuda_id": debt_id,
                "cliente_id": debt.client_id,
                "monto_total": debt.total,
            }),
        );
        Ok(true)
    }

    pub fn get_debt(&self, debt_id: DebtId) -> Option<Debt> {
        self.store.read(|state| state.debts.get(debt_id).cloned())
    }

    /// All debts, newest first.
    pub fn list_debts(&self) -> Vec<Debt> {
        self.store.read(|state| newest_first(state.debts.list(|_| true)))
    }

    /// One client's debts, newest first.
    pub fn debts_by_client(&self, client_id: ClientId) -> Vec<Debt> {
        self.store.read(|state| {
            newest_first(state.debts.list(|debt| debt.client_id == client_id))
        })
    }

    /// Every debt line joined with its parent debt, newest debts first.
    pub fn list_debt_lines(&self) -> Vec<DebtLineView> {
        self.list_debts()
            .iter()
            .flat_map(|debt| {
                debt.lines.iter().map(move |line| DebtLineView {
                    line_id: line.id,
                    debt_id: debt.id,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    status: line.status,
                    client_id: debt.client_id,
                    created_at: debt.created_at,
                    debt_total: debt.total,
                    debt_status: debt.status,
                })
            })
            .collect()
    }

    /// Clients with at least one pending debt and a positive balance,
    /// ordered by name.
    pub fn debtors(&self) -> Vec<Debtor> {
        let mut debtors: Vec<Debtor> = self.store.read(|state| {
            state
                .clients
                .iter()
                .filter(|client| client.debt_total > Decimal::ZERO)
                .filter_map(|client| {
                    let open_debts = state
                        .debts
                        .iter()
                        .filter(|d| d.client_id == client.id && d.status.is_pending())
                        .count();
                    (open_debts > 0).then(|| Debtor {
                        client_id: client.id,
                        name: client.name.clone(),
                        debt_total: client.debt_total,
                        open_debts,
                    })
                })
                .collect()
        });
        debtors.sort_by(|a, b| a.name.cmp(&b.name).then(a.client_id.cmp(&b.client_id)));
        debtors
    }
}

fn newest_first(mut debts: Vec<Debt>) -> Vec<Debt> {
    debts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    debts
}
