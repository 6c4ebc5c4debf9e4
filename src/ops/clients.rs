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

//! Clients and client balance sync.
//!
//! [`adjust_debt_total`] is the only function that writes
//! `Client::debt_total`. Debt creation, payment and deletion all route their
//! balance changes through it inside their own transaction.

use rust_decimal::Decimal;
use serde_json::json;

use crate::base::{Actor, ClientId};
use crate::client::{Client, ClientChanges, validated_name};
use crate::engine::Engine;
use crate::error::LedgerError;
use crate::money::{checked_add, round_money, saturating_total};
use crate::store::LedgerState;

/// A client whose cached debt total was corrected by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceCorrection {
    pub client_id: ClientId,
    pub cached: Decimal,
    pub actual: Decimal,
}

/// Adds `delta` to the client's cached debt total.
///
/// A result below zero means the cache was already out of sync; it is clamped
/// to zero and reported, and [`Engine::reconcile_debt_totals`] repairs it.
pub(crate) fn adjust_debt_total(
    state: &mut LedgerState,
    client_id: ClientId,
    delta: Decimal,
) -> Result<Decimal, LedgerError> {
    state.clients.update(client_id, |client| {
        let adjusted = round_money(checked_add(client.debt_total, delta)?);
        client.debt_total = if adjusted < Decimal::ZERO {
            tracing::warn!(
                client = %client_id,
                %delta,
                cached = %client.debt_total,
                "client debt total would go negative, clamping to zero"
            );
            Decimal::ZERO
        } else {
            adjusted
        };
        Ok(client.debt_total)
    })
}

/// Sum of the client's pending debt totals.
pub(crate) fn open_debt_total(state: &LedgerState, client_id: ClientId) -> Decimal {
    saturating_total(
        state
            .debts
            .iter()
            .filter(|debt| debt.client_id == client_id && debt.status.is_pending())
            .map(|debt| debt.total),
    )
}

impl Engine {
    pub fn add_client(
        &self,
        name: &str,
        phone: &str,
        actor: &Actor,
    ) -> Result<Client, LedgerError> {
        let name = validated_name(name)?;
        let client = self.store.transaction(|state| {
            let client = Client {
                id: state.clients.allocate_id()?,
                name,
                phone: phone.trim().to_string(),
                debt_total: Decimal::ZERO,
            };
            state.clients.insert(client.clone())?;
            Ok(client)
        })?;
        tracing::debug!(client = %client.id, "added client");
        self.record_event(
            actor,
            "agregar_cliente",
            json!({ "cliente_id": client.id, "nombre": client.name }),
        );
        Ok(client)
    }

    /// Updates name and/or phone. The debt total cannot be edited here.
    pub fn edit_client(
        &self,
        client_id: ClientId,
        changes: &ClientChanges,
        actor: &Actor,
    ) -> Result<Client, LedgerError> {
        let client = self.store.transaction(|state| {
            state.clients.update(client_id, |client| {
                changes.apply_to(client)?;
                Ok(client.clone())
            })
        })?;
        self.record_event(
            actor,
            "editar_cliente",
            json!({ "cliente_id": client_id, "cambios": changes }),
        );
        Ok(client)
    }

    pub fn get_client(&self, client_id: ClientId) -> Option<Client> {
        self.store.read(|state| state.clients.get(client_id).cloned())
    }

    pub fn list_clients(&self) -> Vec<Client> {
        self.store.read(|state| state.clients.list(|_| true))
    }

    /// Deletes a client without open debts.
    ///
    /// Returns `Ok(false)` if the client does not exist.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Validation`] while the client still has pending debts.
    pub fn delete_client(&self, client_id: ClientId, actor: &Actor) -> Result<bool, LedgerError> {
        let removed = self.store.transaction(|state| {
            if state.clients.get(client_id).is_none() {
                return Ok(None);
            }
            let open = state
                .debts
                .iter()
                .any(|debt| debt.client_id == client_id && debt.status.is_pending());
            if open {
                return Err(LedgerError::validation(format!(
                    "client {client_id} still has pending debts"
                )));
            }
            Ok(state.clients.delete(client_id))
        })?;
        let Some(client) = removed else {
            return Ok(false);
        };
        self.record_event(
            actor,
            "eliminar_cliente",
            json!({ "cliente_id": client_id, "nombre": client.name }),
        );
        Ok(true)
    }

    /// Adds `delta` (positive or negative) to a client's debt total and
    /// returns the new value.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotFound`] if the client does not exist.
    pub fn adjust_debt_total(
        &self,
        client_id: ClientId,
        delta: Decimal,
    ) -> Result<Decimal, LedgerError> {
        let total = self
            .store
            .transaction(|state| adjust_debt_total(state, client_id, delta))?;
        tracing::debug!(client = %client_id, %delta, %total, "adjusted client debt total");
        Ok(total)
    }

    /// Resets a client's debt total to the sum of its pending debts.
    pub fn recompute_client_debt_total(
        &self,
        client_id: ClientId,
    ) -> Result<Decimal, LedgerError> {
        self.store.transaction(|state| {
            let actual = open_debt_total(state, client_id);
            state.clients.update(client_id, |client| {
                client.debt_total = actual;
                Ok(actual)
            })
        })
    }

    /// Recomputes every client's debt total from the debts table.
    ///
    /// Returns the clients whose cached value was wrong.
    pub fn reconcile_debt_totals(
        &self,
        actor: &Actor,
    ) -> Result<Vec<BalanceCorrection>, LedgerError> {
        let corrections = self.store.transaction(|state| {
            let mut corrections = Vec::new();
            let ids: Vec<ClientId> = state.clients.iter().map(|c| c.id).collect();
            for client_id in ids {
                let actual = open_debt_total(state, client_id);
                let client = state.clients.require_mut(client_id)?;
                if client.debt_total != actual {
                    corrections.push(BalanceCorrection {
                        client_id,
                        cached: client.debt_total,
                        actual,
                    });
                    client.debt_total = actual;
                }
            }
            Ok(corrections)
        })?;
        if !corrections.is_empty() {
            tracing::info!(count = corrections.len(), "reconciled client debt totals");
            let details: Vec<_> = corrections
                .iter()
                .map(|c| json!({ "cliente_id": c.client_id, "antes": c.cached, "despues": c.actual }))
                .collect();
            self.record_event(actor, "reconciliar_deudas", json!({ "correcciones": details }));
        }
        Ok(corrections)
    }
}
