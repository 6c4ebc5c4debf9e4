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
//! Audit history of a single record.

use serde_json::Value;

use crate::audit::{AuditError, AuditEvent};
use crate::base::{CategoryId, ClientId, DebtId, ProductId, SaleId, UserId};
use crate::engine::Engine;
use crate::error::LedgerError;

/// A record whose audit history can be looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordRef {
    Product(ProductId),
    Client(ClientId),
    Sale(SaleId),
    Debt(DebtId),
    Category(CategoryId),
    User(UserId),
}

impl RecordRef {
    /// Builds a reference from an entity name, English or as used in the
    /// audit log.
    pub fn parse(entity: &str, id: u32) -> Result<Self, LedgerError> {
        match entity.trim().to_lowercase().as_str() {
            "product" | "producto" => Ok(Self::Product(ProductId(id))),
            "client" | "cliente" => Ok(Self::Client(ClientId(id))),
            "sale" | "venta" => Ok(Self::Sale(SaleId(id))),
            "debt" | "deuda" => Ok(Self::Debt(DebtId(id))),
            "category" | "categoria" => Ok(Self::Category(CategoryId(id))),
            "user" | "usuario" => Ok(Self::User(UserId(id))),
            other => Err(LedgerError::validation(format!("unknown entity '{other}'"))),
        }
    }

    /// Key under which audit details name this kind of record.
    pub fn detail_key(&self) -> &'static str {
        match self {
            Self::Product(_) => "producto_id",
            Self::Client(_) => "cliente_id",
            Self::Sale(_) => "venta_id",
            Self::Debt(_) => "deuda_id",
            Self::Category(_) => "categoria_id",
            Self::User(_) => "usuario_id",
        }
    }

    pub fn id(&self) -> u32 {
        match *self {
            Self::Product(id) => id.0,
            Self::Client(id) => id.0,
            Self::Sale(id) => id.0,
            Self::Debt(id) => id.0,
            Self::Category(id) => id.0,
            Self::User(id) => id.0,
        }
    }

    fn matches(&self, event: &AuditEvent) -> bool {
        match event.details.get(self.detail_key()) {
            Some(Value::Number(n)) => n.as_u64() == Some(u64::from(self.id())),
            // older logs wrote ids as strings
            Some(Value::String(s)) => s.trim() == self.id().to_string(),
            _ => false,
        }
    }
}

impl Engine {
    /// Every audit entry that names `record`, newest first.
    pub fn record_history(&self, record: RecordRef) -> Result<Vec<AuditEvent>, AuditError> {
        let mut events: Vec<AuditEvent> = self
            .audit_entries()?
            .into_iter()
            .filter(|event| record.matches(event))
            .collect();
        // entries are appended in order; a stable reverse keeps ties newest first
        events.reverse();
        events.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(events)
    }
}
