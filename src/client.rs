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

//! Clients and their cached debt total.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::base::ClientId;
use crate::error::LedgerError;

/// A client of the shop.
///
/// `debt_total` is a cache of the sum of the client's pending debts. Only the
/// balance sync operations on [`Engine`](crate::Engine) write it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "telefono", default)]
    pub phone: String,
    #[serde(rename = "deuda_total")]
    pub debt_total: Decimal,
}

/// Editable client fields. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl ClientChanges {
    pub(crate) fn apply_to(&self, client: &mut Client) -> Result<(), LedgerError> {
        if let Some(name) = &self.name {
            client.name = validated_name(name)?;
        }
        if let Some(phone) = &self.phone {
            client.phone = phone.trim().to_string();
        }
        Ok(())
    }
}

pub(crate) fn validated_name(name: &str) -> Result<String, LedgerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("client name cannot be empty"));
    }
    Ok(name.to_string())
}
