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

//! Debts and their per-product lines.
//!
//! A debt is the amount a client still owes, split into one line per product.
//! Partial payments shrink a line's unit price, never its quantity, so that
//! `quantity * unit_price` is always the line's remaining balance.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use pos_ledger::{ClientId, Debt, DebtId, DebtLineId, DebtStatus, NewDebtLine, ProductId};
//! use rust_decimal_macros::dec;
//!
//! let line = NewDebtLine::new(ProductId(1), dec!(3), dec!(10.00));
//! let mut debt = Debt::new(DebtId(1), ClientId(1), None, vec![(DebtLineId(1), line)], Utc::now());
//! assert_eq!(debt.total, dec!(30.00));
//!
//! debt.apply_payment(DebtLineId(1), dec!(12.00)).unwrap();
//! assert_eq!(debt.lines[0].unit_price, dec!(6.00));
//! assert_eq!(debt.total, dec!(18.00));
//! assert_eq!(debt.status, DebtStatus::Pending);
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::base::{ClientId, DebtId, DebtLineId, ProductId, SaleId};
use crate::error::LedgerError;
use crate::money::{ensure_positive_money, line_amount, round_money, saturating_total};

/// Status shared by debts and debt lines.
///
//  Pending ──pay (remaining reaches 0)──► Paid (terminal)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DebtStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "pagado")]
    Paid,
}

impl DebtStatus {
    pub fn is_pending(self) -> bool {
        self == Self::Pending
    }
}

/// An unpaid product line to be turned into a debt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDebtLine {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl NewDebtLine {
    pub fn new(product_id: ProductId, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }

    /// `quantity * unit_price` rounded to cents.
    pub fn amount(&self) -> Result<Decimal, LedgerError> {
        line_amount(self.quantity, self.unit_price)
    }

    /// Checks the line and returns its amount.
    pub(crate) fn validate(&self) -> Result<Decimal, LedgerError> {
        if self.quantity <= Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "quantity for product {} must be positive",
                self.product_id
            )));
        }
        if self.unit_price <= Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "unit price for product {} must be positive",
                self.product_id
            )));
        }
        let amount = self.amount()?;
        if amount.is_zero() {
            return Err(LedgerError::validation(format!(
                "line amount for product {} rounds to zero",
                self.product_id
            )));
        }
        Ok(amount)
    }
}

/// The unpaid remainder of one product within a debt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtLine {
    pub id: DebtLineId,
    #[serde(rename = "deuda_id")]
    pub debt_id: DebtId,
    #[serde(rename = "producto_id")]
    pub product_id: ProductId,
    #[serde(rename = "cantidad")]
    pub quantity: Decimal,
    #[serde(rename = "precio_unitario")]
    pub unit_price: Decimal,
    #[serde(rename = "estado")]
    pub status: DebtStatus,
}

impl DebtLine {
    /// Remaining balance of the line; zero once paid.
    ///
    /// Saturates at `Decimal::MAX`; stored lines were range-checked when the
    /// debt was created.
    pub fn outstanding(&self) -> Decimal {
        match self.status {
            DebtStatus::Pending => {
                round_money(self.quantity.checked_mul(self.unit_price).unwrap_or(Decimal::MAX))
            }
            DebtStatus::Paid => Decimal::ZERO,
        }
    }
}

/// Result of a payment against a single debt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePayment {
    pub line_id: DebtLineId,
    pub amount: Decimal,
    pub remaining: Decimal,
    pub line_status: DebtStatus,
}

/// An amount a client still owes, optionally tied to a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    pub id: DebtId,
    #[serde(rename = "cliente_id")]
    pub client_id: ClientId,
    #[serde(rename = "venta_id", default, skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<SaleId>,
    #[serde(rename = "monto_total")]
    pub total: Decimal,
    #[serde(rename = "estado")]
    pub status: DebtStatus,
    #[serde(rename = "fecha")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "lineas")]
    pub lines: Vec<DebtLine>,
}

impl Debt {
    /// Builds a pending debt whose total is the sum of its lines.
    ///
    /// Lines are expected to be validated by the caller.
    pub fn new(
        id: DebtId,
        client_id: ClientId,
        sale_id: Option<SaleId>,
        lines: Vec<(DebtLineId, NewDebtLine)>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let lines: Vec<DebtLine> = lines
            .into_iter()
            .map(|(line_id, line)| DebtLine {
                id: line_id,
                debt_id: id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                status: DebtStatus::Pending,
            })
            .collect();
        let total = saturating_total(lines.iter().map(DebtLine::outstanding));
        let description = match sale_id {
            Some(sale_id) => format!("Deuda generada por venta {sale_id}"),
            None => "Deuda generada por venta N/A".to_string(),
        };
        let debt = Self {
            id,
            client_id,
            sale_id,
            total,
            status: DebtStatus::Pending,
            created_at,
            description: Some(description),
            lines,
        };
        debt.assert_invariants();
        debt
    }

    fn assert_invariants(&self) {
        debug_assert_eq!(
            self.total,
            self.lines_outstanding(),
            "Invariant violated: debt {} total does not match its pending lines",
            self.id
        );
        debug_assert!(
            self.total >= Decimal::ZERO,
            "Invariant violated: debt {} total went negative: {}",
            self.id,
            self.total
        );
    }

    /// Sum of the outstanding amounts of all pending lines.
    pub fn lines_outstanding(&self) -> Decimal {
        saturating_total(self.lines.iter().map(DebtLine::outstanding))
    }

    pub fn line(&self, line_id: DebtLineId) -> Option<&DebtLine> {
        self.lines.iter().find(|line| line.id == line_id)
    }

    /// Applies a payment to one line.
    ///
    /// On a partial payment the line's unit price becomes
    /// `(outstanding - amount) / quantity`. Paying the full outstanding
    /// amount closes the line. The debt total drops by `amount` and the debt
    /// is paid once the total reaches zero. Nothing is mutated on error.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] - No line with that id under this debt.
    /// - [`LedgerError::Validation`] - Amount not in `(0, outstanding]` or
    ///   finer than a cent.
    pub fn apply_payment(
        &mut self,
        line_id: DebtLineId,
        amount: Decimal,
    ) -> Result<LinePayment, LedgerError> {
        let debt_id = self.id;
        let line = self
            .lines
            .iter_mut()
            .find(|line| line.id == line_id)
            .ok_or_else(|| LedgerError::not_found("debt line", line_id))?;

        let outstanding = line.outstanding();
        ensure_positive_money("payment amount", amount)?;
        if amount > outstanding {
            return Err(LedgerError::validation(format!(
                "payment {amount} exceeds outstanding {outstanding} on line {line_id} of debt {debt_id}"
            )));
        }

        let remaining = outstanding - amount;
        if remaining.is_zero() {
            line.status = DebtStatus::Paid;
            line.unit_price = Decimal::ZERO;
        } else {
            line.unit_price = remaining / line.quantity;
        }
        let line_status = line.status;

        self.total = round_money(self.total - amount);
        self.status = if self.total.is_zero() {
            DebtStatus::Paid
        } else {
            DebtStatus::Pending
        };
        self.assert_invariants();

        Ok(LinePayment {
            line_id,
            amount,
            remaining,
            line_status,
        })
    }
}
