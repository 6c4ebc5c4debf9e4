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

//! Money helpers.
//!
//! All balances are kept at cent precision. Quantities may carry more decimal
//! places; any product of quantity and price is rounded back to cents.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::LedgerError;

/// Number of decimal places kept for money amounts.
pub const MONEY_SCALE: u32 = 2;

/// Rounds an amount to cents, half away from zero, always at scale 2.
pub fn round_money(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// `quantity * unit_price` rounded to cents.
///
/// # Errors
///
/// [`LedgerError::Validation`] if the product does not fit a `Decimal`.
pub fn line_amount(quantity: Decimal, unit_price: Decimal) -> Result<Decimal, LedgerError> {
    quantity
        .checked_mul(unit_price)
        .map(round_money)
        .ok_or_else(out_of_range)
}

/// Sums amounts, failing instead of overflowing.
pub fn checked_total<I>(amounts: I) -> Result<Decimal, LedgerError>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, |sum, amount| {
        sum.checked_add(amount).ok_or_else(out_of_range)
    })
}

/// `a + b`, failing instead of overflowing.
pub fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal, LedgerError> {
    a.checked_add(b).ok_or_else(out_of_range)
}

/// Sum for values that were range-checked when they were stored.
pub(crate) fn saturating_total<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .fold(Decimal::ZERO, |sum, amount| sum.checked_add(amount).unwrap_or(Decimal::MAX))
}

fn out_of_range() -> LedgerError {
    LedgerError::validation("amount out of range")
}

/// Checks that a caller-supplied amount is strictly positive and has no
/// fraction of a cent.
pub fn ensure_positive_money(field: &str, amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "{field} must be positive, got {amount}"
        )));
    }
    ensure_cents(field, amount)
}

/// Same as [`ensure_positive_money`] but zero is allowed.
pub fn ensure_non_negative_money(field: &str, amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount < Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "{field} cannot be negative, got {amount}"
        )));
    }
    ensure_cents(field, amount)
}

fn ensure_cents(field: &str, amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(LedgerError::validation(format!(
            "{field} has more than {MONEY_SCALE} decimal places: {amount}"
        )));
    }
    Ok(amount)
}
