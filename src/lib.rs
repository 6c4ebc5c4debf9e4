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

//! # POS Ledger
//!
//! This library provides the bookkeeping core of a small shop's point of
//! sale: inventory, clients, sales, and debts owed by clients, paid off line
//! by line.
//!
//! ## Core Components
//!
//! - [`Engine`]: Owns the store and the audit log; every operation is a method
//! - [`Debt`]: A client's unpaid amount, split into per-product [`DebtLine`]s
//! - [`Store`]: All-or-nothing transactions over the ledger tables, optionally
//!   snapshotted to a JSON file
//! - [`AuditLog`]: Fire-and-forget record of every change, queryable per
//!   record through [`RecordRef`]
//! - [`LedgerError`]: Error types for failed operations
//!
//! ## Example
//!
//! ```
//! use pos_ledger::{Actor, Engine, NewSale, PaymentType, ProductForm, SaleItem};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! let actor = Actor::from("caja1");
//!
//! let client = engine.add_client("Ana", "555-0101", &actor).unwrap();
//! engine.add_category("Electric", &actor).unwrap();
//! let cable = engine
//!     .add_product(&ProductForm::new("Cable", dec!(10.00), dec!(20), "Electric"), &actor)
//!     .unwrap();
//!
//! // Sell 10 cables, 60.00 paid up front
//! let receipt = engine
//!     .register_sale(
//!         &NewSale {
//!             client_id: client.id,
//!             items: vec![SaleItem::new(cable.id, dec!(10))],
//!             paid: dec!(60.00),
//!             payment_type: PaymentType::Cash,
//!         },
//!         &actor,
//!     )
//!     .unwrap();
//!
//! let debt = receipt.debt.unwrap();
//! assert_eq!(debt.total, dec!(40.00));
//! assert_eq!(engine.get_client(client.id).unwrap().debt_total, dec!(40.00));
//!
//! // Pay 15.00 towards the line
//! let debt = engine.pay_line(debt.id, debt.lines[0].id, dec!(15.00), &actor).unwrap();
//! assert_eq!(debt.total, dec!(25.00));
//! assert_eq!(engine.get_client(client.id).unwrap().debt_total, dec!(25.00));
//! ```

pub mod audit;
mod base;
mod category;
mod client;
mod debt;
mod engine;
pub mod error;
pub mod money;
mod ops;
mod product;
mod sale;
pub mod settings;
pub mod store;
pub mod user;

pub use audit::{AuditError, AuditEvent, AuditLog, JsonLinesAuditLog, MemoryAuditLog};
pub use base::{Actor, CategoryId, ClientId, DebtId, DebtLineId, ProductId, SaleId, UserId};
pub use category::Category;
pub use client::{Client, ClientChanges};
pub use debt::{Debt, DebtLine, DebtStatus, LinePayment, NewDebtLine};
pub use engine::Engine;
pub use error::LedgerError;
pub use ops::clients::BalanceCorrection;
pub use ops::debts::{DebtLineView, Debtor};
pub use ops::history::RecordRef;
pub use ops::reports::{ProductSales, SalesReport};
pub use ops::sales::SaleReceipt;
pub use product::{Product, ProductForm};
pub use sale::{NewSale, PaymentType, Sale, SaleExtras, SaleItem, SaleLine};
pub use settings::Settings;
pub use store::{LedgerState, Record, Store, Table};
pub use user::{Role, User};
