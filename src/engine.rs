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

//! Ledger engine.
//!
//! The [`Engine`] owns the [`Store`] and the audit sink. Every public
//! operation of the ledger is a method on it, grouped by concern:
//!
//! - **Inventory**: product CRUD and stock adjustment.
//! - **Clients**: client CRUD and the balance sync that owns `debt_total`.
//! - **Sales**: sale registration, which turns any unpaid remainder into a
//!   debt in the same transaction.
//! - **Debts**: debt creation, per-line payments and deletion.
//! - **Categories** and **users**: the lists products and the audit log
//!   refer to.
//! - **Reports** and per-record **history**: read-only views over sales and
//!   the audit log.
//!
//! # Transactions
//!
//! Each mutating operation runs in a single [`Store::transaction`]; the audit
//! event is recorded only after the commit.

use serde_json::Value;

use crate::audit::{AuditError, AuditEvent, AuditLog, MemoryAuditLog};
use crate::base::Actor;
use crate::store::Store;

/// Entries returned by [`Engine::entries_by_actor`].
const ACTOR_HISTORY_LIMIT: usize = 100;

/// Point-of-sale ledger: inventory, clients, sales and debts.
///
/// # Invariants
///
/// - Every debt's `monto_total` equals the sum of its pending lines.
/// - Every client's `debt_total` equals the sum of its pending debts' totals.
/// - A paid debt or debt line never becomes pending again.
pub struct Engine {
    pub(crate) store: Store,
    audit: Box<dyn AuditLog>,
}

impl Engine {
    /// An in-memory engine with an in-memory audit log.
    pub fn new() -> Self {
        Self::with_parts(Store::in_memory(), Box::new(MemoryAuditLog::new()))
    }

    pub fn with_parts(store: Store, audit: Box<dyn AuditLog>) -> Self {
        Engine { store, audit }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Records an audit event, swallowing sink failures.
    pub fn record_event(&self, actor: &Actor, action: &str, details: Value) {
        let event = AuditEvent::new(actor, action, details);
        if let Err(err) = self.audit.record(&event) {
            tracing::warn!(action, actor = %actor, "failed to record audit event: {err}");
        }
    }

    /// The full audit history, oldest first.
    pub fn audit_entries(&self) -> Result<Vec<AuditEvent>, AuditError> {
        self.audit.entries()
    }

    /// The latest entries recorded by one actor, newest first.
    pub fn entries_by_actor(&self, actor: &Actor) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(self
            .audit
            .entries()?
            .into_iter()
            .rev()
            .filter(|event| &event.actor == actor)
            .take(ACTOR_HISTORY_LIMIT)
            .collect())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct BrokenAuditLog;

    impl AuditLog for BrokenAuditLog {
        fn record(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            Err(AuditError::Io(std::io::Error::other("disk gone")))
        }

        fn entries(&self) -> Result<Vec<AuditEvent>, AuditError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn audit_failures_are_swallowed() {
        let engine = Engine::with_parts(Store::in_memory(), Box::new(BrokenAuditLog));
        engine.record_event(&Actor::system(), "anything", json!({}));
        assert!(engine.audit_entries().unwrap().is_empty());
    }

    #[test]
    fn entries_by_actor_are_newest_first() {
        let engine = Engine::new();
        let ana = Actor::from("ana");
        engine.record_event(&ana, "first", json!({}));
        engine.record_event(&Actor::system(), "other", json!({}));
        engine.record_event(&ana, "second", json!({}));

        let actions: Vec<String> = engine
            .entries_by_actor(&ana)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["second", "first"]);
    }
}
