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

//! Ledger store.
//!
//! Holds every table in one [`LedgerState`] behind a mutex. Reads borrow the
//! current state; writes go through [`Store::transaction`], which mutates a
//! staged copy and only swaps it in (and snapshots it to disk, for a
//! file-backed store) when the whole closure succeeds. A multi-record change
//! such as "update line, update debt, update client" therefore lands
//! all-or-nothing.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::base::{CategoryId, ClientId, DebtId, DebtLineId, ProductId, SaleId, UserId};
use crate::category::Category;
use crate::client::Client;
use crate::debt::Debt;
use crate::error::LedgerError;
use crate::product::Product;
use crate::sale::Sale;
use crate::user::User;

/// A row type stored in a [`Table`], keyed by its own id.
pub trait Record: Clone {
    type Id: Copy + Ord + fmt::Debug + fmt::Display + From<u32> + Into<u32>;

    /// Entity name used in [`LedgerError::NotFound`].
    const ENTITY: &'static str;

    fn id(&self) -> Self::Id;
}

impl Record for Product {
    type Id = ProductId;
    const ENTITY: &'static str = "product";

    fn id(&self) -> ProductId {
        self.id
    }
}

impl Record for Client {
    type Id = ClientId;
    const ENTITY: &'static str = "client";

    fn id(&self) -> ClientId {
        self.id
    }
}

impl Record for Sale {
    type Id = SaleId;
    const ENTITY: &'static str = "sale";

    fn id(&self) -> SaleId {
        self.id
    }
}

impl Record for Debt {
    type Id = DebtId;
    const ENTITY: &'static str = "debt";

    fn id(&self) -> DebtId {
        self.id
    }
}

impl Record for Category {
    type Id = CategoryId;
    const ENTITY: &'static str = "category";

    fn id(&self) -> CategoryId {
        self.id
    }
}

impl Record for User {
    type Id = UserId;
    const ENTITY: &'static str = "user";

    fn id(&self) -> UserId {
        self.id
    }
}

/// Converts a counter value into a 32-bit id.
fn checked_id(next: u64, entity: &str) -> Result<u32, LedgerError> {
    u32::try_from(next).map_err(|_| LedgerError::Storage(format!("{entity} ids exhausted")))
}

/// Rows of one record type, ordered by id, with a sequential id allocator.
#[derive(Debug, Clone)]
pub struct Table<R: Record> {
    // wider than the ids so the counter can step past `u32::MAX`
    next_id: u64,
    rows: BTreeMap<R::Id, R>,
}

impl<R: Record> Table<R> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }

    /// Reserves the next id. Ids are never handed out twice, even after a
    /// delete.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Storage`] once every 32-bit id has been used.
    pub fn allocate_id(&mut self) -> Result<R::Id, LedgerError> {
        let id = checked_id(self.next_id, R::ENTITY)?;
        self.next_id += 1;
        Ok(R::Id::from(id))
    }

    pub fn get(&self, id: R::Id) -> Option<&R> {
        self.rows.get(&id)
    }

    /// Like [`Table::get`] but a missing row is a [`LedgerError::NotFound`].
    pub fn require(&self, id: R::Id) -> Result<&R, LedgerError> {
        self.rows
            .get(&id)
            .ok_or_else(|| LedgerError::not_found(R::ENTITY, id))
    }

    pub fn require_mut(&mut self, id: R::Id) -> Result<&mut R, LedgerError> {
        self.rows
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(R::ENTITY, id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    /// Rows matching `filter`, in id order.
    pub fn list<F>(&self, filter: F) -> Vec<R>
    where
        F: Fn(&R) -> bool,
    {
        self.rows.values().filter(|r| filter(r)).cloned().collect()
    }

    /// Inserts a row under its own id.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Storage`] if a row with the same id exists.
    pub fn insert(&mut self, record: R) -> Result<R::Id, LedgerError> {
        let id = record.id();
        if self.rows.contains_key(&id) {
            return Err(LedgerError::Storage(format!(
                "duplicate {} id {id}",
                R::ENTITY
            )));
        }
        let raw: u32 = id.into();
        self.next_id = self.next_id.max(u64::from(raw) + 1);
        self.rows.insert(id, record);
        Ok(id)
    }

    /// Runs `update` on the row with the given id.
    pub fn update<T, F>(&mut self, id: R::Id, update: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut R) -> Result<T, LedgerError>,
    {
        update(self.require_mut(id)?)
    }

    pub fn delete(&mut self, id: R::Id) -> Option<R> {
        self.rows.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record + Serialize> Serialize for Table<R> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let rows: Vec<&R> = self.rows.values().collect();
        let mut state = serializer.serialize_struct("Table", 2)?;
        state.serialize_field("siguiente_id", &self.next_id)?;
        state.serialize_field("registros", &rows)?;
        state.end()
    }
}

#[derive(Deserialize)]
struct TableRepr<R> {
    siguiente_id: u64,
    registros: Vec<R>,
}

impl<'de, R: Record + DeserializeOwned> Deserialize<'de> for Table<R> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = TableRepr::<R>::deserialize(deserializer)?;
        let mut table = Table {
            next_id: repr.siguiente_id.max(1),
            rows: BTreeMap::new(),
        };
        for record in repr.registros {
            table
                .insert(record)
                .map_err(serde::de::Error::custom)?;
        }
        Ok(table)
    }
}

/// Every table of the ledger.
///
/// Debt lines live inside their debt; only their id counter is kept here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "LedgerStateRepr")]
pub struct LedgerState {
    #[serde(rename = "productos")]
    pub products: Table<Product>,
    #[serde(rename = "clientes")]
    pub clients: Table<Client>,
    #[serde(rename = "ventas")]
    pub sales: Table<Sale>,
    #[serde(rename = "deudas")]
    pub debts: Table<Debt>,
    #[serde(rename = "categorias")]
    pub categories: Table<Category>,
    #[serde(rename = "usuarios")]
    pub users: Table<User>,
    #[serde(rename = "siguiente_linea_id")]
    next_debt_line_id: u64,
}

/// On-disk shape of [`LedgerState`]. Tables missing from older files load
/// empty.
#[derive(Deserialize)]
struct LedgerStateRepr {
    #[serde(rename = "productos", default)]
    products: Table<Product>,
    #[serde(rename = "clientes", default)]
    clients: Table<Client>,
    #[serde(rename = "ventas", default)]
    sales: Table<Sale>,
    #[serde(rename = "deudas", default)]
    debts: Table<Debt>,
    #[serde(rename = "categorias", default)]
    categories: Table<Category>,
    #[serde(rename = "usuarios", default)]
    users: Table<User>,
    #[serde(rename = "siguiente_linea_id", default)]
    next_debt_line_id: u64,
}

impl From<LedgerStateRepr> for LedgerState {
    fn from(repr: LedgerStateRepr) -> Self {
        // a stale or missing counter must not hand out a line id again
        let past_lines = repr
            .debts
            .iter()
            .flat_map(|debt| debt.lines.iter())
            .map(|line| u64::from(line.id.0) + 1)
            .max()
            .unwrap_or(1);
        Self {
            products: repr.products,
            clients: repr.clients,
            sales: repr.sales,
            debts: repr.debts,
            categories: repr.categories,
            users: repr.users,
            next_debt_line_id: repr.next_debt_line_id.max(past_lines),
        }
    }
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerState {
    pub fn new() -> Self {
        Self {
            products: Table::new(),
            clients: Table::new(),
            sales: Table::new(),
            debts: Table::new(),
            categories: Table::new(),
            users: Table::new(),
            next_debt_line_id: 1,
        }
    }

    /// Reserves a debt line id, unique across all debts.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Storage`] once every 32-bit id has been used.
    pub fn allocate_debt_line_id(&mut self) -> Result<DebtLineId, LedgerError> {
        let id = checked_id(self.next_debt_line_id, "debt line")?;
        self.next_debt_line_id += 1;
        Ok(DebtLineId(id))
    }
}

/// Persistent home of the [`LedgerState`].
#[derive(Debug)]
pub struct Store {
    state: Mutex<LedgerState>,
    path: Option<PathBuf>,
}

impl Store {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(LedgerState::new()),
            path: None,
        }
    }

    /// Opens a file-backed store, loading the snapshot if the file exists.
    ///
    /// Nothing is written until the first committed transaction.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Storage`] if the file exists but cannot be read or
    /// parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let state = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| storage_error(&path, e))?;
            serde_json::from_slice(&bytes).map_err(|e| storage_error(&path, e))?
        } else {
            LedgerState::new()
        };
        tracing::debug!(path = %path.display(), "opened ledger store");
        Ok(Self {
            state: Mutex::new(state),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Runs `read` against the current committed state.
    pub fn read<T, F>(&self, read: F) -> T
    where
        F: FnOnce(&LedgerState) -> T,
    {
        read(&self.state.lock())
    }

    /// Applies `mutate` all-or-nothing.
    ///
    /// The closure works on a staged copy of the state. If it fails, or the
    /// snapshot cannot be written, the committed state is left untouched.
    pub fn transaction<T, F>(&self, mutate: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut LedgerState) -> Result<T, LedgerError>,
    {
        let mut guard = self.state.lock();
        let mut staged = guard.clone();
        let output = mutate(&mut staged)?;
        if let Some(path) = &self.path {
            write_snapshot(path, &staged)?;
        }
        *guard = staged;
        Ok(output)
    }

    /// Clones the committed state.
    pub fn snapshot(&self) -> LedgerState {
        self.state.lock().clone()
    }
}

/// Writes the state next to `path` and renames it into place.
fn write_snapshot(path: &Path, state: &LedgerState) -> Result<(), LedgerError> {
    let bytes = serde_json::to_vec_pretty(state).map_err(|e| storage_error(path, e))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(|e| storage_error(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| storage_error(path, e))?;
    Ok(())
}

fn storage_error(path: &Path, err: impl fmt::Display) -> LedgerError {
    LedgerError::Storage(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn client(id: u32, name: &str) -> Client {
        Client {
            id: ClientId(id),
            name: name.into(),
            phone: String::new(),
            debt_total: Decimal::ZERO,
        }
    }

    #[test]
    fn ids_are_sequential_and_never_reused() {
        let mut table: Table<Client> = Table::new();
        let a = table.allocate_id().unwrap();
        table.insert(client(a.0, "a")).unwrap();
        let b = table.allocate_id().unwrap();
        table.insert(client(b.0, "b")).unwrap();
        assert_eq!((a, b), (ClientId(1), ClientId(2)));

        table.delete(b);
        assert_eq!(table.allocate_id().unwrap(), ClientId(3));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut table: Table<Client> = Table::new();
        table.insert(client(1, "a")).unwrap();
        assert!(matches!(
            table.insert(client(1, "b")),
            Err(LedgerError::Storage(_))
        ));
    }

    #[test]
    fn require_reports_entity() {
        let table: Table<Client> = Table::new();
        assert_eq!(
            table.require(ClientId(5)).unwrap_err(),
            LedgerError::NotFound {
                entity: "client",
                id: 5
            }
        );
    }

    #[test]
    fn list_filters_in_id_order() {
        let mut table: Table<Client> = Table::new();
        for (id, name) in [(3, "c"), (1, "a"), (2, "b")] {
            table.insert(client(id, name)).unwrap();
        }
        let names: Vec<String> = table
            .list(|c| c.name != "b")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn failed_transaction_leaves_state_untouched() {
        let store = Store::in_memory();
        let result: Result<(), LedgerError> = store.transaction(|state| {
            let id = state.clients.allocate_id()?;
            state.clients.insert(client(id.0, "a"))?;
            Err(LedgerError::validation("abort"))
        });
        assert!(result.is_err());
        assert!(store.read(|state| state.clients.is_empty()));

        // the aborted allocation was discarded too
        let id = store
            .transaction(|state| state.clients.allocate_id())
            .unwrap();
        assert_eq!(id, ClientId(1));
    }

    #[test]
    fn update_runs_against_existing_row() {
        let store = Store::in_memory();
        store
            .transaction(|state| state.clients.insert(client(1, "a")))
            .unwrap();
        store
            .transaction(|state| {
                state.clients.update(ClientId(1), |c| {
                    c.debt_total += dec!(5.00);
                    Ok(())
                })
            })
            .unwrap();
        assert_eq!(
            store.read(|s| s.clients.get(ClientId(1)).map(|c| c.debt_total)),
            Some(dec!(5.00))
        );
    }

    #[test]
    fn table_round_trips_through_json() {
        let mut table: Table<Client> = Table::new();
        table.insert(client(2, "b")).unwrap();
        table.allocate_id().unwrap();
        let json = serde_json::to_string(&table).unwrap();
        let back: Table<Client> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.next_id, 4);
    }

    #[test]
    fn last_id_inserts_but_allocation_then_fails() {
        let mut table: Table<Client> = Table::new();
        table.insert(client(u32::MAX, "last")).unwrap();
        assert!(matches!(table.allocate_id(), Err(LedgerError::Storage(_))));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn exhausted_table_round_trips_without_wrapping() {
        let mut table: Table<Client> = Table::new();
        table.insert(client(u32::MAX, "last")).unwrap();
        let json = serde_json::to_string(&table).unwrap();
        let mut back: Table<Client> = serde_json::from_str(&json).unwrap();
        assert!(back.allocate_id().is_err());
    }

    #[test]
    fn exhausted_line_ids_fail_the_transaction() {
        let mut state = LedgerState::new();
        state.next_debt_line_id = u64::from(u32::MAX);
        assert_eq!(state.allocate_debt_line_id().unwrap(), DebtLineId(u32::MAX));
        assert!(matches!(
            state.allocate_debt_line_id(),
            Err(LedgerError::Storage(_))
        ));
    }

    #[test]
    fn line_ids_continue_after_reload_with_stale_counter() {
        let json = r#"{
            "deudas": {
                "siguiente_id": 2,
                "registros": [{
                    "id": 1,
                    "cliente_id": 1,
                    "venta_id": null,
                    "monto_total": "5.00",
                    "estado": "pendiente",
                    "fecha": "2024-05-01T10:00:00Z",
                    "lineas": [{
                        "id": 7,
                        "deuda_id": 1,
                        "producto_id": 1,
                        "cantidad": "1",
                        "precio_unitario": "5.00",
                        "estado": "pendiente"
                    }]
                }]
            },
            "siguiente_linea_id": 3
        }"#;
        let mut state: LedgerState = serde_json::from_str(json).unwrap();
        assert_eq!(state.allocate_debt_line_id().unwrap(), DebtLineId(8));
        assert_eq!(state.allocate_debt_line_id().unwrap(), DebtLineId(9));
        assert!(state.categories.is_empty());
    }
}
