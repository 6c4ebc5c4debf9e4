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
//! Product categories.
//!
//! Products refer to a category by its registered name. Renaming a category
//! renames it on every product in the same transaction, and a category that
//! is still in use cannot be deleted.

use serde_json::json;

use crate::base::{Actor, CategoryId};
use crate::category::{Category, validated_name};
use crate::engine::Engine;
use crate::error::LedgerError;
use crate::store::LedgerState;

fn ensure_unique_name(
    state: &LedgerState,
    name: &str,
    ignore: Option<CategoryId>,
) -> Result<(), LedgerError> {
    let taken = state
        .categories
        .iter()
        .any(|c| c.has_name(name) && Some(c.id) != ignore);
    if taken {
        return Err(LedgerError::validation(format!(
            "a category named '{name}' already exists"
        )));
    }
    Ok(())
}

/// Returns the registered spelling of a category name.
///
/// # Errors
///
/// [`LedgerError::Validation`] if no category has that name.
pub(crate) fn resolve_category(state: &LedgerState, name: &str) -> Result<String, LedgerError> {
    state
        .categories
        .iter()
        .find(|c| c.has_name(name))
        .map(|c| c.name.clone())
        .ok_or_else(|| LedgerError::validation(format!("unknown category '{}'", name.trim())))
}

impl Engine {
    pub fn add_category(&self, name: &str, actor: &Actor) -> Result<Category, LedgerError> {
        let name = validated_name(name)?;
        let category = self.store.transaction(|state| {
            ensure_unique_name(state, &name, None)?;
            let category = Category {
                id: state.categories.allocate_id()?,
                name,
            };
            state.categories.insert(category.clone())?;
            Ok(category)
        })?;
        tracing::debug!(category = %category.id, "added category");
        self.record_event(
            actor,
            "agregar_categoria",
            json!({ "categoria_id": category.id, "nombre": category.name }),
        );
        Ok(category)
    }

    /// Renames a category and every product filed under it.
    pub fn rename_category(
        &self,
        category_id: CategoryId,
        name: &str,
        actor: &Actor,
    ) -> Result<Category, LedgerError> {
        let name = validated_name(name)?;
        let (previous, category, moved) = self.store.transaction(|state| {
            ensure_unique_name(state, &name, Some(category_id))?;
            let previous = state.categories.require(category_id)?.name.clone();
            let category = state.categories.update(category_id, |category| {
                category.name = name;
                Ok(category.clone())
            })?;
            let ids: Vec<_> = state
                .products
                .iter()
                .filter(|p| p.category == previous)
                .map(|p| p.id)
                .collect();
            for id in &ids {
                state.products.update(*id, |product| {
                    product.category = category.name.clone();
                    Ok(())
                })?;
            }
            Ok((previous, category, ids.len()))
        })?;
        self.record_event(
            actor,
            "editar_categoria",
            json!({
                "categoria_id": category_id,
                "nombre_anterior": previous,
                "nombre_nuevo": category.name,
                "productos_actualizados": moved,
            }),
        );
        Ok(category)
    }

    /// Removes a category that no product uses.
    ///
    /// Returns `false` if the category does not exist.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Validation`] while products are filed under it.
    pub fn delete_category(&self, category_id: CategoryId, actor: &Actor) -> Result<bool, LedgerError> {
        let removed = self.store.transaction(|state| {
            let Some(category) = state.categories.get(category_id) else {
                return Ok(None);
            };
            let in_use = state.products.iter().filter(|p| p.category == category.name).count();
            if in_use > 0 {
                return Err(LedgerError::validation(format!(
                    "category '{}' is used by {in_use} product(s)",
                    category.name
                )));
            }
            Ok(state.categories.delete(category_id))
        })?;
        let Some(category) = removed else {
            return Ok(false);
        };
        self.record_event(
            actor,
            "eliminar_categoria",
            json!({ "categoria_id": category_id, "nombre": category.name }),
        );
        Ok(true)
    }

    pub fn get_category(&self, category_id: CategoryId) -> Option<Category> {
        self.store.read(|state| state.categories.get(category_id).cloned())
    }

    /// Looks a category up by name, ignoring case.
    pub fn find_category(&self, name: &str) -> Option<Category> {
        self.store
            .read(|state| state.categories.iter().find(|c| c.has_name(name)).cloned())
    }

    /// All categories, sorted by name.
    pub fn list_categories(&self) -> Vec<Category> {
        let mut categories = self.store.read(|state| state.categories.list(|_| true));
        categories.sort_by_key(|c| c.name.to_lowercase());
        categories
    }
}
