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

//! Inventory: products and stock.
//!
//! A product's category must be registered; it is stored with the
//! registered spelling.

use rust_decimal::Decimal;
use serde_json::json;

use crate::base::{Actor, ProductId};
use crate::engine::Engine;
use crate::error::LedgerError;
use crate::money::checked_add;
use crate::ops::categories::resolve_category;
use crate::product::{Product, ProductForm};
use crate::store::LedgerState;

fn ensure_unique_name(
    state: &LedgerState,
    name: &str,
    ignore: Option<ProductId>,
) -> Result<(), LedgerError> {
    let taken = state
        .products
        .iter()
        .any(|p| p.has_name(name) && Some(p.id) != ignore);
    if taken {
        return Err(LedgerError::validation(format!(
            "a product named '{name}' already exists"
        )));
    }
    Ok(())
}

/// Adds `delta` units to a product's stock.
///
/// # Errors
///
/// [`LedgerError::InsufficientStock`] if the stock would go negative.
pub(crate) fn adjust_stock(
    state: &mut LedgerState,
    product_id: ProductId,
    delta: Decimal,
) -> Result<Product, LedgerError> {
    state.products.update(product_id, |product| {
        let next = checked_add(product.quantity, delta)?;
        if next < Decimal::ZERO {
            return Err(LedgerError::InsufficientStock {
                product_id,
                requested: -delta,
                available: product.quantity,
            });
        }
        product.quantity = next;
        Ok(product.clone())
    })
}

impl Engine {
    pub fn add_product(&self, form: &ProductForm, actor: &Actor) -> Result<Product, LedgerError> {
        let mut form = form.normalized()?;
        let product = self.store.transaction(|state| {
            ensure_unique_name(state, &form.name, None)?;
            form.category = resolve_category(state, &form.category)?;
            let product = form.into_product(state.products.allocate_id()?);
            state.products.insert(product.clone())?;
            Ok(product)
        })?;
        tracing::debug!(product = %product.id, "added product");
        self.record_event(
            actor,
            "agregar_producto",
            json!({ "producto_id": product.id, "producto": product }),
        );
        Ok(product)
    }

    /// Replaces every editable field of a product.
    pub fn edit_product(
        &self,
        product_id: ProductId,
        form: &ProductForm,
        actor: &Actor,
    ) -> Result<Product, LedgerError> {
        let mut form = form.normalized()?;
        let product = self.store.transaction(|state| {
            ensure_unique_name(state, &form.name, Some(product_id))?;
            form.category = resolve_category(state, &form.category)?;
            state.products.update(product_id, |product| {
                *product = form.into_product(product_id);
                Ok(product.clone())
            })
        })?;
        self.record_event(
            actor,
            "editar_producto",
            json!({ "producto_id": product.id, "producto": product }),
        );
        Ok(product)
    }

    /// Removes a product. Sales and debts that reference it keep the id.
    ///
    /// Returns `false` if the product does not exist.
    pub fn delete_product(&self, product_id: ProductId, actor: &Actor) -> Result<bool, LedgerError> {
        let removed = self
            .store
            .transaction(|state| Ok(state.products.delete(product_id)))?;
        let Some(product) = removed else {
            return Ok(false);
        };
        self.record_event(
            actor,
            "eliminar_producto",
            json!({ "producto_id": product_id, "nombre": product.name }),
        );
        Ok(true)
    }

    pub fn get_product(&self, product_id: ProductId) -> Option<Product> {
        self.store.read(|state| state.products.get(product_id).cloned())
    }

    pub fn list_products(&self) -> Vec<Product> {
        self.store.read(|state| state.products.list(|_| true))
    }

    /// Adds (or, with a negative `delta`, removes) units from stock.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] - Unknown product.
    /// - [`LedgerError::InsufficientStock`] - Stock would go negative.
    pub fn adjust_stock(
        &self,
        product_id: ProductId,
        delta: Decimal,
        actor: &Actor,
    ) -> Result<Product, LedgerError> {
        let product = self
            .store
            .transaction(|state| adjust_stock(state, product_id, delta))?;
        self.record_event(
            actor,
            "ajustar_stock",
            json!({ "producto_id": product_id, "cambio": delta, "stock": product.quantity }),
        );
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cable() -> ProductForm {
        ProductForm::new("Cable", dec!(2.50), dec!(10), "Electric")
    }

    fn shop() -> Engine {
        let engine = Engine::new();
        engine.add_category("Electric", &Actor::system()).unwrap();
        engine
    }

    #[test]
    fn add_and_get_product() {
        let engine = shop();
        let product = engine.add_product(&cable(), &Actor::system()).unwrap();
        assert_eq!(product.id, ProductId(1));
        assert_eq!(engine.get_product(product.id), Some(product));
    }

    #[test]
    fn duplicate_name_is_rejected_case_insensitively() {
        let engine = shop();
        engine.add_product(&cable(), &Actor::system()).unwrap();
        let dup = ProductForm::new("CABLE", dec!(1), dec!(1), "Electric");
        assert!(engine.add_product(&dup, &Actor::system()).unwrap_err().is_validation());
    }

    #[test]
    fn edit_may_keep_its_own_name() {
        let engine = shop();
        let product = engine.add_product(&cable(), &Actor::system()).unwrap();
        let form = ProductForm::new("cable", dec!(3.00), dec!(4), "Electric");
        let edited = engine.edit_product(product.id, &form, &Actor::system()).unwrap();
        assert_eq!(edited.price, dec!(3.00));
        assert_eq!(edited.quantity, dec!(4));
    }

    #[test]
    fn stock_cannot_go_negative() {
        let engine = shop();
        let product = engine.add_product(&cable(), &Actor::system()).unwrap();
        let err = engine
            .adjust_stock(product.id, dec!(-11), &Actor::system())
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                product_id: product.id,
                requested: dec!(11),
                available: dec!(10),
            }
        );
        let after = engine.adjust_stock(product.id, dec!(-10), &Actor::system()).unwrap();
        assert_eq!(after.quantity, Decimal::ZERO);
    }

    #[test]
    fn stock_overflow_is_a_validation_error() {
        let engine = shop();
        let product = engine.add_product(&cable(), &Actor::system()).unwrap();
        let err = engine
            .adjust_stock(product.id, Decimal::MAX, &Actor::system())
            .unwrap_err();
        assert_eq!(err, LedgerError::validation("amount out of range"));
        assert_eq!(engine.get_product(product.id).unwrap().quantity, dec!(10));
    }

    #[test]
    fn category_is_stored_with_registered_spelling() {
        let engine = shop();
        let product = engine
            .add_product(&ProductForm::new("Foco", dec!(1), dec!(1), " ELECTRIC "), &Actor::system())
            .unwrap();
        assert_eq!(product.category, "Electric");

        let moved = ProductForm::new("Foco", dec!(1), dec!(1), "Jardin");
        let err = engine.edit_product(product.id, &moved, &Actor::system()).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(engine.get_product(product.id).unwrap().category, "Electric");
    }

    #[test]
    fn product_events_carry_the_product_id() {
        let engine = shop();
        let product = engine.add_product(&cable(), &Actor::system()).unwrap();
        engine.edit_product(product.id, &cable(), &Actor::system()).unwrap();
        let events = engine.audit_entries().unwrap();
        let last = &events[events.len() - 2..];
        assert_eq!(last[0].action, "agregar_producto");
        assert_eq!(last[1].action, "editar_producto");
        assert!(last.iter().all(|e| e.details["producto_id"] == product.id.0));
    }

    #[test]
    fn delete_missing_product_returns_false() {
        let engine = Engine::new();
        assert!(!engine.delete_product(ProductId(3), &Actor::system()).unwrap());
    }
}
