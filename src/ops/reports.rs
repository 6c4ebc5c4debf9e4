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
//! Sales reports: one day, one month, best sellers.
//!
//! Days and months are calendar periods in UTC, the zone sale timestamps are
//! stored in. Running a report is itself recorded in the audit log.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::base::{Actor, ProductId};
use crate::engine::Engine;
use crate::error::LedgerError;
use crate::money::checked_total;
use crate::sale::Sale;

/// Sales of a period with their sums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesReport {
    /// Oldest first.
    pub sales: Vec<Sale>,
    pub total: Decimal,
    pub paid: Decimal,
    /// Part of `total` that was left unpaid at the counter.
    pub outstanding: Decimal,
}

impl SalesReport {
    fn from_sales(mut sales: Vec<Sale>) -> Result<Self, LedgerError> {
        sales.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(Self {
            total: checked_total(sales.iter().map(|s| s.total))?,
            paid: checked_total(sales.iter().map(|s| s.paid))?,
            outstanding: checked_total(sales.iter().map(Sale::outstanding))?,
            sales,
        })
    }

    pub fn count(&self) -> usize {
        self.sales.len()
    }
}

/// Units sold of one product across all sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSales {
    pub product_id: ProductId,
    /// Name on the most recent sale of the product.
    pub name: String,
    pub quantity: Decimal,
    pub revenue: Decimal,
}

impl Engine {
    fn sales_where<F>(&self, keep: F) -> Vec<Sale>
    where
        F: Fn(NaiveDate) -> bool,
    {
        self.store
            .read(|state| state.sales.list(|sale| keep(sale.created_at.date_naive())))
    }

    /// Sales registered on `date`.
    pub fn daily_sales(&self, date: NaiveDate, actor: &Actor) -> Result<SalesReport, LedgerError> {
        let report = SalesReport::from_sales(self.sales_where(|day| day == date))?;
        self.record_event(
            actor,
            "reporte_ventas_diarias",
            json!({ "fecha": date, "total_registros": report.count() }),
        );
        Ok(report)
    }

    /// Sales registered in `month` (1 to 12) of `year`.
    pub fn monthly_sales(&self, year: i32, month: u32, actor: &Actor) -> Result<SalesReport, LedgerError> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::validation(format!("invalid month {month}")));
        }
        let report = SalesReport::from_sales(
            self.sales_where(|day| day.year() == year && day.month() == month),
        )?;
        self.record_event(
            actor,
            "reporte_ventas_mensuales",
            json!({ "anio": year, "mes": month, "total_registros": report.count() }),
        );
        Ok(report)
    }

    /// Products by units sold, most first. Ties go to the lower product id.
    pub fn top_products(&self, limit: Option<usize>, actor: &Actor) -> Result<Vec<ProductSales>, LedgerError> {
        let mut sales = self.sales_where(|_| true);
        sales.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut by_product: BTreeMap<ProductId, ProductSales> = BTreeMap::new();
        for line in sales.iter().flat_map(|sale| sale.lines.iter()) {
            let entry = by_product.entry(line.product_id).or_insert_with(|| ProductSales {
                product_id: line.product_id,
                name: String::new(),
                quantity: Decimal::ZERO,
                revenue: Decimal::ZERO,
            });
            entry.name.clone_from(&line.name);
            entry.quantity = checked_total([entry.quantity, line.quantity])?;
            entry.revenue = checked_total([entry.revenue, line.subtotal()])?;
        }

        let mut ranking: Vec<ProductSales> = by_product.into_values().collect();
        ranking.sort_by(|a, b| b.quantity.cmp(&a.quantity).then(a.product_id.cmp(&b.product_id)));
        if let Some(limit) = limit {
            ranking.truncate(limit);
        }
        self.record_event(
            actor,
            "reporte_productos_mas_vendidos",
            json!({ "total_productos": ranking.len() }),
        );
        Ok(ranking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{ClientId, SaleId};
    use crate::product::ProductForm;
    use crate::sale::{NewSale, PaymentType, SaleItem};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn shop() -> (Engine, ProductId, ProductId) {
        let engine = Engine::new();
        let actor = Actor::system();
        engine.add_client("Ana", "", &actor).unwrap();
        engine.add_category("Electric", &actor).unwrap();
        let cable = engine
            .add_product(&ProductForm::new("Cable", dec!(10.00), dec!(100), "Electric"), &actor)
            .unwrap();
        let foco = engine
            .add_product(&ProductForm::new("Foco", dec!(3.00), dec!(100), "Electric"), &actor)
            .unwrap();
        (engine, cable.id, foco.id)
    }

    fn sell(engine: &Engine, items: Vec<SaleItem>, paid: Decimal) -> SaleId {
        let sale = NewSale {
            client_id: ClientId(1),
            items,
            paid,
            payment_type: PaymentType::Cash,
        };
        engine.register_sale(&sale, &Actor::system()).unwrap().sale.id
    }

    /// Moves a stored sale to another timestamp.
    fn backdate(engine: &Engine, sale_id: SaleId, y: i32, m: u32, d: u32) {
        engine
            .store
            .transaction(|state| {
                state.sales.update(sale_id, |sale| {
                    sale.created_at = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
                    Ok(())
                })
            })
            .unwrap();
    }

    #[test]
    fn daily_report_sums_one_day() {
        let (engine, cable, foco) = shop();
        let a = sell(&engine, vec![SaleItem::new(cable, dec!(2))], dec!(20.00));
        let b = sell(&engine, vec![SaleItem::new(foco, dec!(1))], dec!(1.00));
        let c = sell(&engine, vec![SaleItem::new(cable, dec!(1))], dec!(10.00));
        backdate(&engine, a, 2024, 5, 1);
        backdate(&engine, b, 2024, 5, 1);
        backdate(&engine, c, 2024, 5, 2);

        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let report = engine.daily_sales(day, &Actor::from("admin")).unwrap();
        assert_eq!(report.count(), 2);
        assert_eq!(report.total, dec!(23.00));
        assert_eq!(report.paid, dec!(21.00));
        assert_eq!(report.outstanding, dec!(2.00));

        let event = engine.audit_entries().unwrap().pop().unwrap();
        assert_eq!(event.action, "reporte_ventas_diarias");
        assert_eq!(event.details["fecha"], "2024-05-01");
        assert_eq!(event.details["total_registros"], 2);
    }

    #[test]
    fn monthly_report_covers_the_whole_month() {
        let (engine, cable, _) = shop();
        let ids: Vec<SaleId> = (0..3)
            .map(|_| sell(&engine, vec![SaleItem::new(cable, dec!(1))], dec!(10.00)))
            .collect();
        backdate(&engine, ids[0], 2024, 2, 1);
        backdate(&engine, ids[1], 2024, 2, 29);
        backdate(&engine, ids[2], 2024, 3, 1);

        let report = engine.monthly_sales(2024, 2, &Actor::system()).unwrap();
        let found: Vec<SaleId> = report.sales.iter().map(|s| s.id).collect();
        assert_eq!(found, vec![ids[0], ids[1]]);
        assert_eq!(report.total, dec!(20.00));
        assert!(engine.monthly_sales(2024, 13, &Actor::system()).unwrap_err().is_validation());
    }

    #[test]
    fn top_products_rank_by_units() {
        let (engine, cable, foco) = shop();
        sell(&engine, vec![SaleItem::new(cable, dec!(2)), SaleItem::new(foco, dec!(3))], dec!(29.00));
        sell(&engine, vec![SaleItem::new(foco, dec!(4))], dec!(12.00));
        sell(&engine, vec![SaleItem::new(cable, dec!(1))], dec!(10.00));

        let ranking = engine.top_products(None, &Actor::system()).unwrap();
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].product_id, foco);
        assert_eq!(ranking[0].quantity, dec!(7));
        assert_eq!(ranking[0].revenue, dec!(21.00));
        assert_eq!(ranking[1].name, "Cable");
        assert_eq!(ranking[1].quantity, dec!(3));

        let top = engine.top_products(Some(1), &Actor::system()).unwrap();
        assert_eq!(top.len(), 1);
        let event = engine.audit_entries().unwrap().pop().unwrap();
        assert_eq!(event.details["total_productos"], 1);
    }

    #[test]
    fn ranking_uses_the_latest_name() {
        let (engine, cable, _) = shop();
        sell(&engine, vec![SaleItem::new(cable, dec!(1))], dec!(10.00));
        let form = ProductForm::new("Cable 2mm", dec!(10.00), dec!(50), "Electric");
        engine.edit_product(cable, &form, &Actor::system()).unwrap();
        sell(&engine, vec![SaleItem::new(cable, dec!(1))], dec!(10.00));

        let ranking = engine.top_products(None, &Actor::system()).unwrap();
        assert_eq!(ranking[0].name, "Cable 2mm");
        assert_eq!(ranking[0].quantity, dec!(2));
    }
}
