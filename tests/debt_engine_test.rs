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

//! Debt engine public API integration tests.

use pos_ledger::{
    Actor, ClientId, Debt, DebtId, DebtLineId, DebtStatus, Engine, LedgerError, NewDebtLine,
    ProductId, SaleId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn actor() -> Actor {
    Actor::from("caja1")
}

fn make_line(product_id: u32, quantity: Decimal, unit_price: Decimal) -> NewDebtLine {
    NewDebtLine::new(ProductId(product_id), quantity, unit_price)
}

fn engine_with_client() -> (Engine, ClientId) {
    let engine = Engine::new();
    let client = engine.add_client("Ana", "555-0101", &actor()).unwrap();
    (engine, client.id)
}

/// Debt with one line: 3 units at 10.00, 30.00 outstanding.
fn thirty_debt(engine: &Engine, client_id: ClientId) -> Debt {
    engine
        .create_debt(client_id, None, &[make_line(1, dec!(3), dec!(10.00))], &actor())
        .unwrap()
}

fn debt_total(engine: &Engine, client_id: ClientId) -> Decimal {
    engine.get_client(client_id).unwrap().debt_total
}

#[test]
fn create_debt_sums_lines_and_syncs_client() {
    let (engine, client_id) = engine_with_client();
    let debt = engine
        .create_debt(
            client_id,
            Some(SaleId(7)),
            &[make_line(1, dec!(3), dec!(10.00)), make_line(2, dec!(2), dec!(4.25))],
            &actor(),
        )
        .unwrap();

    assert_eq!(debt.total, dec!(38.50));
    assert_eq!(debt.status, DebtStatus::Pending);
    assert_eq!(debt.sale_id, Some(SaleId(7)));
    assert!(debt.lines.iter().all(|l| l.status == DebtStatus::Pending));
    assert!(debt.lines.iter().all(|l| l.debt_id == debt.id));
    assert_eq!(debt_total(&engine, client_id), dec!(38.50));
}

#[test]
fn create_debt_for_unknown_client_fails() {
    let engine = Engine::new();
    let result = engine.create_debt(ClientId(4), None, &[make_line(1, dec!(1), dec!(1))], &actor());
    assert_eq!(
        result,
        Err(LedgerError::NotFound {
            entity: "client",
            id: 4
        })
    );
    assert!(engine.list_debts().is_empty());
}

#[test]
fn create_debt_rejects_non_positive_lines() {
    let (engine, client_id) = engine_with_client();
    for line in [
        make_line(1, dec!(0), dec!(5.00)),
        make_line(1, dec!(2), dec!(0)),
        make_line(1, dec!(-1), dec!(5.00)),
        make_line(1, dec!(0.1), dec!(0.01)),
    ] {
        let err = engine.create_debt(client_id, None, &[line], &actor()).unwrap_err();
        assert!(err.is_validation());
    }
    assert_eq!(debt_total(&engine, client_id), Decimal::ZERO);
}

#[test]
fn oversized_line_is_rejected() {
    let (engine, client_id) = engine_with_client();
    let line = make_line(1, dec!(100000000000000000000), dec!(10000000000));
    let err = engine.create_debt(client_id, None, &[line], &actor()).unwrap_err();
    assert_eq!(err, LedgerError::Validation("amount out of range".into()));
    assert!(engine.list_debts().is_empty());
    assert_eq!(debt_total(&engine, client_id), Decimal::ZERO);
}

#[test]
fn debt_and_client_totals_cannot_overflow() {
    let (engine, client_id) = engine_with_client();
    let half = dec!(50000000000000000000000000000);

    // two lines that fit alone but not together
    let err = engine
        .create_debt(client_id, None, &[make_line(1, dec!(1), half), make_line(2, dec!(1), half)], &actor())
        .unwrap_err();
    assert!(err.is_validation());

    // one debt fits, a second one would push the client total past the limit
    engine
        .create_debt(client_id, None, &[make_line(1, dec!(1), half)], &actor())
        .unwrap();
    let err = engine
        .create_debt(client_id, None, &[make_line(1, dec!(1), half)], &actor())
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(engine.list_debts().len(), 1);
    assert_eq!(debt_total(&engine, client_id), half);
}

#[test]
fn partial_payment_reduces_unit_price() {
    let (engine, client_id) = engine_with_client();
    let debt = thirty_debt(&engine, client_id);
    let line_id = debt.lines[0].id;

    let debt = engine.pay_line(debt.id, line_id, dec!(12.00), &actor()).unwrap();

    let line = &debt.lines[0];
    assert_eq!(line.quantity, dec!(3));
    assert_eq!(line.unit_price, dec!(6.00));
    assert_eq!(line.status, DebtStatus::Pending);
    assert_eq!(debt.total, dec!(18.00));
    assert_eq!(debt.status, DebtStatus::Pending);
    assert_eq!(debt_total(&engine, client_id), dec!(18.00));
}

#[test]
fn exact_payment_closes_line_and_debt() {
    let (engine, client_id) = engine_with_client();
    let debt = thirty_debt(&engine, client_id);

    let debt = engine
        .pay_line(debt.id, debt.lines[0].id, dec!(30.00), &actor())
        .unwrap();

    assert_eq!(debt.lines[0].status, DebtStatus::Paid);
    assert_eq!(debt.lines[0].outstanding(), Decimal::ZERO);
    assert_eq!(debt.total, Decimal::ZERO);
    assert_eq!(debt.status, DebtStatus::Paid);
    assert_eq!(debt_total(&engine, client_id), Decimal::ZERO);
}

#[test]
fn overpayment_fails_without_mutation() {
    let (engine, client_id) = engine_with_client();
    let debt = thirty_debt(&engine, client_id);

    let result = engine.pay_line(debt.id, debt.lines[0].id, dec!(31.00), &actor());
    assert!(matches!(result, Err(LedgerError::Validation(_))));

    assert_eq!(engine.get_debt(debt.id), Some(debt));
    assert_eq!(debt_total(&engine, client_id), dec!(30.00));
}

#[test]
fn paying_a_paid_line_fails() {
    let (engine, client_id) = engine_with_client();
    let debt = thirty_debt(&engine, client_id);
    let line_id = debt.lines[0].id;
    engine.pay_line(debt.id, line_id, dec!(30.00), &actor()).unwrap();

    let result = engine.pay_line(debt.id, line_id, dec!(0.01), &actor());
    assert!(matches!(result, Err(LedgerError::Validation(_))));
    assert_eq!(debt_total(&engine, client_id), Decimal::ZERO);
}

#[test]
fn unknown_debt_or_line_is_not_found() {
    let (engine, client_id) = engine_with_client();
    let debt = thirty_debt(&engine, client_id);

    let missing_debt = engine.pay_line(DebtId(99), debt.lines[0].id, dec!(1), &actor());
    assert_eq!(
        missing_debt,
        Err(LedgerError::NotFound {
            entity: "debt",
            id: 99
        })
    );

    let missing_line = engine.pay_line(debt.id, DebtLineId(99), dec!(1), &actor());
    assert!(missing_line.unwrap_err().is_not_found());
}

#[test]
fn line_of_another_debt_is_not_found() {
    let (engine, client_id) = engine_with_client();
    let first = thirty_debt(&engine, client_id);
    let second = thirty_debt(&engine, client_id);

    let result = engine.pay_line(first.id, second.lines[0].id, dec!(1), &actor());
    assert!(result.unwrap_err().is_not_found());
    assert_eq!(debt_total(&engine, client_id), dec!(60.00));
}

#[test]
fn debt_is_paid_only_when_every_line_is() {
    let (engine, client_id) = engine_with_client();
    let debt = engine
        .create_debt(
            client_id,
            None,
            &[make_line(1, dec!(1), dec!(10.00)), make_line(2, dec!(2), dec!(5.00))],
            &actor(),
        )
        .unwrap();
    let (a, b) = (debt.lines[0].id, debt.lines[1].id);

    let debt = engine.pay_line(debt.id, a, dec!(10.00), &actor()).unwrap();
    assert_eq!(debt.status, DebtStatus::Pending);
    let debt = engine.pay_line(debt.id, b, dec!(4.00), &actor()).unwrap();
    assert_eq!(debt.status, DebtStatus::Pending);
    let debt = engine.pay_line(debt.id, b, dec!(6.00), &actor()).unwrap();
    assert_eq!(debt.status, DebtStatus::Paid);
    assert_eq!(debt_total(&engine, client_id), Decimal::ZERO);
}

#[test]
fn delete_debt_reverses_remaining_amount_only() {
    let (engine, client_id) = engine_with_client();
    let kept = thirty_debt(&engine, client_id);
    let deleted = thirty_debt(&engine, client_id);
    engine
        .pay_line(deleted.id, deleted.lines[0].id, dec!(12.00), &actor())
        .unwrap();
    assert_eq!(debt_total(&engine, client_id), dec!(48.00));

    assert_eq!(engine.delete_debt(deleted.id, &actor()), Ok(true));

    assert_eq!(engine.get_debt(deleted.id), None);
    assert!(engine.get_debt(kept.id).is_some());
    assert_eq!(debt_total(&engine, client_id), dec!(30.00));
}

#[test]
fn delete_missing_debt_returns_false() {
    let (engine, client_id) = engine_with_client();
    thirty_debt(&engine, client_id);

    assert_eq!(engine.delete_debt(DebtId(42), &actor()), Ok(false));
    assert_eq!(debt_total(&engine, client_id), dec!(30.00));
}

#[test]
fn debts_by_client_lists_newest_first() {
    let (engine, ana) = engine_with_client();
    let luis = engine.add_client("Luis", "", &actor()).unwrap().id;
    let first = thirty_debt(&engine, ana);
    thirty_debt(&engine, luis);
    let second = thirty_debt(&engine, ana);

    let ids: Vec<DebtId> = engine.debts_by_client(ana).iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(engine.list_debts().len(), 3);
}

#[test]
fn debt_lines_view_carries_parent_state() {
    let (engine, client_id) = engine_with_client();
    let debt = thirty_debt(&engine, client_id);
    engine
        .pay_line(debt.id, debt.lines[0].id, dec!(30.00), &actor())
        .unwrap();

    let lines = engine.list_debt_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].debt_id, debt.id);
    assert_eq!(lines[0].client_id, client_id);
    assert_eq!(lines[0].status, DebtStatus::Paid);
    assert_eq!(lines[0].debt_status, DebtStatus::Paid);
}

#[test]
fn operations_are_audited() {
    let (engine, client_id) = engine_with_client();
    let debt = thirty_debt(&engine, client_id);
    engine
        .pay_line(debt.id, debt.lines[0].id, dec!(5.00), &actor())
        .unwrap();
    engine.delete_debt(debt.id, &actor()).unwrap();

    let entries = engine.audit_entries().unwrap();
    let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(
        actions,
        vec!["agregar_cliente", "crear_deuda", "pago_deuda_producto", "eliminar_deuda"]
    );

    let payment = &entries[2];
    assert_eq!(payment.actor, actor());
    assert_eq!(payment.details["deuda_id"], debt.id.0);
    assert_eq!(payment.details["linea_id"], debt.lines[0].id.0);
    assert_eq!(payment.details["monto_pago"], "5.00");
    assert_eq!(payment.details["saldo_restante"], "25.00");
    assert_eq!(payment.details["estado_final"], "pendiente");
}

#[test]
fn failed_payment_is_not_audited() {
    let (engine, client_id) = engine_with_client();
    let debt = thirty_debt(&engine, client_id);
    let _ = engine.pay_line(debt.id, debt.lines[0].id, dec!(100), &actor());

    let entries = engine.audit_entries().unwrap();
    assert!(entries.iter().all(|e| e.action != "pago_deuda_producto"));
}

#[test]
fn reconciliation_repairs_drifted_totals() {
    let (engine, client_id) = engine_with_client();
    thirty_debt(&engine, client_id);
    engine.adjust_debt_total(client_id, dec!(7.00)).unwrap();
    assert_eq!(debt_total(&engine, client_id), dec!(37.00));

    let corrections = engine.reconcile_debt_totals(&actor()).unwrap();
    assert_eq!(corrections.len(), 1);
    assert_eq!(corrections[0].cached, dec!(37.00));
    assert_eq!(corrections[0].actual, dec!(30.00));
    assert_eq!(debt_total(&engine, client_id), dec!(30.00));

    assert!(engine.reconcile_debt_totals(&actor()).unwrap().is_empty());
}

#[test]
fn recompute_single_client() {
    let (engine, client_id) = engine_with_client();
    let debt = thirty_debt(&engine, client_id);
    engine
        .pay_line(debt.id, debt.lines[0].id, dec!(30.00), &actor())
        .unwrap();
    engine.adjust_debt_total(client_id, dec!(3.00)).unwrap();

    assert_eq!(engine.recompute_client_debt_total(client_id), Ok(Decimal::ZERO));
    assert!(engine.recompute_client_debt_total(ClientId(77)).unwrap_err().is_not_found());
}

#[test]
fn client_with_open_debt_cannot_be_deleted() {
    let (engine, client_id) = engine_with_client();
    let debt = thirty_debt(&engine, client_id);

    assert!(engine.delete_client(client_id, &actor()).unwrap_err().is_validation());

    engine
        .pay_line(debt.id, debt.lines[0].id, dec!(30.00), &actor())
        .unwrap();
    assert_eq!(engine.delete_client(client_id, &actor()), Ok(true));
    assert_eq!(engine.delete_client(client_id, &actor()), Ok(false));
}
