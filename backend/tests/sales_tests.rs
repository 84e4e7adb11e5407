//! Sales invoicing integration tests
//!
//! Properties covered:
//! - A sale decrements stock and records one `sale` transaction per line
//! - A sale that cannot be fully stocked writes nothing
//! - Payment status follows the amount paid
//! - Customer lifetime spend grows by the invoice total
//! - Invoice number collisions are retried, then surface as a conflict

mod common;

use common::*;
use repair_shop_backend::services::customer::{CreateCustomerInput, CustomerService};
use repair_shop_backend::services::sales::{
    CreateInvoiceInput, CreateInvoiceRequest, RecordPaymentInput, SaleLine, SalesService,
};
use repair_shop_backend::services::numbering::MAX_NUMBER_ATTEMPTS;
use repair_shop_backend::AppError;
use rust_decimal::Decimal;
use shared::{PaymentStatus, StockDirection, StockReason};
use std::sync::atomic::Ordering;
use uuid::Uuid;

fn sale(lines: Vec<SaleLine>, amount_paid: Decimal) -> CreateInvoiceInput {
    CreateInvoiceInput {
        customer_id: None,
        lines,
        payment_method: "cash".to_string(),
        discount: Decimal::ZERO,
        amount_paid,
        notes: None,
    }
}

fn line(item_id: Uuid, quantity: i32, unit_price: Option<Decimal>) -> SaleLine {
    SaleLine {
        item_id,
        quantity,
        unit_price,
    }
}

/// Selling 3 of 4 at 100 fully paid leaves 1 in stock and a paid invoice
#[tokio::test]
async fn paid_sale_decrements_stock_and_links_transaction() {
    let Some(pool) = test_pool().await else { return };
    let user = seed_user(&pool, "Cashier").await;
    let item = seed_item(&pool, user, 4, 0, money(6000), money(12000)).await;
    let sales = SalesService::new(pool.clone(), notifications(&pool));

    let detail = sales
        .create_invoice(
            user,
            sale(vec![line(item.id, 3, Some(Decimal::from(100)))], Decimal::from(300)),
        )
        .await
        .unwrap();

    assert_eq!(detail.invoice.total, Decimal::from(300));
    assert_eq!(detail.invoice.payment_status, PaymentStatus::Paid);
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].line.total, Decimal::from(300));
    assert_eq!(item_quantity(&pool, item.id).await, 1);

    let rows = sqlx::query_as::<_, (i32, StockDirection, StockReason)>(
        "SELECT quantity, direction, reason FROM inventory_transactions WHERE reference_id = $1",
    )
    .bind(detail.invoice.id)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(rows, vec![(3, StockDirection::Out, StockReason::Sale)]);
}

/// Omitted prices fall back to the item's selling price; nothing paid is unpaid
#[tokio::test]
async fn default_price_and_unpaid_status() {
    let Some(pool) = test_pool().await else { return };
    let user = seed_user(&pool, "Cashier").await;
    let item = seed_item(&pool, user, 5, 0, money(4000), money(7550)).await;
    let sales = SalesService::new(pool.clone(), notifications(&pool));

    let detail = sales
        .create_invoice(user, sale(vec![line(item.id, 2, None)], Decimal::ZERO))
        .await
        .unwrap();

    assert_eq!(detail.invoice.total, money(15100));
    assert_eq!(detail.invoice.payment_status, PaymentStatus::Unpaid);
    assert_eq!(detail.invoice.payment_method, "cash");
}

/// Requesting 5 of 2 fails with the available quantity and writes nothing
#[tokio::test]
async fn oversell_is_rejected_with_available_quantity() {
    let Some(pool) = test_pool().await else { return };
    let user = seed_user(&pool, "Cashier").await;
    let item = seed_item(&pool, user, 2, 0, money(1000), money(2000)).await;
    let sales = SalesService::new(pool.clone(), notifications(&pool));

    let err = sales
        .create_invoice(user, sale(vec![line(item.id, 5, None)], Decimal::ZERO))
        .await
        .unwrap_err();

    match err {
        AppError::InsufficientStock {
            available,
            requested,
            ..
        } => {
            assert_eq!(available, 2);
            assert_eq!(requested, 5);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(item_quantity(&pool, item.id).await, 2);
    let sale_rows = count(
        &pool,
        "SELECT COUNT(*) FROM sales_items WHERE item_id = $1",
        item.id,
    )
    .await;
    assert_eq!(sale_rows, 0);
}

/// When a later line fails, earlier lines are not committed either
#[tokio::test]
async fn failing_second_line_rolls_back_the_whole_sale() {
    let Some(pool) = test_pool().await else { return };
    let user = seed_user(&pool, "Cashier").await;
    let plenty = seed_item(&pool, user, 10, 0, money(1000), money(2000)).await;
    let scarce = seed_item(&pool, user, 1, 0, money(1000), money(2000)).await;
    let sales = SalesService::new(pool.clone(), notifications(&pool));

    let err = sales
        .create_invoice(
            user,
            sale(vec![line(plenty.id, 2, None), line(scarce.id, 3, None)], Decimal::ZERO),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    assert_eq!(item_quantity(&pool, plenty.id).await, 10);
    assert_eq!(item_quantity(&pool, scarce.id).await, 1);
    let invoices = count(
        &pool,
        "SELECT COUNT(*) FROM sales_invoices WHERE user_id = $1",
        user,
    )
    .await;
    assert_eq!(invoices, 0);
    let sale_movements = count(
        &pool,
        "SELECT COUNT(*) FROM inventory_transactions WHERE item_id = $1 AND reason = 'sale'",
        plenty.id,
    )
    .await;
    assert_eq!(sale_movements, 0);
}

/// Two lines for the same item are checked against combined demand
#[tokio::test]
async fn repeated_item_lines_share_the_stock_check() {
    let Some(pool) = test_pool().await else { return };
    let user = seed_user(&pool, "Cashier").await;
    let item = seed_item(&pool, user, 3, 0, money(1000), money(2000)).await;
    let sales = SalesService::new(pool.clone(), notifications(&pool));

    let err = sales
        .create_invoice(
            user,
            sale(vec![line(item.id, 2, None), line(item.id, 2, None)], Decimal::ZERO),
        )
        .await
        .unwrap_err();

    match err {
        AppError::InsufficientStock { requested, .. } => assert_eq!(requested, 4),
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(item_quantity(&pool, item.id).await, 3);
}

/// Customer spend grows by the invoice total; later payments settle it
#[tokio::test]
async fn customer_spend_and_follow_up_payment() {
    let Some(pool) = test_pool().await else { return };
    let user = seed_user(&pool, "Cashier").await;
    let item = seed_item(&pool, user, 6, 0, money(1000), money(2500)).await;
    let customer = CustomerService::new(pool.clone())
        .create_customer(CreateCustomerInput {
            name: "Walk-in Regular".to_string(),
            phone: Some("0812345678".to_string()),
            email: None,
        })
        .await
        .unwrap();
    let sales = SalesService::new(pool.clone(), notifications(&pool));

    let mut input = sale(vec![line(item.id, 2, None)], Decimal::from(20));
    input.customer_id = Some(customer.id);
    let detail = sales.create_invoice(user, input).await.unwrap();
    assert_eq!(detail.invoice.total, Decimal::from(50));
    assert_eq!(detail.invoice.payment_status, PaymentStatus::Partial);
    assert_eq!(detail.customer.as_ref().map(|c| c.id), Some(customer.id));

    let spent = sqlx::query_scalar::<_, Decimal>("SELECT total_spent FROM customers WHERE id = $1")
        .bind(customer.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(spent, Decimal::from(50));

    let settled = sales
        .record_payment(
            detail.invoice.id,
            RecordPaymentInput {
                amount: Decimal::from(30),
            },
        )
        .await
        .unwrap();
    assert_eq!(settled.paid_amount, Decimal::from(50));
    assert_eq!(settled.payment_status, PaymentStatus::Paid);
}

/// Unknown customers are rejected before any stock moves
#[tokio::test]
async fn unknown_customer_is_not_found() {
    let Some(pool) = test_pool().await else { return };
    let user = seed_user(&pool, "Cashier").await;
    let item = seed_item(&pool, user, 6, 0, money(1000), money(2500)).await;
    let sales = SalesService::new(pool.clone(), notifications(&pool));

    let mut input = sale(vec![line(item.id, 1, None)], Decimal::ZERO);
    input.customer_id = Some(Uuid::new_v4());
    let err = sales.create_invoice(user, input).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(item_quantity(&pool, item.id).await, 6);
}

/// One collision is absorbed by regenerating the number
#[tokio::test]
async fn invoice_number_collision_is_retried() {
    let Some(pool) = test_pool().await else { return };
    let user = seed_user(&pool, "Cashier").await;
    let item = seed_item(&pool, user, 5, 0, money(1000), money(2000)).await;

    let taken = unique_number("INV");
    let (first, _) = repeating_generator(taken.clone(), usize::MAX);
    let existing = SalesService::new(pool.clone(), notifications(&pool))
        .with_number_generator(first)
        .create_invoice(user, sale(vec![line(item.id, 1, None)], Decimal::ZERO))
        .await
        .unwrap();
    assert_eq!(existing.invoice.invoice_number, taken);

    let (generator, calls) = repeating_generator(taken.clone(), 1);
    let detail = SalesService::new(pool.clone(), notifications(&pool))
        .with_number_generator(generator)
        .create_invoice(user, sale(vec![line(item.id, 2, None)], Decimal::ZERO))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_ne!(detail.invoice.invoice_number, taken);
    assert!(detail.invoice.invoice_number.starts_with("INV-"));
    assert_eq!(item_quantity(&pool, item.id).await, 2);
}

/// Persistent collisions give up after the bounded attempts with a 409
#[tokio::test]
async fn exhausted_invoice_numbers_conflict_without_side_effects() {
    let Some(pool) = test_pool().await else { return };
    let user = seed_user(&pool, "Cashier").await;
    let item = seed_item(&pool, user, 5, 0, money(1000), money(2000)).await;

    let taken = unique_number("INV");
    let (first, _) = repeating_generator(taken.clone(), usize::MAX);
    let sales = SalesService::new(pool.clone(), notifications(&pool)).with_number_generator(first);
    sales
        .create_invoice(user, sale(vec![line(item.id, 1, None)], Decimal::ZERO))
        .await
        .unwrap();

    let (stuck, calls) = repeating_generator(taken, usize::MAX);
    let err = SalesService::new(pool.clone(), notifications(&pool))
        .with_number_generator(stuck)
        .create_invoice(user, sale(vec![line(item.id, 2, None)], Decimal::ZERO))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict { ref resource, .. } if resource == "invoiceNumber"));
    assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    assert_eq!(calls.load(Ordering::SeqCst), MAX_NUMBER_ATTEMPTS);
    assert_eq!(item_quantity(&pool, item.id).await, 4);
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Client aliases normalize into one input shape
    #[test]
    fn request_aliases_normalize() {
        let item = Uuid::new_v4();
        let request: CreateInvoiceRequest = serde_json::from_value(serde_json::json!({
            "lines": [{ "id": item, "quantity": 2, "sellingPrice": "12.50" }],
            "paidAmount": "25.00",
            "paymentMethod": " Card "
        }))
        .unwrap();

        let input = request.normalize().unwrap();
        assert_eq!(input.lines.len(), 1);
        assert_eq!(input.lines[0].item_id, item);
        assert_eq!(input.lines[0].unit_price, Some(money(1250)));
        assert_eq!(input.amount_paid, money(2500));
        assert_eq!(input.payment_method, "card");
        assert_eq!(input.discount, Decimal::ZERO);
    }

    /// Empty sales are rejected before touching the database
    #[test]
    fn empty_sale_is_rejected() {
        let request: CreateInvoiceRequest =
            serde_json::from_value(serde_json::json!({ "items": [] })).unwrap();
        assert!(matches!(request.normalize(), Err(AppError::Validation { .. })));
    }
}
