//! Point-of-sale invoicing
//!
//! An invoice, its lines, the matching stock debits and the customer's
//! running total are written in one transaction. All referenced items are
//! locked (in id order) and checked before anything is written, so a sale
//! either goes through in full or leaves no trace.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    Customer, DateRange, InvoiceTotals, LowStockEvent, PaymentStatus, PricedLine, SalesInvoice,
    SalesItem, StockDirection, StockReason,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::notification::NotificationService;
use crate::services::numbering::{
    default_generator, is_number_collision, NumberGenerator, INVOICE_PREFIX, MAX_NUMBER_ATTEMPTS,
};
use crate::services::stock_ledger::{StockLedgerService, StockMovement};
use crate::validation;

/// Sales service
#[derive(Clone)]
pub struct SalesService {
    db: PgPool,
    notifications: NotificationService,
    numbers: NumberGenerator,
}

/// Sale line as sent by the POS; older clients send `id` and `price`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineRequest {
    #[serde(alias = "id")]
    pub item_id: Uuid,
    pub quantity: i32,
    #[serde(alias = "price", alias = "sellingPrice")]
    pub unit_price: Option<Decimal>,
}

/// Create-sale request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub customer_id: Option<Uuid>,
    #[serde(alias = "lines")]
    pub items: Vec<SaleLineRequest>,
    #[validate(length(min = 1, max = 50))]
    pub payment_method: Option<String>,
    #[validate(custom = "validation::money")]
    pub discount: Option<Decimal>,
    #[serde(alias = "paidAmount")]
    #[validate(custom = "validation::money")]
    pub amount_paid: Option<Decimal>,
    pub notes: Option<String>,
}

/// One normalized sale line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleLine {
    pub item_id: Uuid,
    pub quantity: i32,
    /// `None` sells at the item's current selling price
    pub unit_price: Option<Decimal>,
}

/// Normalized create-sale input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInvoiceInput {
    pub customer_id: Option<Uuid>,
    pub lines: Vec<SaleLine>,
    pub payment_method: String,
    pub discount: Decimal,
    pub amount_paid: Decimal,
    pub notes: Option<String>,
}

impl CreateInvoiceRequest {
    /// Validate and collapse into one schema
    pub fn normalize(self) -> AppResult<CreateInvoiceInput> {
        self.validate()?;

        if self.items.is_empty() {
            return Err(AppError::validation("items", "A sale needs at least one item"));
        }
        for (idx, line) in self.items.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(AppError::validation(
                    "quantity",
                    format!("Line {}: quantity must be greater than zero", idx + 1),
                ));
            }
            if let Some(price) = line.unit_price {
                validation::ensure_money("unitPrice", price)
                    .map_err(|_| AppError::validation("unitPrice", format!("Line {}: invalid unit price", idx + 1)))?;
            }
        }

        Ok(CreateInvoiceInput {
            customer_id: self.customer_id,
            lines: self
                .items
                .into_iter()
                .map(|l| SaleLine {
                    item_id: l.item_id,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                })
                .collect(),
            payment_method: self
                .payment_method
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "cash".to_string()),
            discount: self.discount.unwrap_or(Decimal::ZERO),
            amount_paid: self.amount_paid.unwrap_or(Decimal::ZERO),
            notes: self.notes.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// Payment against an existing invoice
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentInput {
    #[validate(custom = "validation::positive_money")]
    pub amount: Decimal,
}

/// Invoice line with the item's identity
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub line: SalesItem,
    pub item_name: String,
    pub sku: String,
}

/// Invoice with lines and customer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: SalesInvoice,
    pub items: Vec<InvoiceLine>,
    pub customer: Option<Customer>,
}

#[derive(Debug, FromRow)]
struct LockedStock {
    id: Uuid,
    name: String,
    selling_price: Decimal,
    quantity: i32,
    is_active: bool,
}

const INVOICE_COLUMNS: &str = "id, invoice_number, customer_id, user_id, sale_date, subtotal, tax, \
     discount, total, paid_amount, payment_method, payment_status, notes, created_at, updated_at";

/// Units requested per item across all lines, in first-seen line order
fn merged_demand(lines: &[SaleLine]) -> AppResult<Vec<(Uuid, i32)>> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut totals: HashMap<Uuid, i32> = HashMap::new();
    for line in lines {
        let total = totals.entry(line.item_id).or_insert_with(|| {
            order.push(line.item_id);
            0
        });
        *total = total
            .checked_add(line.quantity)
            .ok_or_else(|| AppError::validation("quantity", "Quantity is too large"))?;
    }
    Ok(order.into_iter().map(|id| (id, totals[&id])).collect())
}

async fn insert_invoice(
    conn: &mut PgConnection,
    invoice_number: &str,
    user_id: Uuid,
    input: &CreateInvoiceInput,
    totals: &InvoiceTotals,
) -> Result<SalesInvoice, sqlx::Error> {
    sqlx::query_as::<_, SalesInvoice>(&format!(
        r#"
        INSERT INTO sales_invoices (
            invoice_number, customer_id, user_id, subtotal, tax, discount, total,
            paid_amount, payment_method, payment_status, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        INVOICE_COLUMNS
    ))
    .bind(invoice_number)
    .bind(input.customer_id)
    .bind(user_id)
    .bind(totals.subtotal)
    .bind(totals.tax)
    .bind(totals.discount)
    .bind(totals.total)
    .bind(input.amount_paid)
    .bind(&input.payment_method)
    .bind(totals.payment_status(input.amount_paid))
    .bind(&input.notes)
    .fetch_one(&mut *conn)
    .await
}

async fn load_detail(conn: &mut PgConnection, invoice_id: Uuid) -> AppResult<InvoiceDetail> {
    let invoice = sqlx::query_as::<_, SalesInvoice>(&format!(
        "SELECT {} FROM sales_invoices WHERE id = $1",
        INVOICE_COLUMNS
    ))
    .bind(invoice_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Invoice".to_string()))?;

    let items = sqlx::query_as::<_, InvoiceLine>(
        r#"
        SELECT si.id, si.invoice_id, si.item_id, si.line_number, si.quantity, si.unit_price, si.total,
               ii.name AS item_name, ii.sku
        FROM sales_items si
        JOIN inventory_items ii ON ii.id = si.item_id
        WHERE si.invoice_id = $1
        ORDER BY si.line_number
        "#,
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;

    let customer = match invoice.customer_id {
        Some(customer_id) => {
            sqlx::query_as::<_, Customer>(
                "SELECT id, name, phone, email, total_spent, created_at FROM customers WHERE id = $1",
            )
            .bind(customer_id)
            .fetch_optional(&mut *conn)
            .await?
        }
        None => None,
    };

    Ok(InvoiceDetail {
        invoice,
        items,
        customer,
    })
}

impl SalesService {
    /// Create a new SalesService instance
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self {
            db,
            notifications,
            numbers: default_generator(),
        }
    }

    /// Replace the invoice number generator
    pub fn with_number_generator(mut self, numbers: NumberGenerator) -> Self {
        self.numbers = numbers;
        self
    }

    /// Ring up a sale
    pub async fn create_invoice(&self, user_id: Uuid, input: CreateInvoiceInput) -> AppResult<InvoiceDetail> {
        let demand = merged_demand(&input.lines)?;

        let mut tx = self.db.begin().await?;

        if let Some(customer_id) = input.customer_id {
            let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM customers WHERE id = $1)")
                .bind(customer_id)
                .fetch_one(&mut *tx)
                .await?;
            if !exists {
                return Err(AppError::NotFound("Customer".to_string()));
            }
        }

        // Lock in id order so concurrent sales of overlapping items cannot deadlock
        let mut item_ids: Vec<Uuid> = demand.iter().map(|(id, _)| *id).collect();
        item_ids.sort();
        let stock: BTreeMap<Uuid, LockedStock> = sqlx::query_as::<_, LockedStock>(
            r#"
            SELECT id, name, selling_price, quantity, is_active
            FROM inventory_items
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&item_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| (row.id, row))
        .collect();

        for (item_id, requested) in &demand {
            let item = stock
                .get(item_id)
                .ok_or_else(|| AppError::NotFound(format!("Inventory item {}", item_id)))?;
            if !item.is_active {
                return Err(AppError::validation("itemId", format!("{} is no longer sold", item.name)));
            }
            if item.quantity < *requested {
                return Err(AppError::InsufficientStock {
                    item_id: item.id,
                    item_name: item.name.clone(),
                    available: item.quantity,
                    requested: *requested,
                });
            }
        }

        let priced: Vec<PricedLine> = input
            .lines
            .iter()
            .map(|line| PricedLine {
                quantity: line.quantity,
                unit_price: line
                    .unit_price
                    .or_else(|| stock.get(&line.item_id).map(|item| item.selling_price))
                    .unwrap_or(Decimal::ZERO),
            })
            .collect();
        let totals = InvoiceTotals::compute(&priced, input.discount)?;

        let mut attempt = 0;
        let invoice = loop {
            attempt += 1;
            let invoice_number = (self.numbers)(INVOICE_PREFIX, Utc::now());
            let mut savepoint = sqlx::Connection::begin(&mut *tx).await?;
            match insert_invoice(&mut savepoint, &invoice_number, user_id, &input, &totals).await {
                Ok(invoice) => {
                    savepoint.commit().await?;
                    break invoice;
                }
                Err(e) if is_number_collision(&e, "sales_invoices_invoice_number_key") => {
                    savepoint.rollback().await?;
                    tracing::warn!(attempt, invoice_number = %invoice_number, "Invoice number collision");
                    if attempt >= MAX_NUMBER_ATTEMPTS {
                        return Err(AppError::Conflict {
                            resource: "invoiceNumber".to_string(),
                            message: "Could not allocate a unique invoice number, please retry".to_string(),
                        });
                    }
                }
                Err(e) => return Err(e.into()),
            }
        };

        let mut low_stock: BTreeMap<Uuid, LowStockEvent> = BTreeMap::new();
        for (idx, (line, price)) in input.lines.iter().zip(&priced).enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sales_items (invoice_id, item_id, line_number, quantity, unit_price, total)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(invoice.id)
            .bind(line.item_id)
            .bind(idx as i32 + 1)
            .bind(line.quantity)
            .bind(price.unit_price)
            .bind(price.total())
            .execute(&mut *tx)
            .await?;

            let adjustment = StockLedgerService::apply(
                &mut tx,
                &StockMovement {
                    item_id: line.item_id,
                    quantity: line.quantity,
                    direction: StockDirection::Out,
                    reason: StockReason::Sale,
                    user_id,
                    reference_id: Some(invoice.id),
                    notes: Some(format!("Sale {}", invoice.invoice_number)),
                },
            )
            .await?;
            if let Some(event) = adjustment.low_stock {
                low_stock.insert(event.item_id, event);
            }
        }

        if let Some(customer_id) = input.customer_id {
            sqlx::query("UPDATE customers SET total_spent = total_spent + $2 WHERE id = $1")
                .bind(customer_id)
                .bind(totals.total)
                .execute(&mut *tx)
                .await?;
        }

        let detail = load_detail(&mut tx, invoice.id).await?;

        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            lines = input.lines.len(),
            total = %totals.total,
            payment_status = invoice.payment_status.as_str(),
            "Sale recorded"
        );

        let events: Vec<LowStockEvent> = low_stock.into_values().collect();
        self.notifications.low_stock_best_effort(&events).await;

        Ok(detail)
    }

    /// Invoice with lines and customer
    pub async fn get_invoice(&self, invoice_id: Uuid) -> AppResult<InvoiceDetail> {
        let mut conn = self.db.acquire().await?;
        load_detail(&mut conn, invoice_id).await
    }

    /// Invoices whose sale date falls inside `range`, newest first
    pub async fn list_invoices(&self, range: DateRange) -> AppResult<Vec<SalesInvoice>> {
        let invoices = sqlx::query_as::<_, SalesInvoice>(&format!(
            r#"
            SELECT {}
            FROM sales_invoices
            WHERE sale_date >= $1 AND sale_date < $2
            ORDER BY sale_date DESC
            "#,
            INVOICE_COLUMNS
        ))
        .bind(range.start_of_day())
        .bind(range.end_exclusive())
        .fetch_all(&self.db)
        .await?;

        Ok(invoices)
    }

    /// Add a payment and re-derive the payment status
    pub async fn record_payment(&self, invoice_id: Uuid, input: RecordPaymentInput) -> AppResult<SalesInvoice> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let (paid_amount, total) = sqlx::query_as::<_, (Decimal, Decimal)>(
            "SELECT paid_amount, total FROM sales_invoices WHERE id = $1 FOR UPDATE",
        )
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Invoice".to_string()))?;

        let paid_amount = paid_amount + input.amount;
        let invoice = sqlx::query_as::<_, SalesInvoice>(&format!(
            r#"
            UPDATE sales_invoices
            SET paid_amount = $2, payment_status = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .bind(paid_amount)
        .bind(PaymentStatus::from_amounts(paid_amount, total))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            amount = %input.amount,
            payment_status = invoice.payment_status.as_str(),
            "Payment recorded"
        );
        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> CreateInvoiceRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn aliases_collapse_into_one_schema() {
        let item = Uuid::new_v4();
        let legacy = request(&format!(r#"{{"items":[{{"id":"{}","quantity":1,"price":"9.99"}}]}}"#, item));
        let modern = request(&format!(r#"{{"items":[{{"itemId":"{}","quantity":1,"unitPrice":"9.99"}}]}}"#, item));
        let pos = request(&format!(r#"{{"items":[{{"itemId":"{}","quantity":1,"sellingPrice":"9.99"}}]}}"#, item));

        let expected = legacy.normalize().unwrap();
        assert_eq!(modern.normalize().unwrap(), expected);
        assert_eq!(pos.normalize().unwrap(), expected);
        assert_eq!(expected.lines[0].unit_price, Some(Decimal::new(999, 2)));
        assert_eq!(expected.payment_method, "cash");
        assert_eq!(expected.amount_paid, Decimal::ZERO);
    }

    #[test]
    fn empty_and_non_positive_lines_rejected() {
        assert!(matches!(
            request(r#"{"items":[]}"#).normalize(),
            Err(AppError::Validation { ref field, .. }) if field == "items"
        ));
        let zero = request(&format!(r#"{{"items":[{{"itemId":"{}","quantity":0}}]}}"#, Uuid::new_v4()));
        assert!(matches!(zero.normalize(), Err(AppError::Validation { ref field, .. }) if field == "quantity"));
    }

    #[test]
    fn negative_money_rejected() {
        let item = Uuid::new_v4();
        let price = request(&format!(r#"{{"items":[{{"itemId":"{}","quantity":1,"unitPrice":"-1"}}]}}"#, item));
        assert!(price.normalize().is_err());
        let discount = request(&format!(r#"{{"items":[{{"itemId":"{}","quantity":1}}],"discount":"-5"}}"#, item));
        assert!(discount.normalize().is_err());
    }

    #[test]
    fn demand_merges_repeated_items_in_line_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let line = |item_id, quantity| SaleLine {
            item_id,
            quantity,
            unit_price: None,
        };
        let demand = merged_demand(&[line(b, 1), line(a, 2), line(b, 3)]).unwrap();
        assert_eq!(demand, vec![(b, 4), (a, 2)]);
    }
}
