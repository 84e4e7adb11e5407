//! WebAssembly module for the Repair Shop Management counter UI
//!
//! Runs the same money and stock rules as the server so the point-of-sale
//! and repair screens can preview figures before submitting:
//! - Invoice totals and payment status
//! - Repair job reconciliation (actual cost and balance)
//! - Low-stock flag and SKU/barcode checks
//!
//! Money crosses the boundary as decimal strings, never floats.

use std::str::FromStr;

use rust_decimal::Decimal;
use shared::{
    is_low_stock, validate_barcode, validate_sku, InvoiceTotals, PaymentStatus, PricedLine,
    RepairFinancials,
};
use wasm_bindgen::prelude::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("repair-shop-wasm loaded"));
}

fn parse_money(field: &str, raw: &str) -> Result<Decimal, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(raw).map_err(|_| format!("{}: not a decimal amount", field))
}

fn invoice_preview_json(lines_json: &str, discount: &str, paid: &str) -> Result<String, String> {
    let lines: Vec<PricedLine> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid lines JSON: {}", e))?;
    let discount = parse_money("discount", discount)?;
    let paid = parse_money("amountPaid", paid)?;

    let totals = InvoiceTotals::compute(&lines, discount).map_err(|e| e.to_string())?;
    let preview = serde_json::json!({
        "subtotal": totals.subtotal,
        "tax": totals.tax,
        "discount": totals.discount,
        "total": totals.total,
        "paymentStatus": totals.payment_status(paid).as_str(),
        "change": (paid - totals.total).max(Decimal::ZERO),
    });
    Ok(preview.to_string())
}

fn repair_balance_json(part_totals_json: &str, estimated_cost: &str, deposit_paid: &str) -> Result<String, String> {
    let part_totals: Vec<Decimal> =
        serde_json::from_str(part_totals_json).map_err(|e| format!("Invalid parts JSON: {}", e))?;
    let estimated_cost = parse_money("estimatedCost", estimated_cost)?;
    let deposit_paid = parse_money("depositPaid", deposit_paid)?;

    let financials = RepairFinancials::reconcile(part_totals, estimated_cost, deposit_paid);
    serde_json::to_string(&financials).map_err(|e| e.to_string())
}

/// Preview an invoice.
///
/// `lines_json` is `[{"quantity": 2, "unitPrice": "150.00"}, ...]`. Returns
/// the totals, payment status and change due as JSON.
#[wasm_bindgen]
pub fn preview_invoice(lines_json: &str, discount: &str, amount_paid: &str) -> Result<String, JsValue> {
    invoice_preview_json(lines_json, discount, amount_paid).map_err(|e| JsValue::from_str(&e))
}

/// `unpaid`, `partial` or `paid`
#[wasm_bindgen]
pub fn payment_status(amount_paid: &str, total: &str) -> Result<String, JsValue> {
    let paid = parse_money("amountPaid", amount_paid).map_err(|e| JsValue::from_str(&e))?;
    let total = parse_money("total", total).map_err(|e| JsValue::from_str(&e))?;
    Ok(PaymentStatus::from_amounts(paid, total).as_str().to_string())
}

/// Reconcile a repair job from its part totals, estimate and deposit
#[wasm_bindgen]
pub fn repair_balance(part_totals_json: &str, estimated_cost: &str, deposit_paid: &str) -> Result<String, JsValue> {
    repair_balance_json(part_totals_json, estimated_cost, deposit_paid).map_err(|e| JsValue::from_str(&e))
}

#[wasm_bindgen]
pub fn is_item_low_stock(quantity: i32, reorder_level: i32) -> bool {
    is_low_stock(quantity, reorder_level)
}

/// Empty string when valid, otherwise the reason
#[wasm_bindgen]
pub fn check_sku(sku: &str) -> String {
    validate_sku(sku).err().unwrap_or_default().to_string()
}

/// Empty string when valid, otherwise the reason
#[wasm_bindgen]
pub fn check_barcode(barcode: &str) -> String {
    validate_barcode(barcode).err().unwrap_or_default().to_string()
}
