//! `validator` adapters over the shared validation rules

use std::borrow::Cow;

use rust_decimal::Decimal;
use validator::ValidationError;

use crate::error::{AppError, AppResult};

fn adapt(code: &'static str, result: Result<(), &'static str>) -> Result<(), ValidationError> {
    result.map_err(|message| {
        let mut err = ValidationError::new(code);
        err.message = Some(Cow::Borrowed(message));
        err
    })
}

pub fn sku(value: &str) -> Result<(), ValidationError> {
    adapt("sku", shared::validate_sku(value))
}

pub fn barcode(value: &str) -> Result<(), ValidationError> {
    adapt("barcode", shared::validate_barcode(value))
}

/// Blank clears the barcode on update
pub fn barcode_or_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Ok(())
    } else {
        barcode(value)
    }
}

pub fn money(value: &Decimal) -> Result<(), ValidationError> {
    adapt("money", shared::validate_money(*value))
}

pub fn positive_money(value: &Decimal) -> Result<(), ValidationError> {
    adapt("positive_money", shared::validate_positive_money(*value))
}

pub fn phone(value: &str) -> Result<(), ValidationError> {
    adapt("phone", shared::validate_phone(value))
}

pub fn required_text(value: &str) -> Result<(), ValidationError> {
    adapt("required", shared::validate_required_text(value))
}

/// Explicit check for decimals that arrive outside a validated DTO
pub fn ensure_money(field: &str, value: Decimal) -> AppResult<()> {
    shared::validate_money(value).map_err(|msg| AppError::validation(field, msg))
}
