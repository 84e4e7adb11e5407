//! Validation utilities shared by the backend and the browser client

use rust_decimal::Decimal;

// ============================================================================
// Inventory Validations
// ============================================================================

/// Validate SKU format (2-32 characters: uppercase letters, digits, '-' or '_')
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.len() < 2 {
        return Err("SKU must be at least 2 characters");
    }
    if sku.len() > 32 {
        return Err("SKU must be at most 32 characters");
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err("SKU must be uppercase alphanumeric, '-' or '_'");
    }
    Ok(())
}

/// Validate barcode (EAN-8, UPC-A, EAN-13 or ITF-14 digit strings)
pub fn validate_barcode(barcode: &str) -> Result<(), &'static str> {
    if !barcode.chars().all(|c| c.is_ascii_digit()) {
        return Err("Barcode must contain digits only");
    }
    match barcode.len() {
        8 | 12 | 13 | 14 => Ok(()),
        _ => Err("Barcode must be 8, 12, 13 or 14 digits"),
    }
}

// ============================================================================
// Money Validations
// ============================================================================

/// Amounts stored as NUMERIC(12,2)
pub fn validate_money(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    if amount.scale() > 2 && amount != amount.round_dp(2) {
        return Err("Amount cannot have more than 2 decimal places");
    }
    if !fits_money_column(amount) {
        return Err("Amount is too large");
    }
    Ok(())
}

/// Magnitude below 10^10, the NUMERIC(12,2) ceiling
pub fn fits_money_column(amount: Decimal) -> bool {
    amount.abs() < Decimal::from(10_000_000_000i64)
}

/// `unit × quantity`, refused when the product cannot be stored
pub fn checked_line_total(unit: Decimal, quantity: i32) -> Result<Decimal, &'static str> {
    unit.checked_mul(Decimal::from(quantity))
        .filter(|total| fits_money_column(*total))
        .ok_or("Line total is too large")
}

/// Strictly positive amount
pub fn validate_positive_money(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Amount must be positive");
    }
    validate_money(amount)
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Validate phone number: 7-15 digits, optional leading '+', separators allowed
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    if !phone
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')') || (i == 0 && c == '+'))
    {
        return Err("Phone number contains invalid characters");
    }
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(7..=15).contains(&digits) {
        return Err("Phone number must have 7 to 15 digits");
    }
    Ok(())
}

/// Non-blank text
pub fn validate_required_text(text: &str) -> Result<(), &'static str> {
    if text.trim().is_empty() {
        return Err("Value cannot be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn line_total_must_fit_money_column() {
        assert_eq!(checked_line_total(Decimal::new(1999, 2), 3), Ok(Decimal::new(5997, 2)));
        // 9,999,999,999.99 is the largest storable amount
        let top = Decimal::from_str("9999999999.99").unwrap();
        assert_eq!(checked_line_total(top, 1), Ok(top));
        assert!(checked_line_total(top, 2).is_err());
        assert!(checked_line_total(Decimal::from(5_000_000), 2_000).is_err());
        assert!(checked_line_total(Decimal::MAX, i32::MAX).is_err());
    }

    #[test]
    fn sku_rules() {
        assert!(validate_sku("LCD-IP12").is_ok());
        assert!(validate_sku("A").is_err());
        assert!(validate_sku("lcd-ip12").is_err());
        assert!(validate_sku(&"X".repeat(33)).is_err());
    }

    #[test]
    fn barcode_rules() {
        assert!(validate_barcode("8850999320014").is_ok());
        assert!(validate_barcode("12345").is_err());
        assert!(validate_barcode("88509993200A4").is_err());
    }

    #[test]
    fn money_rules() {
        assert!(validate_money(Decimal::ZERO).is_ok());
        assert!(validate_money(Decimal::from_str("19.99").unwrap()).is_ok());
        assert!(validate_money(Decimal::from_str("19.990").unwrap()).is_ok());
        assert!(validate_money(Decimal::from_str("19.999").unwrap()).is_err());
        assert!(validate_money(Decimal::from(-1)).is_err());
        assert!(validate_positive_money(Decimal::ZERO).is_err());
        assert!(validate_positive_money(Decimal::ONE).is_ok());
    }

    #[test]
    fn phone_rules() {
        assert!(validate_phone("081-234-5678").is_ok());
        assert!(validate_phone("+66 81 234 5678").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("08a2345678").is_err());
    }

    #[test]
    fn required_text() {
        assert!(validate_required_text("Screen").is_ok());
        assert!(validate_required_text("   ").is_err());
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("shop@example.com").is_ok());
        assert!(validate_email("shop").is_err());
    }
}
