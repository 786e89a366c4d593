//! # Amount Conversion
//!
//! User amounts are arbitrary-precision decimals; the ledger speaks base units.

use super::errors::{Amount, DonationError, DonationResult};
use rust_decimal::Decimal;

/// Convert a user amount to base units (`1.5` ETH → `1.5e18` wei).
///
/// Rejects non-positive amounts and amounts with more fractional digits than
/// the token supports; nothing is rounded.
pub fn to_base_units(amount: Decimal, decimals: u8) -> DonationResult<Amount> {
    if amount <= Decimal::ZERO {
        return Err(DonationError::InvalidAmount(format!(
            "{} must be greater than zero",
            amount
        )));
    }

    let normalized = amount.normalize();
    let scale = normalized.scale();
    if scale > u32::from(decimals) {
        return Err(DonationError::InvalidAmount(format!(
            "{} has more than {} fractional digits",
            amount, decimals
        )));
    }

    let mantissa = Amount::from(normalized.mantissa().unsigned_abs());
    let factor = Amount::from(10u8)
        .checked_pow(Amount::from(u32::from(decimals) - scale))
        .ok_or_else(|| DonationError::InvalidAmount(format!("{} overflows", amount)))?;

    mantissa
        .checked_mul(factor)
        .ok_or_else(|| DonationError::InvalidAmount(format!("{} overflows", amount)))
}

/// Render base units as a decimal string (`1500000000000000000`, 18 → `1.5`).
pub fn format_base_units(units: Amount, decimals: u8) -> String {
    let digits = units.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
    } else {
        digits
    };
    let (integer, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{}.{}", integer, fraction)
    }
}
