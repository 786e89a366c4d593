//! # Domain Invariants
//!
//! Business rules applied before a donation is submitted.

use super::errors::{DonationError, DonationResult};
use rust_decimal::Decimal;

/// Invariant: Amount is positive.
pub fn invariant_amount_positive(amount: Decimal) -> DonationResult<()> {
    if amount <= Decimal::ZERO {
        return Err(DonationError::InvalidAmount(format!(
            "{} must be greater than zero",
            amount
        )));
    }
    Ok(())
}

/// Invariant: Amount meets the minimum donation.
pub fn invariant_minimum_donation(amount: Decimal, minimum: Decimal) -> DonationResult<()> {
    if amount < minimum {
        return Err(DonationError::InvalidAmount(format!(
            "minimum donation is {}, got {}",
            minimum, amount
        )));
    }
    Ok(())
}

/// Invariant: Amount does not exceed what the user can give.
pub fn invariant_within_maximum(amount: Decimal, maximum: Decimal) -> DonationResult<()> {
    if amount > maximum {
        return Err(DonationError::InvalidAmount(format!(
            "{} exceeds the wallet balance or the campaign maximum of {}",
            amount, maximum
        )));
    }
    Ok(())
}

/// Limits applied to a donation form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DonationLimits {
    /// Smallest accepted donation.
    pub minimum: Decimal,
    /// Optional cap set by the receiving campaign or milestone.
    pub cap: Option<Decimal>,
}

impl DonationLimits {
    /// Limits with a minimum and no cap.
    pub fn new(minimum: Decimal) -> Self {
        Self { minimum, cap: None }
    }

    /// Add a cap.
    pub fn with_cap(mut self, cap: Decimal) -> Self {
        self.cap = Some(cap);
        self
    }

    /// Largest donation allowed: the wallet balance, lowered to the cap if set.
    pub fn max_amount(&self, balance: Decimal) -> Decimal {
        match self.cap {
            Some(cap) if cap < balance => cap,
            _ => balance,
        }
    }

    /// Validate an amount against the limits and the wallet balance.
    pub fn validate(&self, amount: Decimal, balance: Decimal) -> DonationResult<()> {
        invariant_amount_positive(amount)?;
        invariant_minimum_donation(amount, self.minimum)?;
        invariant_within_maximum(amount, self.max_amount(balance))
    }
}
