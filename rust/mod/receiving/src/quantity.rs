//! Integer pack quantities.
//!
//! Received quantities arrive as decimals; packs only ever hold whole units.
//! [`round_half_up`] is the one place where that conversion happens, shared
//! by pack definition and scan comparison.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ReceivingError;

/// Round a non-negative quantity to whole units, halves rounding up.
///
/// `110.5 → 111`, `2.49 → 2`. Negative input is rejected rather than rounded.
pub fn round_half_up(quantity: Decimal) -> Result<i64, ReceivingError> {
    if quantity.is_sign_negative() && !quantity.is_zero() {
        return Err(ReceivingError::InvalidInput(format!(
            "quantity must not be negative, got {quantity}"
        )));
    }
    // MidpointAwayFromZero is half-up for non-negative values.
    quantity
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| ReceivingError::InvalidInput(format!("quantity {quantity} is too large")))
}

/// Split `total_quantity` into `pack_count` whole-unit packs.
///
/// The result sums to `round_half_up(total_quantity)` exactly. Leading packs
/// absorb the remainder, so `11 / 3` is `[4, 4, 3]`.
pub fn distribute(total_quantity: Decimal, pack_count: i64) -> Result<Vec<i64>, ReceivingError> {
    if pack_count <= 0 {
        return Err(ReceivingError::InvalidInput(format!(
            "pack count must be positive, got {pack_count}"
        )));
    }
    let total = round_half_up(total_quantity)?;
    let base = total / pack_count;
    let remainder = total % pack_count;

    Ok((0..pack_count)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect())
}
