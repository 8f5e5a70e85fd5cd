//! Fixed-point arithmetic shared by the accounting ledgers.
//!
//! All ratios and fractions are scaled by [`SCALE`] (1e18 = 1.0). Every
//! helper is checked: overflow and division by zero surface as
//! [`ManagerError::ArithmeticFault`] instead of wrapping or panicking.

use odra::casper_types::U256;
use crate::errors::ManagerError;

/// Fixed-point scale (1e18)
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// Minimum per-block issuance, in token base units (10,000 tokens at 18 decimals)
pub const MIN_ISSUANCE_RATE: u128 = 10_000 * SCALE;

/// `SCALE` as a `U256`
pub fn scale() -> U256 {
    U256::from(SCALE)
}

/// `a * b / d`, rounded down
pub fn mul_div(a: U256, b: U256, d: U256) -> Result<U256, ManagerError> {
    if d.is_zero() {
        return Err(ManagerError::ArithmeticFault);
    }
    a.checked_mul(b)
        .map(|v| v / d)
        .ok_or(ManagerError::ArithmeticFault)
}

/// `a * b / d`, rounded up
pub fn mul_div_up(a: U256, b: U256, d: U256) -> Result<U256, ManagerError> {
    if d.is_zero() {
        return Err(ManagerError::ArithmeticFault);
    }
    let product = a.checked_mul(b).ok_or(ManagerError::ArithmeticFault)?;
    ceil_div(product, d)
}

/// `ceil(a / b)`
pub fn ceil_div(a: U256, b: U256) -> Result<U256, ManagerError> {
    if b.is_zero() {
        return Err(ManagerError::ArithmeticFault);
    }
    let quotient = a / b;
    if (a % b).is_zero() {
        Ok(quotient)
    } else {
        Ok(quotient + U256::one())
    }
}

/// Apply a `SCALE`-denominated fraction to an amount
pub fn fraction_of(amount: U256, fraction: U256) -> Result<U256, ManagerError> {
    mul_div(amount, fraction, scale())
}

/// Per-block issuance rate: `max(MIN_ISSUANCE_RATE, supply * fraction / SCALE)`
pub fn issuance_rate(live_supply: U256, issuance_fraction: U256) -> Result<U256, ManagerError> {
    let proportional = fraction_of(live_supply, issuance_fraction)?;
    Ok(proportional.max(U256::from(MIN_ISSUANCE_RATE)))
}

/// Number of blocks needed to vest `amount` at `rate` tokens per block
pub fn vesting_blocks(amount: U256, rate: U256) -> Result<u64, ManagerError> {
    let blocks = ceil_div(amount, rate)?;
    if blocks > U256::from(u64::MAX) {
        return Err(ManagerError::ArithmeticFault);
    }
    Ok(blocks.as_u64())
}

/// `10^decimals` as a `U256`
pub fn pow10(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}
