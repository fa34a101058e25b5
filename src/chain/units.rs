//! Decimal ↔ integer amount conversion.
//!
//! The pipeline sizes trades in decimal ETH and gwei; the wire speaks wei.

use ethers::types::U256;
use rust_decimal::Decimal;

use super::ChainError;

pub const ETH_DECIMALS: u32 = 18;
pub const GWEI_DECIMALS: u32 = 9;

/// Convert a decimal amount into an integer with `decimals` places,
/// truncating anything finer.
pub fn to_units(amount: Decimal, decimals: u32) -> Result<U256, ChainError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ChainError::Encoding(format!("negative amount {amount}")));
    }
    let scaled = amount
        .checked_mul(Decimal::from(10u64.pow(decimals)))
        .ok_or_else(|| ChainError::Encoding(format!("amount {amount} overflows")))?
        .trunc();
    let raw: u128 = scaled
        .to_string()
        .parse()
        .map_err(|e| ChainError::Encoding(format!("amount {amount}: {e}")))?;
    Ok(U256::from(raw))
}

/// Convert an integer amount with `decimals` places into a decimal.
pub fn from_units(raw: U256, decimals: u32) -> Result<Decimal, ChainError> {
    if raw > U256::from(i128::MAX as u128) {
        return Err(ChainError::Encoding(format!("amount {raw} too large")));
    }
    Decimal::try_from_i128_with_scale(raw.as_u128() as i128, decimals)
        .map(|d| d.normalize())
        .map_err(|e| ChainError::Encoding(format!("amount {raw}: {e}")))
}

pub fn eth_to_wei(eth: Decimal) -> Result<U256, ChainError> {
    to_units(eth, ETH_DECIMALS)
}

pub fn wei_to_eth(wei: U256) -> Result<Decimal, ChainError> {
    from_units(wei, ETH_DECIMALS)
}

pub fn gwei_to_wei(gwei: Decimal) -> Result<U256, ChainError> {
    to_units(gwei, GWEI_DECIMALS)
}

pub fn wei_to_gwei(wei: U256) -> Result<Decimal, ChainError> {
    from_units(wei, GWEI_DECIMALS)
}
