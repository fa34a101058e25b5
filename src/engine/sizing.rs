//! Trade sizing: full capital minus moat.
//!
//! Everything above the network's moat and the fee overhead for a fixed
//! gas budget goes into the trade. Below the floor, the trade is skipped.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::chain::FeeEstimate;

const GWEI_PER_ETH: Decimal = dec!(1000000000);

#[derive(Debug, Clone)]
pub struct SizingPolicy {
    /// Gas units the fee overhead is budgeted for.
    pub fee_gas_units: u64,
    /// Base fee markup, in percent.
    pub fee_multiplier_pct: u32,
    /// Minimum trade size left after overhead (ETH).
    pub min_trade: Decimal,
}

/// Sized trade and the fees to submit it with.
#[derive(Debug, Clone, PartialEq)]
pub struct TradePlan {
    pub trade_size: Decimal,
    /// Moat plus budgeted fees (ETH).
    pub overhead: Decimal,
    pub max_fee_gwei: Decimal,
    pub priority_fee_gwei: Decimal,
}

/// Balance does not cover overhead plus the minimum trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Shortfall {
    pub required: Decimal,
    pub deficit: Decimal,
}

impl SizingPolicy {
    /// Size a trade from the wallet balance.
    ///
    /// `priority_override` replaces the node's priority fee estimate when set.
    pub fn plan(
        &self,
        balance: Decimal,
        fees: FeeEstimate,
        moat: Decimal,
        priority_override: Option<Decimal>,
    ) -> Result<TradePlan, Shortfall> {
        let priority = priority_override.unwrap_or(fees.priority_fee_gwei);
        let max_fee_gwei =
            fees.base_fee_gwei * Decimal::from(self.fee_multiplier_pct) / Decimal::ONE_HUNDRED + priority;

        let fee_overhead = Decimal::from(self.fee_gas_units) * max_fee_gwei / GWEI_PER_ETH;
        let overhead = fee_overhead + moat;
        let required = overhead + self.min_trade;

        if balance < required {
            return Err(Shortfall {
                required,
                deficit: required - balance,
            });
        }

        Ok(TradePlan {
            trade_size: balance - overhead,
            overhead,
            max_fee_gwei,
            priority_fee_gwei: priority,
        })
    }
}
