//! Opportunity probe.
//!
//! Simulates the fixed three-leg loop base → target → stable → base
//! through a single quoter and reports the loop only when it returns
//! more than `min_profit` over the capital committed. This is a point
//! simulation: one path, one router, one size.

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chain::units;
use crate::types::TradeOpportunity;

/// Source of single-leg conversion quotes.
#[async_trait]
pub trait PriceQuoter: Send + Sync {
    /// Amount of `to` received for `amount_in` of `from`.
    async fn quote(&self, amount_in: U256, from: Address, to: Address) -> Result<U256>;
}

pub struct OpportunityProbe {
    quoter: Arc<dyn PriceQuoter>,
    /// Base asset of the loop (wrapped native).
    base: Address,
    /// Intermediate stable asset.
    stable: Address,
    min_profit: Decimal,
}

impl OpportunityProbe {
    pub fn new(
        quoter: Arc<dyn PriceQuoter>,
        base: Address,
        stable: Address,
        min_profit: Decimal,
    ) -> Self {
        Self {
            quoter,
            base,
            stable,
            min_profit,
        }
    }

    pub fn stable(&self) -> Address {
        self.stable
    }

    /// Quote one leg; zero or a failed call both mean "no liquidity".
    async fn leg(&self, step: usize, amount_in: U256, from: Address, to: Address) -> Option<U256> {
        match self.quoter.quote(amount_in, from, to).await {
            Ok(out) if out.is_zero() => {
                debug!(step, from = ?from, to = ?to, "Leg quoted zero");
                None
            }
            Ok(out) => Some(out),
            Err(e) => {
                warn!(step, from = ?from, to = ?to, error = %e, "Leg quote unavailable");
                None
            }
        }
    }

    /// Simulate the loop for `asset` with `capital` ETH.
    pub async fn probe(&self, asset: Address, capital: Decimal) -> Option<TradeOpportunity> {
        let amount_in = match units::eth_to_wei(capital) {
            Ok(wei) if !wei.is_zero() => wei,
            Ok(_) => return None,
            Err(e) => {
                warn!(capital = %capital, error = %e, "Capital not representable");
                return None;
            }
        };

        let target_out = self.leg(1, amount_in, self.base, asset).await?;
        let stable_out = self.leg(2, target_out, asset, self.stable).await?;
        let base_out = self.leg(3, stable_out, self.stable, self.base).await?;

        let final_amount = match units::wei_to_eth(base_out) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Final leg amount not representable");
                return None;
            }
        };
        let profit = final_amount - capital;

        if profit <= self.min_profit {
            debug!(
                asset = ?asset,
                capital = %capital,
                final_amount = %final_amount,
                profit = %profit,
                "Loop below profit threshold"
            );
            return None;
        }

        let opportunity = TradeOpportunity {
            asset: format!("{asset:?}"),
            capital,
            leg_outputs: [target_out, stable_out, base_out],
            final_amount,
            profit,
            roi: profit / capital,
        };
        info!(opportunity = %opportunity, "Profitable loop found");
        Some(opportunity)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{LegQuote, ScriptedQuoter};
    use rust_decimal_macros::dec;

    fn eth(n: u64) -> U256 {
        U256::exp10(18) * n
    }

    fn scripted(legs: Vec<LegQuote>) -> Arc<ScriptedQuoter> {
        Arc::new(ScriptedQuoter::new(legs))
    }

    fn probe_with(quoter: Arc<ScriptedQuoter>, min_profit: Decimal) -> OpportunityProbe {
        OpportunityProbe::new(
            quoter,
            Address::from_low_u64_be(1),
            Address::from_low_u64_be(2),
            min_profit,
        )
    }

    #[tokio::test]
    async fn test_losing_loop_returns_none() {
        // Legs [100, 200, 95] against capital 100 → profit -5.
        let quoter = scripted(vec![
            LegQuote::Fixed(eth(100)),
            LegQuote::Fixed(eth(200)),
            LegQuote::Fixed(eth(95)),
        ]);
        let probe = probe_with(quoter.clone(), dec!(0.001));
        let result = probe.probe(Address::from_low_u64_be(9), dec!(100)).await;
        assert!(result.is_none());
        assert_eq!(quoter.calls(), 3);
    }

    #[tokio::test]
    async fn test_profitable_loop() {
        let quoter = scripted(vec![
            LegQuote::Fixed(eth(100)),
            LegQuote::Fixed(eth(200)),
            LegQuote::Fixed(eth(105)),
        ]);
        let probe = probe_with(quoter, dec!(0.001));
        let opp = probe.probe(Address::from_low_u64_be(9), dec!(100)).await.unwrap();
        assert_eq!(opp.final_amount, dec!(105));
        assert_eq!(opp.profit, dec!(5));
        assert_eq!(opp.roi, dec!(0.05));
        assert_eq!(opp.leg_outputs[2], eth(105));
    }

    #[tokio::test]
    async fn test_positive_profit_at_threshold_returns_none() {
        // Profit of exactly 1 with threshold 1 is not enough.
        let quoter = scripted(vec![
            LegQuote::Fixed(eth(1)),
            LegQuote::Fixed(eth(1)),
            LegQuote::Fixed(eth(101)),
        ]);
        let probe = probe_with(quoter, dec!(1));
        assert!(probe.probe(Address::from_low_u64_be(9), dec!(100)).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_leg_aborts() {
        let quoter = scripted(vec![LegQuote::Fixed(eth(100)), LegQuote::Zero, LegQuote::Fixed(eth(500))]);
        let probe = probe_with(quoter.clone(), dec!(0.001));
        assert!(probe.probe(Address::from_low_u64_be(9), dec!(100)).await.is_none());
        // Third leg never quoted.
        assert_eq!(quoter.calls(), 2);
    }

    #[tokio::test]
    async fn test_first_leg_zero_aborts() {
        let quoter = scripted(vec![LegQuote::Zero]);
        let probe = probe_with(quoter.clone(), dec!(0.001));
        assert!(probe.probe(Address::from_low_u64_be(9), dec!(1)).await.is_none());
        assert_eq!(quoter.calls(), 1);
    }

    #[tokio::test]
    async fn test_quote_error_treated_as_no_liquidity() {
        let quoter = scripted(vec![LegQuote::Fixed(eth(100)), LegQuote::Fail]);
        let probe = probe_with(quoter, dec!(0.001));
        assert!(probe.probe(Address::from_low_u64_be(9), dec!(100)).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_capital_never_quotes() {
        let quoter = scripted(Vec::new());
        let probe = probe_with(quoter.clone(), dec!(0.001));
        assert!(probe.probe(Address::from_low_u64_be(9), Decimal::ZERO).await.is_none());
        assert_eq!(quoter.calls(), 0);
    }
}
