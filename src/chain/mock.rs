//! In-memory gateway and quoter for deterministic testing.
//!
//! Balances, fees, submission results and confirmations are all set from
//! test code; every submitted transaction is recorded.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ChainError, ChainGateway, FeeEstimate, TxRequest, TxStatus};
use crate::probe::PriceQuoter;

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

pub struct ScriptedGateway {
    name: String,
    balance: Mutex<Result<Decimal, ChainError>>,
    fees: Mutex<FeeEstimate>,
    nonce: AtomicU64,
    simulate_result: Mutex<Result<(), ChainError>>,
    submit_result: Mutex<Result<(), ChainError>>,
    /// `None` never resolves.
    confirmation: Mutex<Option<Result<TxStatus, ChainError>>>,
    submitted: Mutex<Vec<TxRequest>>,
    balance_reads: AtomicUsize,
}

impl ScriptedGateway {
    /// A gateway holding `balance` ETH with 1 gwei base / 0 priority fees,
    /// accepting every submission and confirming it successfully.
    pub fn new(name: &str, balance: Decimal) -> Self {
        Self {
            name: name.to_string(),
            balance: Mutex::new(Ok(balance)),
            fees: Mutex::new(FeeEstimate {
                base_fee_gwei: dec!(1),
                priority_fee_gwei: Decimal::ZERO,
            }),
            nonce: AtomicU64::new(0),
            simulate_result: Mutex::new(Ok(())),
            submit_result: Mutex::new(Ok(())),
            confirmation: Mutex::new(Some(Ok(TxStatus::Success))),
            submitted: Mutex::new(Vec::new()),
            balance_reads: AtomicUsize::new(0),
        }
    }

    pub fn with_fees(self, base_fee_gwei: Decimal, priority_fee_gwei: Decimal) -> Self {
        *self.fees.lock().unwrap() = FeeEstimate {
            base_fee_gwei,
            priority_fee_gwei,
        };
        self
    }

    pub fn fail_balance(self, err: ChainError) -> Self {
        *self.balance.lock().unwrap() = Err(err);
        self
    }

    pub fn fail_simulate(self, err: ChainError) -> Self {
        *self.simulate_result.lock().unwrap() = Err(err);
        self
    }

    pub fn fail_submit(self, err: ChainError) -> Self {
        *self.submit_result.lock().unwrap() = Err(err);
        self
    }

    pub fn confirm_with(self, result: Result<TxStatus, ChainError>) -> Self {
        *self.confirmation.lock().unwrap() = Some(result);
        self
    }

    pub fn never_confirm(self) -> Self {
        *self.confirmation.lock().unwrap() = None;
        self
    }

    /// Transactions accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<TxRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn balance_reads(&self) -> usize {
        self.balance_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainGateway for ScriptedGateway {
    fn network(&self) -> &str {
        &self.name
    }

    async fn balance(&self, _address: Address) -> Result<Decimal, ChainError> {
        self.balance_reads.fetch_add(1, Ordering::SeqCst);
        self.balance.lock().unwrap().clone()
    }

    async fn fee_estimate(&self) -> Result<FeeEstimate, ChainError> {
        Ok(*self.fees.lock().unwrap())
    }

    async fn pending_nonce(&self, _address: Address) -> Result<U256, ChainError> {
        let nonce = self.nonce.load(Ordering::SeqCst);
        // Give concurrent submitters a chance to interleave.
        tokio::task::yield_now().await;
        Ok(U256::from(nonce))
    }

    async fn simulate(&self, _tx: &TxRequest) -> Result<(), ChainError> {
        self.simulate_result.lock().unwrap().clone()
    }

    async fn submit_transaction(&self, tx: TxRequest) -> Result<String, ChainError> {
        self.submit_result.lock().unwrap().clone()?;
        let nonce = tx.nonce.as_u64();
        self.nonce.store(nonce + 1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(tx);
        Ok(format!("0x{nonce:064x}"))
    }

    async fn await_confirmation(
        &self,
        _tx_hash: &str,
        _confirmations: usize,
    ) -> Result<TxStatus, ChainError> {
        let result = self.confirmation.lock().unwrap().clone();
        match result {
            Some(r) => r,
            None => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Quoter
// ---------------------------------------------------------------------------

/// One scripted leg quote.
#[derive(Debug, Clone)]
pub enum LegQuote {
    Fixed(U256),
    /// `amount_in × num / den`.
    Ratio(u64, u64),
    Zero,
    Fail,
}

/// Replays leg quotes in order, wrapping around after the last one.
pub struct ScriptedQuoter {
    legs: Vec<LegQuote>,
    calls: AtomicUsize,
}

impl ScriptedQuoter {
    pub fn new(legs: Vec<LegQuote>) -> Self {
        Self {
            legs,
            calls: AtomicUsize::new(0),
        }
    }

    /// Loop that returns `pct_back`% of the input on the final leg.
    pub fn round_trip(pct_back: u64) -> Self {
        Self::new(vec![
            LegQuote::Ratio(1, 1),
            LegQuote::Ratio(1, 1),
            LegQuote::Ratio(pct_back, 100),
        ])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceQuoter for ScriptedQuoter {
    async fn quote(&self, amount_in: U256, _from: Address, _to: Address) -> Result<U256> {
        let i = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.legs.is_empty() {
            return Err(anyhow!("no legs scripted"));
        }
        match &self.legs[i % self.legs.len()] {
            LegQuote::Fixed(v) => Ok(*v),
            LegQuote::Ratio(num, den) => Ok(amount_in * U256::from(*num) / U256::from(*den)),
            LegQuote::Zero => Ok(U256::zero()),
            LegQuote::Fail => Err(anyhow!("execution reverted")),
        }
    }
}
