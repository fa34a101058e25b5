//! Chain access.
//!
//! Defines the `ChainGateway` trait the execution pipeline talks to and
//! the typed errors it returns. `evm` provides the JSON-RPC implementation
//! and the router quoter, `mock` a scripted in-memory pair for tests
//! (behind the `test-util` feature).
//! `units` converts between decimal ETH/gwei and on-chain integer amounts.

pub mod evm;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod units;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by a `ChainGateway`.
///
/// Transport failures are kept apart from on-chain reverts so the pipeline
/// can tell "the node was unreachable" from "the trade failed".
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("insufficient funds for gas * price + value")]
    InsufficientFunds,

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("transaction dropped from mempool")]
    Dropped,

    #[error("encoding error: {0}")]
    Encoding(String),
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Fee reading from the node, in gwei.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeEstimate {
    pub base_fee_gwei: Decimal,
    pub priority_fee_gwei: Decimal,
}

/// A fully specified EIP-1559 transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
    /// Native value attached, in ETH.
    pub value: Decimal,
    pub gas_limit: u64,
    pub max_fee_gwei: Decimal,
    pub priority_fee_gwei: Decimal,
    pub nonce: U256,
}

/// Receipt status after the requested confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Reverted,
}

// ---------------------------------------------------------------------------
// Gateway trait
// ---------------------------------------------------------------------------

/// Per-network access to balances, fees, nonces and transaction submission.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Network name for logging.
    fn network(&self) -> &str;

    /// Native balance of `address`, in ETH.
    async fn balance(&self, address: Address) -> Result<Decimal, ChainError>;

    async fn fee_estimate(&self) -> Result<FeeEstimate, ChainError>;

    /// Nonce including pending transactions.
    async fn pending_nonce(&self, address: Address) -> Result<U256, ChainError>;

    /// Dry-run the transaction against current state (`eth_call`).
    async fn simulate(&self, _tx: &TxRequest) -> Result<(), ChainError> {
        Ok(())
    }

    /// Sign and broadcast. Returns the transaction hash as a 0x-hex string.
    async fn submit_transaction(&self, tx: TxRequest) -> Result<String, ChainError>;

    /// Wait for `confirmations` blocks and report the receipt status.
    async fn await_confirmation(
        &self,
        tx_hash: &str,
        confirmations: usize,
    ) -> Result<TxStatus, ChainError>;
}
