//! JSON-RPC chain gateway and router quoter backed by `ethers`.
//!
//! One `EvmGateway` per configured network. The wallet signs locally and
//! broadcasts raw transactions, so node errors arrive as plain
//! `ProviderError`s that are classified into `ChainError` here and
//! nowhere else. Every node call is bounded by the gateway's RPC timeout;
//! an elapsed call is a `ChainError::Transport`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::contract::abigen;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider, ProviderError, RpcError};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Bytes, Eip1559TransactionRequest, H256, U256, U64};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::units;
use super::{ChainError, ChainGateway, FeeEstimate, TxRequest, TxStatus};
use crate::probe::PriceQuoter;

abigen!(
    UniswapV2Router,
    r#"[
        function getAmountsOut(uint256 amountIn, address[] path) external view returns (uint256[] amounts)
    ]"#
);

/// Signature of the executor contract entry point.
const EXECUTE_TRIANGLE_SIG: &str = "executeTriangle(address,address,address,uint256)";

/// Receipt polling interval.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a hex address with or without the `0x` prefix.
pub fn parse_address(s: &str) -> Result<Address, ChainError> {
    let hex = s.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    hex.parse::<Address>()
        .map_err(|e| ChainError::Encoding(format!("bad address {s}: {e}")))
}

/// Calldata for `executeTriangle(router, tokenA, tokenB, amountIn)`.
pub fn encode_execute_triangle(
    router: Address,
    token_a: Address,
    token_b: Address,
    amount_in: U256,
) -> Bytes {
    let mut data = ethers::utils::id(EXECUTE_TRIANGLE_SIG).to_vec();
    data.extend(abi::encode(&[
        Token::Address(router),
        Token::Address(token_a),
        Token::Address(token_b),
        Token::Uint(amount_in),
    ]));
    Bytes::from(data)
}

/// Map a node error onto the gateway taxonomy.
///
/// The node only reports lack of funds through the JSON-RPC error message,
/// so that match is confined to this function.
fn classify(err: ProviderError) -> ChainError {
    if let Some(resp) = err.as_error_response() {
        let message = resp.message.to_lowercase();
        if message.contains("insufficient funds") {
            return ChainError::InsufficientFunds;
        }
        if message.contains("revert") {
            return ChainError::Reverted(resp.message.clone());
        }
    }
    ChainError::Transport(err.to_string())
}

/// Run a node call under `limit`, classifying its error.
async fn bounded<T>(
    limit: Duration,
    call: &str,
    fut: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ChainError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(classify),
        Err(_) => Err(ChainError::Transport(format!(
            "{call} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

pub struct EvmGateway {
    name: String,
    chain_id: u64,
    provider: Arc<Provider<Http>>,
    wallet: LocalWallet,
    rpc_timeout: Duration,
}

impl EvmGateway {
    pub fn connect(
        name: &str,
        rpc_url: &str,
        chain_id: u64,
        private_key: &SecretString,
        rpc_timeout: Duration,
    ) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .with_context(|| format!("[{name}] invalid RPC url"))?
            .interval(POLL_INTERVAL);
        let key = private_key.expose_secret();
        let wallet = key
            .strip_prefix("0x")
            .unwrap_or(key)
            .parse::<LocalWallet>()
            .with_context(|| format!("[{name}] invalid private key"))?
            .with_chain_id(chain_id);

        Ok(Self {
            name: name.to_string(),
            chain_id,
            provider: Arc::new(provider),
            wallet,
            rpc_timeout,
        })
    }

    /// Wallet address trading on this network.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Shared provider, for building a quoter on the same endpoint.
    pub fn provider(&self) -> Arc<Provider<Http>> {
        Arc::clone(&self.provider)
    }

    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    fn typed(&self, tx: &TxRequest) -> Result<TypedTransaction, ChainError> {
        let request = Eip1559TransactionRequest::new()
            .from(self.wallet.address())
            .to(tx.to)
            .data(tx.data.clone())
            .value(units::eth_to_wei(tx.value)?)
            .gas(tx.gas_limit)
            .max_fee_per_gas(units::gwei_to_wei(tx.max_fee_gwei)?)
            .max_priority_fee_per_gas(units::gwei_to_wei(tx.priority_fee_gwei)?)
            .nonce(tx.nonce)
            .chain_id(self.chain_id);
        Ok(request.into())
    }
}

#[async_trait]
impl ChainGateway for EvmGateway {
    fn network(&self) -> &str {
        &self.name
    }

    async fn balance(&self, address: Address) -> Result<Decimal, ChainError> {
        let wei = bounded(
            self.rpc_timeout,
            "eth_getBalance",
            self.provider.get_balance(address, None),
        )
        .await?;
        units::wei_to_eth(wei)
    }

    async fn fee_estimate(&self) -> Result<FeeEstimate, ChainError> {
        let gas_price =
            bounded(self.rpc_timeout, "eth_gasPrice", self.provider.get_gas_price()).await?;
        let estimate = bounded(
            self.rpc_timeout,
            "eip1559 estimate",
            self.provider.estimate_eip1559_fees(None),
        );
        let priority = match estimate.await {
            Ok((_, priority)) => priority,
            Err(e) => {
                debug!(network = %self.name, error = %e, "No EIP-1559 estimate, priority 0");
                U256::zero()
            }
        };
        Ok(FeeEstimate {
            base_fee_gwei: units::wei_to_gwei(gas_price)?,
            priority_fee_gwei: units::wei_to_gwei(priority)?,
        })
    }

    async fn pending_nonce(&self, address: Address) -> Result<U256, ChainError> {
        bounded(
            self.rpc_timeout,
            "eth_getTransactionCount",
            self.provider
                .get_transaction_count(address, Some(BlockNumber::Pending.into())),
        )
        .await
    }

    async fn simulate(&self, tx: &TxRequest) -> Result<(), ChainError> {
        let typed = self.typed(tx)?;
        bounded(self.rpc_timeout, "eth_call", self.provider.call(&typed, None))
            .await
            .map(|_| ())
    }

    async fn submit_transaction(&self, tx: TxRequest) -> Result<String, ChainError> {
        let typed = self.typed(&tx)?;
        let signature = self
            .wallet
            .sign_transaction(&typed)
            .await
            .map_err(|e| ChainError::Encoding(e.to_string()))?;
        let raw = typed.rlp_signed(&signature);
        let pending = bounded(
            self.rpc_timeout,
            "eth_sendRawTransaction",
            self.provider.send_raw_transaction(raw),
        )
        .await?;
        Ok(format!("{:?}", pending.tx_hash()))
    }

    async fn await_confirmation(
        &self,
        tx_hash: &str,
        confirmations: usize,
    ) -> Result<TxStatus, ChainError> {
        let hash = tx_hash
            .strip_prefix("0x")
            .unwrap_or(tx_hash)
            .parse::<H256>()
            .map_err(|e| ChainError::Encoding(format!("bad tx hash {tx_hash}: {e}")))?;

        let receipt = PendingTransaction::new(hash, self.provider.as_ref())
            .confirmations(confirmations)
            .await
            .map_err(classify)?;

        match receipt {
            Some(r) if r.status == Some(U64::from(1)) => Ok(TxStatus::Success),
            Some(_) => Ok(TxStatus::Reverted),
            None => {
                warn!(network = %self.name, tx = tx_hash, "Transaction dropped");
                Err(ChainError::Dropped)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Quoter
// ---------------------------------------------------------------------------

/// Quotes one leg through a Uniswap-V2 style router's `getAmountsOut`.
pub struct RouterQuoter {
    router: UniswapV2Router<Provider<Http>>,
    rpc_timeout: Duration,
}

impl RouterQuoter {
    pub fn new(router: Address, provider: Arc<Provider<Http>>, rpc_timeout: Duration) -> Self {
        Self {
            router: UniswapV2Router::new(router, provider),
            rpc_timeout,
        }
    }
}

#[async_trait]
impl PriceQuoter for RouterQuoter {
    async fn quote(&self, amount_in: U256, from: Address, to: Address) -> Result<U256> {
        let call = self.router.get_amounts_out(amount_in, vec![from, to]);
        let amounts = tokio::time::timeout(self.rpc_timeout, call.call())
            .await
            .context("getAmountsOut timed out")?
            .context("getAmountsOut call failed")?;
        Ok(amounts.last().copied().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
