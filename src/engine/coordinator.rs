//! Execution coordinator.
//!
//! Runs one pipeline per network for every signal that clears the
//! confidence gate:
//!
//!   resolve asset → balance + fees → size → probe → submit → confirm
//!
//! Networks run concurrently and independently; a failure on one never
//! blocks another. Within a network, nonce read through broadcast is
//! serialised by the lane's submission lock. Only a submitted trade that
//! resolves (confirmed, reverted or errored) feeds back into trust.

use ethers::types::Address;
use futures::future::join_all;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chain::evm::{encode_execute_triangle, parse_address};
use crate::chain::{units, ChainError, ChainGateway, TxRequest, TxStatus};
use crate::probe::OpportunityProbe;
use crate::signal::SignalScorer;
use crate::trust::TrustLedger;
use crate::types::{ExecutionOutcome, PipelineOutcome, Signal, SkipReason};

use super::sizing::{SizingPolicy, TradePlan};

// ---------------------------------------------------------------------------
// Network lane
// ---------------------------------------------------------------------------

/// Static per-network trade parameters.
#[derive(Debug, Clone)]
pub struct LaneSettings {
    /// Wallet the balance is read from and that signs.
    pub wallet: Address,
    /// Executor contract receiving `executeTriangle`.
    pub executor: Address,
    pub router: Address,
    pub moat: Decimal,
    pub priority_fee_gwei: Option<Decimal>,
    /// Upper-case ticker → token address.
    pub tokens: HashMap<String, Address>,
}

/// Everything needed to trade on one network.
pub struct NetworkLane {
    name: String,
    gateway: Arc<dyn ChainGateway>,
    probe: OpportunityProbe,
    settings: LaneSettings,
    /// Held from nonce read until the transaction is broadcast.
    submit_lock: Mutex<()>,
}

impl NetworkLane {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        probe: OpportunityProbe,
        mut settings: LaneSettings,
    ) -> Self {
        settings.tokens = settings
            .tokens
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        Self {
            name: gateway.network().to_string(),
            gateway,
            probe,
            settings,
            submit_lock: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token address for a ticker or a literal `0x` address.
    pub fn resolve_asset(&self, asset: &str) -> Option<Address> {
        if asset.starts_with("0x") {
            return parse_address(asset).ok();
        }
        self.settings.tokens.get(&asset.to_uppercase()).copied()
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Gate and submission parameters shared by all lanes.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub confidence_threshold: f64,
    pub gas_limit: u64,
    pub confirmations: usize,
    pub confirmation_timeout: Duration,
    pub dry_run: bool,
}

pub struct ExecutionCoordinator {
    lanes: Vec<NetworkLane>,
    trust: Arc<dyn TrustLedger>,
    sizing: SizingPolicy,
    settings: CoordinatorSettings,
}

impl ExecutionCoordinator {
    pub fn new(
        lanes: Vec<NetworkLane>,
        trust: Arc<dyn TrustLedger>,
        sizing: SizingPolicy,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            lanes,
            trust,
            sizing,
            settings,
        }
    }

    pub fn networks(&self) -> Vec<String> {
        self.lanes.iter().map(|l| l.name.clone()).collect()
    }

    /// Run `signal` across every network.
    ///
    /// Returns one `(network, outcome)` pair per lane, in lane order.
    pub async fn handle_signal(&self, signal: &Signal) -> Vec<(String, PipelineOutcome)> {
        let trust = self.trust.get(&signal.source).await;
        let confidence = SignalScorer::combined_confidence(signal.sentiment, trust);

        if confidence <= self.settings.confidence_threshold {
            debug!(
                signal = %signal,
                trust = format!("{trust:.3}"),
                confidence = format!("{confidence:.3}"),
                "Below confidence threshold"
            );
            return self
                .lanes
                .iter()
                .map(|l| (l.name.clone(), PipelineOutcome::Skipped(SkipReason::BelowConfidence)))
                .collect();
        }

        info!(
            signal = %signal,
            id = %signal.id,
            confidence = format!("{confidence:.3}"),
            networks = self.lanes.len(),
            "Signal cleared gate"
        );

        let runs = self.lanes.iter().map(|lane| self.run_lane(lane, signal));
        join_all(runs).await
    }

    async fn run_lane(&self, lane: &NetworkLane, signal: &Signal) -> (String, PipelineOutcome) {
        let outcome = self.execute_on(lane, signal).await;

        if let Some(success) = outcome.feedback() {
            let resolved = ExecutionOutcome {
                success,
                source: signal.source.clone(),
                network: lane.name.clone(),
                tx_hash: outcome.tx_hash().map(str::to_string),
            };
            self.feed_back(&resolved).await;
        }

        match &outcome {
            PipelineOutcome::Skipped(reason) => {
                debug!(network = %lane.name, id = %signal.id, %reason, "Pipeline skipped")
            }
            PipelineOutcome::Confirmed { .. } => {
                info!(network = %lane.name, id = %signal.id, outcome = %outcome, "Pipeline resolved")
            }
            _ => warn!(network = %lane.name, id = %signal.id, outcome = %outcome, "Pipeline resolved"),
        }

        (lane.name.clone(), outcome)
    }

    async fn feed_back(&self, outcome: &ExecutionOutcome) {
        let score = self.trust.update(&outcome.source, outcome.success).await;
        debug!(
            source = %outcome.source,
            network = %outcome.network,
            tx = ?outcome.tx_hash,
            score = format!("{score:.4}"),
            "Outcome fed back"
        );
    }

    async fn execute_on(&self, lane: &NetworkLane, signal: &Signal) -> PipelineOutcome {
        let Some(asset) = lane.resolve_asset(&signal.asset) else {
            return PipelineOutcome::Skipped(SkipReason::UnresolvedAsset);
        };

        let reads = tokio::try_join!(
            lane.gateway.balance(lane.settings.wallet),
            lane.gateway.fee_estimate()
        );
        let (balance, fees) = match reads {
            Ok(r) => r,
            Err(e) => return PipelineOutcome::Skipped(SkipReason::ReadFailed(e.to_string())),
        };

        let plan = match self.sizing.plan(
            balance,
            fees,
            lane.settings.moat,
            lane.settings.priority_fee_gwei,
        ) {
            Ok(plan) => plan,
            Err(shortfall) => {
                info!(
                    network = %lane.name,
                    balance = %balance,
                    required = %shortfall.required,
                    "Low balance, need +{} ETH",
                    shortfall.deficit
                );
                return PipelineOutcome::Skipped(SkipReason::LowBalance {
                    deficit: shortfall.deficit,
                });
            }
        };

        let Some(opportunity) = lane.probe.probe(asset, plan.trade_size).await else {
            return PipelineOutcome::Skipped(SkipReason::NoOpportunity);
        };

        if self.settings.dry_run {
            info!(
                network = %lane.name,
                opportunity = %opportunity,
                max_fee_gwei = %plan.max_fee_gwei,
                "[DRY RUN] Would execute triangle"
            );
            return PipelineOutcome::Skipped(SkipReason::DryRun);
        }

        let tx_hash = match self.submit(lane, asset, &plan).await {
            Ok(hash) => hash,
            Err(Submission::Skip(reason)) => return PipelineOutcome::Skipped(reason),
            Err(Submission::Failed(e)) => {
                return PipelineOutcome::Errored {
                    reason: e.to_string(),
                }
            }
        };
        info!(network = %lane.name, tx = %tx_hash, "Transaction broadcast");

        let wait = lane
            .gateway
            .await_confirmation(&tx_hash, self.settings.confirmations);
        match tokio::time::timeout(self.settings.confirmation_timeout, wait).await {
            Ok(Ok(TxStatus::Success)) => PipelineOutcome::Confirmed { tx_hash },
            Ok(Ok(TxStatus::Reverted)) => PipelineOutcome::Reverted { tx_hash },
            Ok(Err(e)) => PipelineOutcome::Errored {
                reason: format!("{tx_hash}: {e}"),
            },
            Err(_) => PipelineOutcome::Errored {
                reason: format!(
                    "{tx_hash}: no confirmation within {}ms",
                    self.settings.confirmation_timeout.as_millis()
                ),
            },
        }
    }

    /// Build, preflight and broadcast under the lane's submission lock.
    async fn submit(
        &self,
        lane: &NetworkLane,
        asset: Address,
        plan: &TradePlan,
    ) -> Result<String, Submission> {
        let amount_in = units::eth_to_wei(plan.trade_size).map_err(Submission::Failed)?;
        let data = encode_execute_triangle(lane.settings.router, asset, lane.probe.stable(), amount_in);

        let _guard = lane.submit_lock.lock().await;

        let nonce = lane
            .gateway
            .pending_nonce(lane.settings.wallet)
            .await
            .map_err(|e| Submission::Skip(SkipReason::ReadFailed(e.to_string())))?;

        let tx = TxRequest {
            to: lane.settings.executor,
            data,
            value: plan.trade_size,
            gas_limit: self.settings.gas_limit,
            max_fee_gwei: plan.max_fee_gwei,
            priority_fee_gwei: plan.priority_fee_gwei,
            nonce,
        };

        lane.gateway.simulate(&tx).await.map_err(Submission::from)?;
        lane.gateway.submit_transaction(tx).await.map_err(Submission::from)
    }
}

/// Why a submission attempt stopped.
enum Submission {
    /// Nothing reached the chain; trust untouched.
    Skip(SkipReason),
    Failed(ChainError),
}

impl From<ChainError> for Submission {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::InsufficientFunds => Submission::Skip(SkipReason::InsufficientFunds),
            other => Submission::Failed(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
