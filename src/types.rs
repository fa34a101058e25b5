//! Shared types for the TIDEWATCH agent.
//!
//! These types form the data model used across all modules: signals
//! flowing in from the feeds, opportunities produced by the probe, and
//! the outcomes that drive trust feedback.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust key for signals scraped from the web endpoints.
pub const WEB_AI: &str = "WEB_AI";

/// Trust key for fallback discovery probing.
pub const DISCOVERY: &str = "DISCOVERY";

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// A configured origin of trading signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Trust key, e.g. `FAT_PIG`.
    pub name: String,
    /// Origin identifier as reported by the push feed (chat id).
    pub origin_id: String,
    /// Default trust in [0, 1], used until a persisted score exists.
    pub default_trust: f64,
}

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// A candidate asset mention with its derived sentiment.
#[derive(Debug, Clone)]
pub struct Signal {
    pub id: uuid::Uuid,
    /// Ticker (without the `$` marker) or a `0x` token address.
    pub asset: String,
    /// Trust key of the originating source.
    pub source: String,
    pub raw_text: String,
    /// Sentiment in [0, 1].
    pub sentiment: f64,
    pub received_at: DateTime<Utc>,
}

impl Signal {
    pub fn new(asset: &str, source: &str, raw_text: &str, sentiment: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            asset: asset.to_string(),
            source: source.to_string(),
            raw_text: raw_text.to_string(),
            sentiment: sentiment.clamp(0.0, 1.0),
            received_at: Utc::now(),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (sentiment {:.2})",
            self.source, self.asset, self.sentiment
        )
    }
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// A simulated three-leg loop that returns more than it consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOpportunity {
    /// Target token address (middle of the loop).
    pub asset: String,
    /// Capital committed, in the base asset (ETH).
    pub capital: Decimal,
    /// Raw output of each leg: target, stable, base.
    pub leg_outputs: [ethers::types::U256; 3],
    /// Base asset returned after the third leg (ETH).
    pub final_amount: Decimal,
    pub profit: Decimal,
    /// `profit / capital`.
    pub roi: Decimal,
}

impl fmt::Display for TradeOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} capital={} final={} profit={} roi={:.4}%",
            self.asset,
            self.capital,
            self.final_amount,
            self.profit,
            self.roi * Decimal::ONE_HUNDRED,
        )
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// The resolved result of a submitted trade. The only input to a trust update.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub source: String,
    pub network: String,
    pub tx_hash: Option<String>,
}

/// Why a pipeline stopped without touching trust.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// `sentiment × trust` did not clear the threshold.
    BelowConfidence,
    /// Ticker has no token address on this network.
    UnresolvedAsset,
    /// Balance or fee read failed.
    ReadFailed(String),
    /// Balance below moat + fee overhead + minimum trade.
    LowBalance { deficit: Decimal },
    /// Probe found no liquidity or no profit.
    NoOpportunity,
    /// Node rejected the transaction for lack of funds.
    InsufficientFunds,
    /// Dry-run mode; nothing submitted.
    DryRun,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BelowConfidence => write!(f, "below confidence threshold"),
            SkipReason::UnresolvedAsset => write!(f, "asset not resolvable on network"),
            SkipReason::ReadFailed(e) => write!(f, "chain read failed: {e}"),
            SkipReason::LowBalance { deficit } => write!(f, "low balance, need +{deficit} ETH"),
            SkipReason::NoOpportunity => write!(f, "no profitable loop"),
            SkipReason::InsufficientFunds => write!(f, "insufficient funds"),
            SkipReason::DryRun => write!(f, "dry run"),
        }
    }
}

/// Terminal state of one network's pipeline for one signal.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Skipped(SkipReason),
    Confirmed { tx_hash: String },
    Reverted { tx_hash: String },
    Errored { reason: String },
}

impl PipelineOutcome {
    /// Trust feedback carried by this outcome, if any.
    pub fn feedback(&self) -> Option<bool> {
        match self {
            PipelineOutcome::Skipped(_) => None,
            PipelineOutcome::Confirmed { .. } => Some(true),
            PipelineOutcome::Reverted { .. } | PipelineOutcome::Errored { .. } => Some(false),
        }
    }

    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            PipelineOutcome::Confirmed { tx_hash } | PipelineOutcome::Reverted { tx_hash } => {
                Some(tx_hash)
            }
            _ => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, PipelineOutcome::Skipped(_))
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineOutcome::Skipped(reason) => write!(f, "SKIPPED ({reason})"),
            PipelineOutcome::Confirmed { tx_hash } => write!(f, "CONFIRMED {tx_hash}"),
            PipelineOutcome::Reverted { tx_hash } => write!(f, "REVERTED {tx_hash}"),
            PipelineOutcome::Errored { reason } => write!(f, "ERRORED ({reason})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
