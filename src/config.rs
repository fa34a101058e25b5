//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (wallet key, bot token) and RPC overrides are referenced by
//! env-var name in the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::signal::lexicon::DEFAULT_DENY_LIST;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub trust: TrustDefaults,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub web_feed: WebFeedConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub health: HealthConfig,
    pub networks: Vec<NetworkConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_trust_file")]
    pub trust_file: String,
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
    #[serde(default = "default_executor_env")]
    pub executor_address_env: String,
}

/// Gate, sizing and confirmation parameters shared by every network.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StrategyConfig {
    /// `sentiment × trust` must exceed this before any chain reads happen.
    pub confidence_threshold: f64,
    /// Minimum simulated profit (ETH) covering 3-hop fee overhead.
    pub min_profit: Decimal,
    /// Smallest trade left after the moat and fee overhead (ETH).
    pub min_trade: Decimal,
    /// Gas units budgeted when estimating fee overhead.
    pub fee_gas_units: u64,
    /// Gas limit attached to the submitted transaction.
    pub gas_limit: u64,
    /// Base fee markup, in percent.
    pub fee_multiplier_pct: u32,
    pub confirmation_timeout_secs: u64,
    pub confirmations: usize,
    /// Upper bound on any single node call (reads, preflight, broadcast, quotes).
    pub rpc_timeout_secs: u64,
    /// Keywords that zero a signal's sentiment.
    pub deny_keywords: Vec<String>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            min_profit: dec!(0.001),
            min_trade: dec!(0.005),
            fee_gas_units: 1_000_000,
            gas_limit: 600_000,
            fee_multiplier_pct: 120,
            confirmation_timeout_secs: 120,
            confirmations: 1,
            rpc_timeout_secs: 10,
            deny_keywords: DEFAULT_DENY_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Default trust for channels that are not configured sources.
#[derive(Debug, Deserialize, Clone)]
pub struct TrustDefaults {
    pub web_ai: f64,
    pub discovery: f64,
}

impl Default for TrustDefaults {
    fn default() -> Self {
        Self {
            web_ai: 0.85,
            discovery: 0.70,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub name: String,
    pub origin_id: String,
    pub trust: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebFeedConfig {
    pub timeout_secs: u64,
    pub urls: Vec<String>,
}

impl Default for WebFeedConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            urls: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token_env: Option<String>,
    pub long_poll_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token_env: None,
            long_poll_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub asset: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// One EVM network the agent trades on.
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    /// Env var that overrides `rpc_url` when set.
    pub rpc_env: Option<String>,
    pub rpc_url: String,
    /// Capital held back from every trade (ETH).
    pub moat: Decimal,
    /// Fixed priority fee; falls back to the node's estimate when absent.
    pub priority_fee_gwei: Option<Decimal>,
    /// Wrapped native asset, the base of the conversion loop.
    pub weth: String,
    /// Stable asset used as the intermediate leg.
    pub stable: String,
    /// Uniswap-V2 style router quoted for every leg.
    pub router: String,
    /// Ticker → token address on this network.
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

impl NetworkConfig {
    /// RPC endpoint, preferring the env override.
    pub fn resolved_rpc_url(&self) -> String {
        self.rpc_env
            .as_deref()
            .and_then(|env| std::env::var(env).ok())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.rpc_url.clone())
    }
}

/// Wallet secrets resolved from the environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub private_key: SecretString,
    pub executor_address: String,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_trust_file() -> String {
    "trust_scores.json".to_string()
}

fn default_private_key_env() -> String {
    "PRIVATE_KEY".to_string()
}

fn default_executor_env() -> String {
    "EXECUTOR_ADDRESS".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        if config.networks.is_empty() {
            anyhow::bail!("at least one [[networks]] entry is required");
        }
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Resolve the wallet key and executor contract address.
    ///
    /// Missing credentials are a fatal configuration error.
    pub fn credentials(&self) -> Result<Credentials> {
        let private_key = Self::resolve_env(&self.agent.private_key_env)?;
        let executor_address = Self::resolve_env(&self.agent.executor_address_env)?;
        if private_key.trim().is_empty() || executor_address.trim().is_empty() {
            anyhow::bail!(
                "{} and {} must both be non-empty",
                self.agent.private_key_env,
                self.agent.executor_address_env
            );
        }
        Ok(Credentials {
            private_key: SecretString::new(private_key.trim().to_string()),
            executor_address: executor_address.trim().to_string(),
        })
    }

    /// Whether both wallet credentials are present, without reading them.
    pub fn keys_detected(&self) -> bool {
        let present = |env: &str| std::env::var(env).map(|v| !v.trim().is_empty()).unwrap_or(false);
        present(&self.agent.private_key_env) && present(&self.agent.executor_address_env)
    }

    /// Telegram bot token, if a token env var is configured and set.
    pub fn telegram_token(&self) -> Option<SecretString> {
        self.telegram
            .bot_token_env
            .as_deref()
            .and_then(|env| std::env::var(env).ok())
            .filter(|t| !t.is_empty())
            .map(SecretString::new)
    }
}
