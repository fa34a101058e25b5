//! Core engine: signal → per-network execution → trust feedback.

pub mod coordinator;
pub mod dispatcher;
pub mod sizing;

use anyhow::{Context, Result};
use ethers::types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::chain::evm::{parse_address, EvmGateway, RouterQuoter};
use crate::config::{AppConfig, Credentials, NetworkConfig};
use crate::probe::OpportunityProbe;
use crate::trust::TrustLedger;

use coordinator::{CoordinatorSettings, ExecutionCoordinator, LaneSettings, NetworkLane};
use sizing::SizingPolicy;

fn address(network: &str, field: &str, value: &str) -> Result<Address> {
    parse_address(value).with_context(|| format!("[{network}] {field} is not a valid address"))
}

/// Connect one network: gateway, router quoter and lane settings.
fn connect_lane(
    net: &NetworkConfig,
    cfg: &AppConfig,
    creds: &Credentials,
    executor: Address,
) -> Result<NetworkLane> {
    let gateway = EvmGateway::connect(
        &net.name,
        &net.resolved_rpc_url(),
        net.chain_id,
        &creds.private_key,
        Duration::from_secs(cfg.strategy.rpc_timeout_secs),
    )?;
    let router = address(&net.name, "router", &net.router)?;
    let quoter = RouterQuoter::new(router, gateway.provider(), gateway.rpc_timeout());
    let probe = OpportunityProbe::new(
        Arc::new(quoter),
        address(&net.name, "weth", &net.weth)?,
        address(&net.name, "stable", &net.stable)?,
        cfg.strategy.min_profit,
    );

    let tokens = net
        .tokens
        .iter()
        .map(|(ticker, addr)| Ok((ticker.clone(), address(&net.name, ticker, addr)?)))
        .collect::<Result<HashMap<_, _>>>()?;

    info!(
        network = %net.name,
        chain_id = net.chain_id,
        wallet = ?gateway.address(),
        tokens = tokens.len(),
        "Network connected"
    );

    let settings = LaneSettings {
        wallet: gateway.address(),
        executor,
        router,
        moat: net.moat,
        priority_fee_gwei: net.priority_fee_gwei,
        tokens,
    };
    Ok(NetworkLane::new(Arc::new(gateway), probe, settings))
}

/// Build the coordinator for every configured network.
///
/// Any unparsable address or key is a fatal configuration error.
pub fn build_coordinator(
    cfg: &AppConfig,
    creds: &Credentials,
    trust: Arc<dyn TrustLedger>,
) -> Result<ExecutionCoordinator> {
    let executor = parse_address(&creds.executor_address)
        .context("Executor address is not a valid address")?;

    let lanes = cfg
        .networks
        .iter()
        .map(|net| connect_lane(net, cfg, creds, executor))
        .collect::<Result<Vec<_>>>()?;

    let strategy = &cfg.strategy;
    Ok(ExecutionCoordinator::new(
        lanes,
        trust,
        SizingPolicy {
            fee_gas_units: strategy.fee_gas_units,
            fee_multiplier_pct: strategy.fee_multiplier_pct,
            min_trade: strategy.min_trade,
        },
        CoordinatorSettings {
            confidence_threshold: strategy.confidence_threshold,
            gas_limit: strategy.gas_limit,
            confirmations: strategy.confirmations,
            confirmation_timeout: Duration::from_secs(strategy.confirmation_timeout_secs),
            dry_run: cfg.agent.dry_run,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::MockTrustLedger;
    use secrecy::SecretString;

    const HARDHAT_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn config(router: &str) -> AppConfig {
        AppConfig::parse(&format!(
            r#"
            [agent]
            name = "TEST"
            dry_run = true

            [[networks]]
            name = "BASE"
            chain_id = 8453
            rpc_url = "http://127.0.0.1:8545"
            moat = 0.005
            weth = "0x4200000000000000000000000000000000000006"
            stable = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
            router = "{router}"

            [networks.tokens]
            DEGEN = "0x4ed4E862860beD51a9570b96d89aF5E1B0Efefed"
            "#
        ))
        .unwrap()
    }

    fn creds(executor: &str) -> Credentials {
        Credentials {
            private_key: SecretString::new(HARDHAT_KEY.into()),
            executor_address: executor.into(),
        }
    }

    #[test]
    fn test_build_coordinator_connects_every_network() {
        let cfg = config("0x4752ba5DBc23f44D87826276BF6Fd6b1C372aD24");
        let coordinator = build_coordinator(
            &cfg,
            &creds("0x00000000000000000000000000000000000000ee"),
            Arc::new(MockTrustLedger::new()),
        )
        .unwrap();
        assert_eq!(coordinator.networks(), vec!["BASE".to_string()]);
    }

    #[test]
    fn test_bad_router_is_fatal() {
        let cfg = config("0xnothex");
        let result = build_coordinator(
            &cfg,
            &creds("0x00000000000000000000000000000000000000ee"),
            Arc::new(MockTrustLedger::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_executor_is_fatal() {
        let cfg = config("0x4752ba5DBc23f44D87826276BF6Fd6b1C372aD24");
        let result = build_coordinator(&cfg, &creds("executor"), Arc::new(MockTrustLedger::new()));
        assert!(result.is_err());
    }
}
