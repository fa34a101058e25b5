//! Shared fixtures for pipeline tests.
//!
//! Builds coordinators over scripted gateways, a trust store backed by
//! a throwaway file under the system temp dir, and a local web feed.

#![allow(dead_code)]

use axum::{routing::get, Router};
use ethers::types::Address;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tidewatch::chain::mock::{ScriptedGateway, ScriptedQuoter};
use tidewatch::engine::coordinator::{
    CoordinatorSettings, ExecutionCoordinator, LaneSettings, NetworkLane,
};
use tidewatch::engine::sizing::SizingPolicy;
use tidewatch::probe::OpportunityProbe;
use tidewatch::trust::TrustStore;
use tidewatch::types::Source;

pub const PEPE: u64 = 0x9e9e;
pub const EXECUTOR: u64 = 0xee;

pub struct TempTrust {
    pub store: Arc<TrustStore>,
    pub path: PathBuf,
}

impl TempTrust {
    pub fn new() -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!("tidewatch_pipeline_{}.json", uuid::Uuid::new_v4()));
        let defaults = TrustStore::defaults_from(&sources(), 0.85, 0.70);
        Self {
            store: Arc::new(TrustStore::load(&path, &defaults)),
            path,
        }
    }

    /// Score as persisted on disk, reloaded from scratch.
    pub async fn persisted(&self, source: &str) -> f64 {
        let defaults = TrustStore::defaults_from(&sources(), 0.85, 0.70);
        TrustStore::load(&self.path, &defaults).get(source).await
    }
}

impl Drop for TempTrust {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub fn sources() -> Vec<Source> {
    vec![
        Source {
            name: "FAT_PIG".into(),
            origin_id: "10012345678".into(),
            default_trust: 0.95,
        },
        Source {
            name: "BINANCE_KILLERS".into(),
            origin_id: "10087654321".into(),
            default_trust: 0.90,
        },
    ]
}

pub fn lane(gateway: Arc<ScriptedGateway>, quoter: Arc<ScriptedQuoter>, moat: Decimal) -> NetworkLane {
    let probe = OpportunityProbe::new(
        quoter,
        Address::from_low_u64_be(1),
        Address::from_low_u64_be(2),
        dec!(0.001),
    );
    NetworkLane::new(
        gateway,
        probe,
        LaneSettings {
            wallet: Address::from_low_u64_be(0xaa),
            executor: Address::from_low_u64_be(EXECUTOR),
            router: Address::from_low_u64_be(0x77),
            moat,
            priority_fee_gwei: None,
            tokens: HashMap::from([("PEPE".to_string(), Address::from_low_u64_be(PEPE))]),
        },
    )
}

pub fn coordinator(
    lanes: Vec<NetworkLane>,
    trust: &TempTrust,
    dry_run: bool,
    confirmation_timeout: Duration,
) -> ExecutionCoordinator {
    ExecutionCoordinator::new(
        lanes,
        trust.store.clone(),
        SizingPolicy {
            fee_gas_units: 1_000_000,
            fee_multiplier_pct: 120,
            min_trade: dec!(0.005),
        },
        CoordinatorSettings {
            confidence_threshold: 0.6,
            gas_limit: 600_000,
            confirmations: 1,
            confirmation_timeout,
            dry_run,
        },
    )
}

/// Serve `body` on a local `/feed` endpoint and return its URL.
pub async fn serve_feed(body: &'static str) -> String {
    let app = Router::new().route("/feed", get(move || async move { body }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/feed")
}
