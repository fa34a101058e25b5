//! TIDEWATCH: trust-scored signal execution agent.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! starts the health server, restores trust scores from disk, connects
//! every configured network and runs the push listener and web poll loop
//! until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use tidewatch::config;
use tidewatch::engine::build_coordinator;
use tidewatch::engine::dispatcher::SignalDispatcher;
use tidewatch::feeds::telegram::TelegramFeed;
use tidewatch::feeds::web::WebPoller;
use tidewatch::feeds::{PushFeed, SourceRegistry};
use tidewatch::health::{self, HealthInfo};
use tidewatch::signal::SignalScorer;
use tidewatch::trust::TrustStore;

const BANNER: &str = r#"
 _____ ___ ____  _______        ___  _____ ____ _   _
|_   _|_ _|  _ \| ____\ \      / / \|_   _/ ___| | | |
  | |  | || | | |  _|  \ \ /\ / / _ \ | || |   | |_| |
  | |  | || |_| | |___  \ V  V / ___ \| || |___|  _  |
  |_| |___|____/|_____|  \_/\_/_/   \_\_| \____|_| |_|

  Trust-scored signal execution across EVM networks
"#;

/// Buffered push events before the Telegram producer waits.
const PUSH_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        dry_run = cfg.agent.dry_run,
        networks = cfg.networks.len(),
        sources = cfg.sources.len(),
        "TIDEWATCH starting up"
    );

    // -- Health ----------------------------------------------------------

    // Up before the credential check so a keyless process still answers.
    let info = HealthInfo::from_config(&cfg);
    let keys_detected = info.keys_detected;
    health::spawn_health(Arc::new(info), health::resolve_port(cfg.health.port)).await?;

    let creds = match cfg.credentials() {
        Ok(creds) => creds,
        Err(e) => {
            error!(
                keys_detected,
                error = %e,
                "Wallet credentials missing, trading disabled. Health stays up until Ctrl+C."
            );
            tokio::signal::ctrl_c().await?;
            return Err(e.context("Wallet credentials missing, refusing to trade"));
        }
    };

    // -- Trust -----------------------------------------------------------

    let registry = SourceRegistry::from_config(&cfg.sources);
    let defaults =
        TrustStore::defaults_from(registry.sources(), cfg.trust.web_ai, cfg.trust.discovery);
    let trust = Arc::new(TrustStore::load(&cfg.agent.trust_file, &defaults));

    // -- Engine ----------------------------------------------------------

    let coordinator = Arc::new(build_coordinator(&cfg, &creds, trust.clone())?);

    let discovery_asset = if cfg.discovery.enabled {
        cfg.discovery.asset.clone()
    } else {
        None
    };
    let dispatcher = Arc::new(SignalDispatcher::new(
        coordinator,
        registry,
        SignalScorer::new(cfg.strategy.deny_keywords.clone()),
        discovery_asset,
    ));

    // -- Push feed -------------------------------------------------------

    match cfg.telegram_token() {
        Some(token) => {
            let feed = TelegramFeed::new(token, cfg.telegram.long_poll_secs)?;
            let (tx, rx) = mpsc::channel(PUSH_CHANNEL_CAPACITY);
            tokio::spawn(async move {
                if let Err(e) = feed.run(tx).await {
                    error!(feed = feed.name(), error = %e, "Push feed stopped");
                }
            });
            tokio::spawn(Arc::clone(&dispatcher).run_push_listener(rx));
        }
        None => warn!("No Telegram bot token, push feed disabled"),
    }

    // -- Main loop -------------------------------------------------------

    let poller = Arc::new(WebPoller::new(
        cfg.web_feed.urls.clone(),
        cfg.web_feed.timeout_secs,
    )?);
    let mut interval = tokio::time::interval(Duration::from_millis(cfg.agent.poll_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_ms = cfg.agent.poll_interval_ms,
        endpoints = poller.urls().len(),
        "Entering poll loop. Press Ctrl+C to stop."
    );

    let mut cycle: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                cycle += 1;
                dispatcher.spawn_cycle(cycle, Arc::clone(&poller));
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    trust.persist().await?;
    info!(
        cycles = cycle,
        trust_file = %trust.path().display(),
        "TIDEWATCH shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tidewatch=info"));

    let json_logging = std::env::var("TIDEWATCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
