//! Signal dispatcher.
//!
//! Turns raw feed input into scored `Signal`s and hands them to the
//! coordinator. Push events are dispatched one task per signal as they
//! arrive; web poll cycles run as background batches summarised in a
//! `CycleReport`, so a pending confirmation never holds up the next tick.
//! When a poll cycle finds nothing and discovery is enabled, the configured
//! discovery asset is probed instead.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::coordinator::ExecutionCoordinator;
use crate::feeds::web::WebPoller;
use crate::feeds::{FeedEvent, SourceRegistry};
use crate::signal::SignalScorer;
use crate::types::{PipelineOutcome, Signal, DISCOVERY, WEB_AI};

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Tally of one batch of signals across every network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub signals: usize,
    pub confirmed: usize,
    pub reverted: usize,
    pub errored: usize,
    pub skipped: usize,
    pub timestamp: Option<DateTime<Utc>>,
}

impl CycleReport {
    fn tally<'a>(
        cycle_number: u64,
        signals: usize,
        outcomes: impl IntoIterator<Item = &'a PipelineOutcome>,
    ) -> Self {
        let mut report = CycleReport {
            cycle_number,
            signals,
            timestamp: Some(Utc::now()),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                PipelineOutcome::Skipped(_) => report.skipped += 1,
                PipelineOutcome::Confirmed { .. } => report.confirmed += 1,
                PipelineOutcome::Reverted { .. } => report.reverted += 1,
                PipelineOutcome::Errored { .. } => report.errored += 1,
            }
        }
        report
    }

    pub fn executed(&self) -> usize {
        self.confirmed + self.reverted + self.errored
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct SignalDispatcher {
    coordinator: Arc<ExecutionCoordinator>,
    registry: SourceRegistry,
    scorer: SignalScorer,
    /// Asset probed when a poll cycle yields nothing.
    discovery_asset: Option<String>,
}

impl SignalDispatcher {
    pub fn new(
        coordinator: Arc<ExecutionCoordinator>,
        registry: SourceRegistry,
        scorer: SignalScorer,
        discovery_asset: Option<String>,
    ) -> Self {
        Self {
            coordinator,
            registry,
            scorer,
            discovery_asset,
        }
    }

    /// Signal for a push event, or `None` for unknown origins and text
    /// without a ticker.
    pub fn signal_from_event(&self, event: &FeedEvent) -> Option<Signal> {
        let Some(source) = self.registry.resolve(&event.origin_id) else {
            debug!(origin = %event.origin_id, "Unknown origin ignored");
            return None;
        };
        let ticker = SignalScorer::extract_ticker(&event.raw_text)?;
        let sentiment = self.scorer.score(&event.raw_text);
        Some(Signal::new(&ticker, &source.name, &event.raw_text, sentiment))
    }

    /// Signals for one poll cycle, falling back to discovery when empty.
    pub fn poll_signals(&self, bodies: &[String]) -> Vec<Signal> {
        let signals: Vec<Signal> = bodies
            .iter()
            .filter_map(|body| {
                let ticker = SignalScorer::extract_ticker(body)?;
                Some(Signal::new(&ticker, WEB_AI, body, self.scorer.score(body)))
            })
            .collect();

        if !signals.is_empty() {
            return signals;
        }
        match &self.discovery_asset {
            Some(asset) => vec![Signal::new(asset, DISCOVERY, "", 1.0)],
            None => Vec::new(),
        }
    }

    /// Dispatch a poll cycle's signals and wait for every pipeline.
    pub async fn run_cycle(&self, cycle_number: u64, bodies: &[String]) -> CycleReport {
        let signals = self.poll_signals(bodies);
        if signals.is_empty() {
            return CycleReport::tally(cycle_number, 0, std::iter::empty());
        }

        let runs = signals.iter().map(|s| self.coordinator.handle_signal(s));
        let results: Vec<Vec<(String, PipelineOutcome)>> = join_all(runs).await;
        let report = CycleReport::tally(
            cycle_number,
            signals.len(),
            results.iter().flatten().map(|(_, outcome)| outcome),
        );

        if report.executed() > 0 {
            info!(
                cycle = report.cycle_number,
                signals = report.signals,
                confirmed = report.confirmed,
                reverted = report.reverted,
                errored = report.errored,
                skipped = report.skipped,
                "Cycle complete"
            );
        } else {
            debug!(cycle = report.cycle_number, signals = report.signals, "Cycle complete, nothing executed");
        }
        report
    }

    /// Poll the web feed and run the cycle in a background task.
    pub fn spawn_cycle(
        self: &Arc<Self>,
        cycle_number: u64,
        poller: Arc<WebPoller>,
    ) -> JoinHandle<CycleReport> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let bodies = poller.poll().await;
            dispatcher.run_cycle(cycle_number, &bodies).await
        })
    }

    /// Consume push events until the channel closes, one task per signal.
    ///
    /// Returns once the channel is closed and every in-flight pipeline has
    /// resolved.
    pub async fn run_push_listener(self: Arc<Self>, mut rx: mpsc::Receiver<FeedEvent>) {
        info!(sources = self.registry.sources().len(), "Push listener started");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    let Some(signal) = self.signal_from_event(&event) else {
                        continue;
                    };
                    info!(signal = %signal, "Push signal received");
                    let dispatcher = Arc::clone(&self);
                    in_flight.spawn(async move {
                        dispatcher.coordinator.handle_signal(&signal).await
                    });
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }

        warn!(in_flight = in_flight.len(), "Push channel closed, listener draining");
        while in_flight.join_next().await.is_some() {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::coordinator::CoordinatorSettings;
    use crate::engine::sizing::SizingPolicy;
    use crate::trust::MockTrustLedger;
    use crate::types::Source;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn dispatcher(discovery: Option<&str>) -> SignalDispatcher {
        let mut trust = MockTrustLedger::new();
        trust.expect_get().return_const(0.5);
        trust.expect_update().never();
        let coordinator = ExecutionCoordinator::new(
            Vec::new(),
            Arc::new(trust),
            SizingPolicy {
                fee_gas_units: 1_000_000,
                fee_multiplier_pct: 120,
                min_trade: dec!(0.005),
            },
            CoordinatorSettings {
                confidence_threshold: 0.6,
                gas_limit: 600_000,
                confirmations: 1,
                confirmation_timeout: Duration::from_secs(1),
                dry_run: true,
            },
        );
        SignalDispatcher::new(
            Arc::new(coordinator),
            SourceRegistry::new(vec![Source {
                name: "FAT_PIG".into(),
                origin_id: "10012345678".into(),
                default_trust: 0.95,
            }]),
            SignalScorer::default(),
            discovery.map(str::to_string),
        )
    }

    fn event(origin: &str, text: &str) -> FeedEvent {
        FeedEvent {
            origin_id: origin.into(),
            raw_text: text.into(),
        }
    }

    #[test]
    fn test_push_event_becomes_signal() {
        let d = dispatcher(None);
        let s = d.signal_from_event(&event("-10010012345678", "$PEPE mooning")).unwrap();
        assert_eq!(s.asset, "PEPE");
        assert_eq!(s.source, "FAT_PIG");
        assert!((s.sentiment - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_origin_ignored() {
        let d = dispatcher(None);
        assert!(d.signal_from_event(&event("-100555", "$PEPE mooning")).is_none());
    }

    #[test]
    fn test_event_without_ticker_ignored() {
        let d = dispatcher(None);
        assert!(d.signal_from_event(&event("10012345678", "gm frens")).is_none());
    }

    #[test]
    fn test_poll_signals_from_bodies() {
        let d = dispatcher(Some("0x25d887Ce7a35172C62FeBFD67a1856F20FaEbb00"));
        let signals = d.poll_signals(&["$ARB breakout".to_string(), "no ticker".to_string()]);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].source, WEB_AI);
        assert_eq!(signals[0].asset, "ARB");
    }

    #[test]
    fn test_discovery_fallback_when_quiet() {
        let d = dispatcher(Some("0x25d887Ce7a35172C62FeBFD67a1856F20FaEbb00"));
        let signals = d.poll_signals(&["nothing here".to_string()]);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].source, DISCOVERY);
        assert_eq!(signals[0].sentiment, 1.0);
        assert_eq!(signals[0].asset, "0x25d887Ce7a35172C62FeBFD67a1856F20FaEbb00");
    }

    #[test]
    fn test_no_discovery_when_disabled() {
        let d = dispatcher(None);
        assert!(d.poll_signals(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_cycle_report_counts_gate_skips() {
        let d = dispatcher(None);
        let report = d.run_cycle(3, &["$ARB moon".to_string()]).await;
        // No lanes configured: the gate runs but yields no outcomes.
        assert_eq!(report.cycle_number, 3);
        assert_eq!(report.signals, 1);
        assert_eq!(report.executed(), 0);
    }

    #[test]
    fn test_tally() {
        let outcomes = [
            PipelineOutcome::Confirmed { tx_hash: "0x1".into() },
            PipelineOutcome::Reverted { tx_hash: "0x2".into() },
            PipelineOutcome::Errored { reason: "timeout".into() },
            PipelineOutcome::Skipped(crate::types::SkipReason::DryRun),
            PipelineOutcome::Skipped(crate::types::SkipReason::NoOpportunity),
        ];
        let report = CycleReport::tally(1, 2, outcomes.iter());
        assert_eq!(report.confirmed, 1);
        assert_eq!(report.reverted, 1);
        assert_eq!(report.errored, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.executed(), 3);
    }
}
