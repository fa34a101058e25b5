//! Source trust store.
//!
//! Keeps a reliability score per signal source, nudged by a fixed
//! multiplicative rule after every resolved trade and persisted to a JSON
//! file. All read-modify-write cycles go through one async mutex, so
//! concurrent pipelines never lose an update. A missing or corrupt file
//! degrades to defaults; it is never fatal.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::types::{Source, DISCOVERY, WEB_AI};

/// Source name → trust score.
pub type TrustRecord = BTreeMap<String, f64>;

/// Score returned for sources the store has never seen.
pub const NEUTRAL_TRUST: f64 = 0.5;
pub const MIN_TRUST: f64 = 0.1;
pub const MAX_TRUST: f64 = 0.99;
pub const SUCCESS_FACTOR: f64 = 1.05;
pub const FAILURE_FACTOR: f64 = 0.90;

/// Apply one feedback step to a score.
pub fn apply_feedback(current: f64, success: bool) -> f64 {
    if success {
        (current * SUCCESS_FACTOR).min(MAX_TRUST)
    } else {
        (current * FAILURE_FACTOR).max(MIN_TRUST)
    }
}

fn clamp_trust(score: f64) -> f64 {
    score.clamp(MIN_TRUST, MAX_TRUST)
}

// ---------------------------------------------------------------------------
// Ledger seam
// ---------------------------------------------------------------------------

/// Read/update access to trust scores, as used by the execution pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrustLedger: Send + Sync {
    async fn get(&self, source: &str) -> f64;
    async fn update(&self, source: &str, success: bool) -> f64;
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct TrustStore {
    path: PathBuf,
    scores: Mutex<TrustRecord>,
}

impl TrustStore {
    /// Default record: every configured source plus the web and discovery channels.
    pub fn defaults_from(sources: &[Source], web_ai: f64, discovery: f64) -> TrustRecord {
        let mut record = TrustRecord::new();
        record.insert(WEB_AI.to_string(), clamp_trust(web_ai));
        record.insert(DISCOVERY.to_string(), clamp_trust(discovery));
        for source in sources {
            record.insert(source.name.clone(), clamp_trust(source.default_trust));
        }
        record
    }

    /// Load persisted scores, falling back to `defaults`.
    ///
    /// Persisted values are clamped into range and any default key missing
    /// from the file is filled in.
    pub fn load(path: impl AsRef<Path>, defaults: &TrustRecord) -> Self {
        let path = path.as_ref().to_path_buf();
        let scores = match Self::read_record(&path) {
            Ok(Some(mut record)) => {
                record.retain(|_, v| v.is_finite());
                for v in record.values_mut() {
                    *v = clamp_trust(*v);
                }
                for (k, v) in defaults {
                    record.entry(k.clone()).or_insert(*v);
                }
                info!(path = %path.display(), sources = record.len(), "Trust scores loaded");
                record
            }
            Ok(None) => {
                info!(path = %path.display(), "No trust file, using defaults");
                defaults.clone()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Trust file unreadable, using defaults");
                defaults.clone()
            }
        };

        Self {
            path,
            scores: Mutex::new(scores),
        }
    }

    fn read_record(path: &Path) -> Result<Option<TrustRecord>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let record: TrustRecord = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(record))
    }

    /// Write to a sibling temp file, then rename over the target.
    fn write_atomic(path: &Path, record: &TrustRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record).context("Failed to serialise trust")?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to rename onto {}", path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current score, or `NEUTRAL_TRUST` for unknown sources.
    pub async fn get(&self, source: &str) -> f64 {
        self.scores
            .lock()
            .await
            .get(source)
            .copied()
            .unwrap_or(NEUTRAL_TRUST)
    }

    /// Apply feedback, persist the whole record, return the new score.
    ///
    /// A failed write is logged; the in-memory score stays authoritative.
    pub async fn update(&self, source: &str, success: bool) -> f64 {
        let mut scores = self.scores.lock().await;
        let current = scores.get(source).copied().unwrap_or(NEUTRAL_TRUST);
        let next = apply_feedback(current, success);
        scores.insert(source.to_string(), next);

        if let Err(e) = Self::write_atomic(&self.path, &scores) {
            error!(source, error = %e, "Failed to persist trust scores");
        }

        info!(
            source,
            success,
            before = format!("{current:.4}"),
            after = format!("{next:.4}"),
            "Trust updated"
        );
        next
    }

    pub async fn snapshot(&self) -> TrustRecord {
        self.scores.lock().await.clone()
    }

    /// Persist the current record without changing it.
    pub async fn persist(&self) -> Result<()> {
        let scores = self.scores.lock().await;
        Self::write_atomic(&self.path, &scores)
    }
}

#[async_trait]
impl TrustLedger for TrustStore {
    async fn get(&self, source: &str) -> f64 {
        TrustStore::get(self, source).await
    }

    async fn update(&self, source: &str, success: bool) -> f64 {
        TrustStore::update(self, source, success).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn temp_path() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("tidewatch_test_trust_{}.json", uuid::Uuid::new_v4()));
        p
    }

    fn sources() -> Vec<Source> {
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

    fn defaults() -> TrustRecord {
        TrustStore::defaults_from(&sources(), 0.85, 0.70)
    }

    fn cleanup(path: &Path) {
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_feedback_rule() {
        for s in [0.1, 0.25, 0.5, 0.855, 0.95, 0.99] {
            assert!((apply_feedback(s, true) - (s * 1.05).min(0.99)).abs() < 1e-12);
            assert!((apply_feedback(s, false) - (s * 0.90).max(0.1)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_feedback_boundaries() {
        assert_eq!(apply_feedback(0.99, true), 0.99);
        assert_eq!(apply_feedback(0.1, false), 0.1);
        assert_eq!(apply_feedback(0.98, true), 0.99);
        assert_eq!(apply_feedback(0.105, false), 0.1);
    }

    #[test]
    fn test_defaults_include_channels() {
        let d = defaults();
        assert_eq!(d[WEB_AI], 0.85);
        assert_eq!(d[DISCOVERY], 0.70);
        assert_eq!(d["FAT_PIG"], 0.95);
        assert_eq!(d.len(), 4);
    }

    #[test]
    fn test_defaults_clamped() {
        let src = vec![Source {
            name: "HYPE".into(),
            origin_id: "1".into(),
            default_trust: 1.0,
        }];
        let d = TrustStore::defaults_from(&src, 0.0, 0.5);
        assert_eq!(d["HYPE"], 0.99);
        assert_eq!(d[WEB_AI], 0.1);
    }

    #[tokio::test]
    async fn test_load_missing_uses_defaults() {
        let path = temp_path();
        let store = TrustStore::load(&path, &defaults());
        assert_eq!(store.get("FAT_PIG").await, 0.95);
        assert_eq!(store.snapshot().await, defaults());
    }

    #[tokio::test]
    async fn test_load_corrupt_uses_defaults() {
        let path = temp_path();
        std::fs::write(&path, "{ not json").unwrap();
        let store = TrustStore::load(&path, &defaults());
        assert_eq!(store.snapshot().await, defaults());
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_unknown_source_is_neutral() {
        let store = TrustStore::load(temp_path(), &defaults());
        assert_eq!(store.get("NOBODY").await, NEUTRAL_TRUST);
    }

    #[tokio::test]
    async fn test_update_failure_persists() {
        let path = temp_path();
        let store = TrustStore::load(&path, &defaults());

        let next = store.update("FAT_PIG", false).await;
        assert!((next - 0.855).abs() < 1e-9);

        let reloaded = TrustStore::load(&path, &defaults());
        assert!((reloaded.get("FAT_PIG").await - 0.855).abs() < 1e-9);
        assert!(!path.with_extension("json.tmp").exists());
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_update_unknown_source_starts_neutral() {
        let path = temp_path();
        let store = TrustStore::load(&path, &defaults());
        let next = store.update("NEW_CHANNEL", true).await;
        assert!((next - 0.525).abs() < 1e-9);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_load_persist_reload_idempotent() {
        let path = temp_path();
        let store = TrustStore::load(&path, &defaults());
        store.update("BINANCE_KILLERS", false).await;
        store.update(WEB_AI, true).await;

        let first = TrustStore::load(&path, &defaults());
        let before = first.snapshot().await;
        first.persist().await.unwrap();
        let second = TrustStore::load(&path, &defaults());
        assert_eq!(second.snapshot().await, before);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_load_clamps_and_merges() {
        let path = temp_path();
        std::fs::write(&path, r#"{"FAT_PIG": 1.5, "OLD": 0.01}"#).unwrap();
        let store = TrustStore::load(&path, &defaults());
        let snap = store.snapshot().await;
        assert_eq!(snap["FAT_PIG"], 0.99);
        assert_eq!(snap["OLD"], 0.1);
        // Missing defaults filled in.
        assert_eq!(snap["BINANCE_KILLERS"], 0.90);
        assert_eq!(snap[DISCOVERY], 0.70);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_success_raises_score() {
        let path = temp_path();
        let store = TrustStore::load(&path, &defaults());
        let next = store.update("BINANCE_KILLERS", true).await;
        assert!((next - 0.945).abs() < 1e-9);
        cleanup(&path);
    }

    #[tokio::test]
    async fn test_concurrent_updates_not_lost() {
        let path = temp_path();
        let store = Arc::new(TrustStore::load(&path, &defaults()));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.update("FAT_PIG", false).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        let expected = (0..10).fold(0.95, |s, _| apply_feedback(s, false));
        assert!((store.get("FAT_PIG").await - expected).abs() < 1e-12);
        cleanup(&path);
    }
}
