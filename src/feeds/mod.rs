//! Signal feeds.
//!
//! Two kinds of input reach the dispatcher:
//! - **push**: short messages tagged with an origin id, delivered over an
//!   mpsc channel by a `PushFeed` (the Telegram bot long-poll in `telegram`);
//! - **pull**: text blobs fetched from fixed web endpoints by `WebPoller`.
//!
//! `SourceRegistry` maps a push origin onto a configured `Source`.

pub mod telegram;
pub mod web;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::SourceConfig;
use crate::types::Source;

/// A raw message from the push feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub origin_id: String,
    pub raw_text: String,
}

/// Producer of push events.
#[async_trait]
pub trait PushFeed: Send + Sync {
    fn name(&self) -> &str;

    /// Run until the receiver is dropped or the feed fails fatally.
    async fn run(&self, tx: mpsc::Sender<FeedEvent>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Source registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    pub fn from_config(sources: &[SourceConfig]) -> Self {
        Self::new(
            sources
                .iter()
                .map(|s| Source {
                    name: s.name.clone(),
                    origin_id: s.origin_id.clone(),
                    default_trust: s.trust,
                })
                .collect(),
        )
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Source whose configured id appears in `origin_id`.
    ///
    /// Chat ids arrive with platform prefixes (`-100…`), so the configured
    /// id is matched as a substring. First configured match wins.
    pub fn resolve(&self, origin_id: &str) -> Option<&Source> {
        self.sources
            .iter()
            .find(|s| !s.origin_id.is_empty() && origin_id.contains(s.origin_id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SourceRegistry {
        SourceRegistry::from_config(&[
            SourceConfig {
                name: "FAT_PIG".into(),
                origin_id: "10012345678".into(),
                trust: 0.95,
            },
            SourceConfig {
                name: "BINANCE_KILLERS".into(),
                origin_id: "10087654321".into(),
                trust: 0.90,
            },
        ])
    }

    #[test]
    fn test_resolve_exact_and_prefixed() {
        let r = registry();
        assert_eq!(r.resolve("10012345678").unwrap().name, "FAT_PIG");
        assert_eq!(r.resolve("-10010087654321").unwrap().name, "BINANCE_KILLERS");
    }

    #[test]
    fn test_unknown_origin_is_none() {
        let r = registry();
        assert!(r.resolve("-1009999").is_none());
        assert!(r.resolve("").is_none());
    }

    #[test]
    fn test_empty_origin_id_never_matches() {
        let r = SourceRegistry::new(vec![Source {
            name: "BLANK".into(),
            origin_id: String::new(),
            default_trust: 0.5,
        }]);
        assert!(r.resolve("12345").is_none());
    }
}
