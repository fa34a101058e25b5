//! Telegram Bot API push feed.
//!
//! Long-polls `getUpdates` and forwards the text of every `message` and
//! `channel_post` as a `FeedEvent` tagged with the chat id. The offset is
//! advanced past each batch so updates are delivered once.
//!
//! API: `https://api.telegram.org/bot<token>/getUpdates`

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{FeedEvent, PushFeed};

const API_BASE: &str = "https://api.telegram.org";

/// Pause after a failed poll before retrying.
const RETRY_DELAY: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    channel_post: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Events in a batch and the offset that acknowledges it.
fn events_from(updates: Vec<Update>, offset: i64) -> (Vec<FeedEvent>, i64) {
    let mut next = offset;
    let mut events = Vec::new();
    for update in updates {
        next = next.max(update.update_id + 1);
        let Some(msg) = update.message.or(update.channel_post) else {
            continue;
        };
        if let Some(text) = msg.text.or(msg.caption) {
            events.push(FeedEvent {
                origin_id: msg.chat.id.to_string(),
                raw_text: text,
            });
        }
    }
    (events, next)
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

pub struct TelegramFeed {
    http: Client,
    token: SecretString,
    long_poll_secs: u64,
    api_base: String,
}

impl TelegramFeed {
    pub fn new(token: SecretString, long_poll_secs: u64) -> Result<Self> {
        // Request timeout must outlast the server-side long poll.
        let http = Client::builder()
            .timeout(Duration::from_secs(long_poll_secs + 10))
            .user_agent(concat!("tidewatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build Telegram HTTP client")?;
        Ok(Self {
            http,
            token,
            long_poll_secs,
            api_base: API_BASE.to_string(),
        })
    }

    /// Point the feed at a different Bot API host.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let url = format!("{}/bot{}/getUpdates", self.api_base, self.token.expose_secret());
        let resp: UpdatesResponse = self
            .http
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.long_poll_secs.to_string()),
                ("allowed_updates", r#"["message","channel_post"]"#.to_string()),
            ])
            .send()
            .await
            .context("getUpdates request failed")?
            .json()
            .await
            .context("getUpdates returned malformed JSON")?;

        if !resp.ok {
            anyhow::bail!(
                "getUpdates rejected: {}",
                resp.description.unwrap_or_else(|| "no description".into())
            );
        }
        Ok(resp.result)
    }
}

#[async_trait]
impl PushFeed for TelegramFeed {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn run(&self, tx: mpsc::Sender<FeedEvent>) -> Result<()> {
        info!(long_poll_secs = self.long_poll_secs, "Telegram feed listening");
        let mut offset = 0_i64;

        loop {
            let polled = tokio::select! {
                biased;
                _ = tx.closed() => {
                    info!("Push listener closed, Telegram feed stopping");
                    return Ok(());
                }
                polled = self.get_updates(offset) => polled,
            };
            let updates = match polled {
                Ok(u) => u,
                Err(e) => {
                    warn!(error = %e, "Telegram poll failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };

            let (events, next) = events_from(updates, offset);
            offset = next;
            debug!(events = events.len(), offset, "Telegram batch");

            for event in events {
                if tx.send(event).await.is_err() {
                    info!("Push listener closed, Telegram feed stopping");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, routing::get, Json, Router};
    use std::collections::HashMap;

    fn parse(json: &str) -> Vec<Update> {
        serde_json::from_str::<UpdatesResponse>(json).unwrap().result
    }

    #[test]
    fn test_events_from_messages_and_channel_posts() {
        let updates = parse(
            r#"{"ok":true,"result":[
                {"update_id":7,"message":{"chat":{"id":-10010012345678},"text":"$PEPE mooning"}},
                {"update_id":8,"channel_post":{"chat":{"id":-10010087654321},"caption":"$WIF send it"}},
                {"update_id":9,"edited_message":{"chat":{"id":1},"text":"ignored"}}
            ]}"#,
        );
        let (events, next) = events_from(updates, 0);
        assert_eq!(next, 10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].origin_id, "-10010012345678");
        assert_eq!(events[0].raw_text, "$PEPE mooning");
        assert_eq!(events[1].raw_text, "$WIF send it");
    }

    #[test]
    fn test_empty_batch_keeps_offset() {
        let (events, next) = events_from(Vec::new(), 42);
        assert!(events.is_empty());
        assert_eq!(next, 42);
    }

    #[test]
    fn test_message_without_text_skipped() {
        let updates = parse(
            r#"{"ok":true,"result":[{"update_id":3,"message":{"chat":{"id":5}}}]}"#,
        );
        let (events, next) = events_from(updates, 0);
        assert!(events.is_empty());
        assert_eq!(next, 4);
    }

    #[tokio::test]
    async fn test_run_forwards_events_until_receiver_drops() {
        let app = Router::new().route(
            "/botTEST/getUpdates",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let offset: i64 = q.get("offset").and_then(|o| o.parse().ok()).unwrap_or(0);
                Json(serde_json::json!({
                    "ok": true,
                    "result": [{
                        "update_id": offset,
                        "message": {"chat": {"id": -10010012345678_i64}, "text": format!("$PEPE #{offset}")}
                    }]
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let feed = TelegramFeed::new(SecretString::new("TEST".into()), 1)
            .unwrap()
            .with_api_base(&format!("http://{addr}"));
        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move { feed.run(tx).await });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.raw_text, "$PEPE #0");
        assert_eq!(second.raw_text, "$PEPE #1");
        drop(rx);

        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_run_stops_mid_poll_when_receiver_drops() {
        // Accepts the long-poll request and never answers it.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let feed = TelegramFeed::new(SecretString::new("TEST".into()), 30)
            .unwrap()
            .with_api_base(&format!("http://{addr}"));
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move { feed.run(tx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(rx);

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("feed keeps polling after the listener is gone");
        assert!(result.unwrap().is_ok());
    }
}
