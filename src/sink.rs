//! # Article sinks
//! Where listener loops hand newly discovered articles.
//!
//! `StoreAndNotify` persists the article and then publishes a `scraped_url`
//! event. The listener has already advanced its watermark by the time the sink
//! runs, so storage is retried a few times before the article is dropped;
//! repeated inserts are harmless because storage upserts by URL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;

use crate::article::Article;
use crate::notify::{NewsEvent, Notifier};
use crate::storage::Storage;

#[async_trait]
pub trait ArticleSink: Send + Sync {
    /// Called once per newly discovered, non-empty article.
    async fn receive(&self, article: Article);
}

/// Logs every article it receives.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl ArticleSink for LogSink {
    async fn receive(&self, article: Article) {
        tracing::info!(
            target: "sink",
            origin = ?article.origin,
            published_at = ?article.published_at,
            url = article.url.as_deref().unwrap_or_default(),
            "new article"
        );
    }
}

pub struct StoreAndNotify {
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    max_attempts: u8,
    backoff: Duration,
}

impl StoreAndNotify {
    pub fn new(storage: Arc<dyn Storage>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            storage,
            notifier,
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }

    pub fn with_retries(mut self, max_attempts: u8, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    async fn store(&self, article: &Article) -> Option<i64> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.storage.add_article(article).await {
                Ok(id) => return Some(id),
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(target: "sink", error = ?e, attempt, "storing article failed, retrying");
                    tokio::time::sleep(self.backoff * (1u32 << (attempt - 1))).await;
                }
                Err(e) => {
                    tracing::error!(
                        target: "sink",
                        error = ?e,
                        url = article.url.as_deref().unwrap_or_default(),
                        "giving up on storing article"
                    );
                    counter!("sink_dropped_total").increment(1);
                    return None;
                }
            }
        }
    }
}

#[async_trait]
impl ArticleSink for StoreAndNotify {
    async fn receive(&self, article: Article) {
        let Some(article_id) = self.store(&article).await else {
            return;
        };

        let event = NewsEvent::ScrapedUrl { article_id };
        if let Err(e) = self.notifier.publish(&event).await {
            tracing::error!(target: "sink", error = ?e, article_id, "publishing event failed");
        }
    }
}
