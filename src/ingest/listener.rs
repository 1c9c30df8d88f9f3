// src/ingest/listener.rs
//! One polling loop per source. The loop owns the source's watermark; nothing
//! else reads or writes it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio_util::sync::CancellationToken;

use crate::article::Article;
use crate::ingest::types::SourceAdapter;
use crate::sink::ArticleSink;

pub struct ListenerLoop {
    adapter: Box<dyn SourceAdapter>,
    watermark: DateTime<Utc>,
    interval: Option<Duration>,
}

impl ListenerLoop {
    /// Starts watching from the current time; the pause between iterations
    /// comes from the adapter.
    pub fn new(adapter: Box<dyn SourceAdapter>) -> Self {
        let interval = adapter.poll_interval();
        Self {
            adapter,
            watermark: Utc::now(),
            interval,
        }
    }

    pub fn with_watermark(mut self, watermark: DateTime<Utc>) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn with_interval(mut self, interval: Option<Duration>) -> Self {
        self.interval = interval;
        self
    }

    pub fn name(&self) -> &'static str {
        self.adapter.name()
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// One iteration: ask the adapter for the next article and advance the
    /// watermark. Adapter errors are logged and leave the watermark untouched.
    pub async fn poll_once(&mut self) -> Option<Article> {
        let source = self.adapter.name();
        match self.adapter.fetch_newest(self.watermark).await {
            Ok(Some((published_at, article))) => {
                if published_at <= self.watermark {
                    tracing::warn!(
                        target: "ingest",
                        source,
                        %published_at,
                        watermark = %self.watermark,
                        "adapter returned an article that is not newer than the watermark"
                    );
                    return None;
                }
                self.watermark = published_at;
                tracing::info!(target: "ingest", source, watermark = %self.watermark, "found new article");
                (!article.is_empty()).then_some(article)
            }
            Ok(None) => None,
            Err(e) => {
                counter!("ingest_provider_errors_total", "provider" => source).increment(1);
                tracing::error!(target: "ingest", source, error = %e, "exception while polling provider");
                None
            }
        }
    }

    /// Poll until `shutdown` is cancelled, handing every new article to `sink`.
    pub async fn run(mut self, sink: &dyn ArticleSink, shutdown: CancellationToken) {
        let source = self.adapter.name();
        tracing::info!(target: "ingest", source, from = %self.watermark, "starting to listen");

        loop {
            let found = tokio::select! {
                _ = shutdown.cancelled() => break,
                found = self.poll_once() => found,
            };

            if let Some(article) = found {
                counter!("ingest_articles_total", "provider" => source).increment(1);
                sink.receive(article).await;
            }

            match self.interval {
                Some(interval) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
                None => tokio::task::yield_now().await,
            }
        }

        tracing::info!(target: "ingest", source, watermark = %self.watermark, "listener stopped");
    }
}
