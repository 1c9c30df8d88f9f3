// src/ingest/scheduler.rs
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::config::{ListenerConfig, SourceKind};
use crate::ingest::listener::ListenerLoop;
use crate::ingest::providers::{CnbcAdapter, GuardianAdapter, NytAdapter};
use crate::ingest::types::SourceAdapter;
use crate::sink::ArticleSink;

/// Drives every listener loop concurrently inside a single future. Loops never
/// finish on their own; `run` returns once all of them have seen `shutdown`.
pub struct Scheduler {
    listeners: Vec<ListenerLoop>,
    sink: Arc<dyn ArticleSink>,
}

impl Scheduler {
    pub fn new(sink: Arc<dyn ArticleSink>) -> Self {
        Self {
            listeners: Vec::new(),
            sink,
        }
    }

    /// One listener per configured source.
    pub fn from_config(cfg: &ListenerConfig, sink: Arc<dyn ArticleSink>) -> Result<Self> {
        let mut scheduler = Self::new(sink);
        for kind in &cfg.sources {
            let adapter = build_adapter(*kind, cfg)?;
            let mut listener = ListenerLoop::new(adapter);
            if let (Some(secs), Some(_)) = (cfg.poll_interval_secs, listener.interval()) {
                listener = listener.with_interval(Some(std::time::Duration::from_secs(secs)));
            }
            scheduler.add_listener(listener);
        }
        Ok(scheduler)
    }

    pub fn add_listener(&mut self, listener: ListenerLoop) {
        self.listeners.push(listener);
    }

    pub fn with_listener(mut self, listener: ListenerLoop) -> Self {
        self.add_listener(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn sources(&self) -> Vec<&'static str> {
        self.listeners.iter().map(ListenerLoop::name).collect()
    }

    pub async fn run(self, shutdown: CancellationToken) {
        crate::ingest::ensure_metrics_described();
        tracing::info!(target: "ingest", sources = ?self.sources(), "starting listeners");

        let sink = self.sink;
        join_all(
            self.listeners
                .into_iter()
                .map(|listener| listener.run(sink.as_ref(), shutdown.clone())),
        )
        .await;

        tracing::info!(target: "ingest", "all listeners stopped");
    }
}

fn build_adapter(kind: SourceKind, cfg: &ListenerConfig) -> Result<Box<dyn SourceAdapter>> {
    let ep = &cfg.endpoints;
    Ok(match kind {
        SourceKind::Cnbc => Box::new(CnbcAdapter::new(&ep.cnbc, cfg.cnbc_query.clone())?),
        SourceKind::Guardian => Box::new(GuardianAdapter::new(
            &ep.guardian,
            cfg.guardian_api_key.clone(),
        )?),
        SourceKind::Nyt => Box::new(NytAdapter::new(
            &ep.nyt_recent,
            &ep.nyt_archive,
            cfg.nyt_api_key.clone(),
            cfg.nyt_subsections.clone(),
        )?),
    })
}
