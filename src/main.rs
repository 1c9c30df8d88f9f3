//! News listener: binary entrypoint.
//! Loads config, wires the sink chain and runs one polling loop per source
//! until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_listener::notify::{LogNotifier, Notifier, NotifierMux, WebhookNotifier};
use news_listener::storage::MemoryStorage;
use news_listener::{ListenerConfig, Scheduler, StoreAndNotify};

/// Compact logs by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_listener=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // .env is optional; a missing file is not an error.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = ListenerConfig::load().context("loading listener config")?;

    if let Some(addr) = cfg.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing prometheus exporter")?;
        tracing::info!(%addr, "metrics exporter listening");
    }

    let mut notifier = NotifierMux::new().with(Arc::new(LogNotifier));
    if let Some(url) = cfg.webhook_url.clone() {
        notifier = notifier.with(Arc::new(WebhookNotifier::new(url)));
    }
    let notifier: Arc<dyn Notifier> = Arc::new(notifier);
    let sink = Arc::new(StoreAndNotify::new(Arc::new(MemoryStorage::new()), notifier));

    let scheduler = Scheduler::from_config(&cfg, sink)?;

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
        }
        on_signal.cancel();
    });

    scheduler.run(shutdown).await;
    Ok(())
}
