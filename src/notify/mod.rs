pub mod webhook;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use webhook::WebhookNotifier;

/// Event published once a new article has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NewsEvent {
    ScrapedUrl { article_id: i64 },
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Fire-and-forget publication; no acknowledgement is awaited beyond the
    /// transport itself.
    async fn publish(&self, event: &NewsEvent) -> Result<()>;
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, event: &NewsEvent) -> Result<()> {
        match event {
            NewsEvent::ScrapedUrl { article_id } => {
                tracing::info!(target: "notify", article_id, "scraped_url");
            }
        }
        Ok(())
    }
}

/// Fans an event out to every configured notifier. One failing notifier does
/// not stop the others; the first error is returned after all have run.
#[derive(Default, Clone)]
pub struct NotifierMux {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait::async_trait]
impl Notifier for NotifierMux {
    async fn publish(&self, event: &NewsEvent) -> Result<()> {
        let mut first_err = None;
        for n in &self.notifiers {
            if let Err(e) = n.publish(event).await {
                tracing::warn!(target: "notify", error = ?e, "notifier failed");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<NewsEvent>>);

    #[async_trait::async_trait]
    impl Notifier for Recording {
        async fn publish(&self, event: &NewsEvent) -> Result<()> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl Notifier for Failing {
        async fn publish(&self, _event: &NewsEvent) -> Result<()> {
            anyhow::bail!("broker down")
        }
    }

    #[test]
    fn scraped_url_event_wire_shape() {
        let json = serde_json::to_value(NewsEvent::ScrapedUrl { article_id: 42 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "scraped_url", "article_id": 42}));
    }

    #[tokio::test]
    async fn mux_reaches_every_notifier_even_after_a_failure() {
        let rec = Arc::new(Recording(Mutex::new(Vec::new())));
        let mux = NotifierMux::new()
            .with(Arc::new(Failing))
            .with(rec.clone());

        let ev = NewsEvent::ScrapedUrl { article_id: 7 };
        assert!(mux.publish(&ev).await.is_err());
        assert_eq!(*rec.0.lock().unwrap(), vec![ev]);
    }
}
