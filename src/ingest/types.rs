// src/ingest/types.rs
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::article::{Article, Origin};
use crate::ingest::providers::{cnbc::CnbcError, guardian::GuardianError, nyt::NytError};

/// Delay between iterations for adapters that do not pace themselves.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Newest unseen article, if any, with its publish time.
pub type Fetched = Option<(DateTime<Utc>, Article)>;

/// Provider-scoped failures surfaced to the listener loop.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Cnbc(#[from] CnbcError),
    #[error(transparent)]
    Guardian(#[from] GuardianError),
    #[error(transparent)]
    Nyt(#[from] NytError),
}

#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Earliest qualifying article published strictly after `watermark`.
    async fn fetch_newest(&self, watermark: DateTime<Utc>) -> Result<Fetched, SourceError>;

    fn origin(&self) -> Origin;

    fn name(&self) -> &'static str {
        self.origin().name()
    }

    /// Fixed delay the listener sleeps between iterations; `None` when the
    /// adapter's own rate budget already paces the loop.
    fn poll_interval(&self) -> Option<Duration> {
        Some(DEFAULT_POLL_INTERVAL)
    }
}
