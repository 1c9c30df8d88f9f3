// src/ingest/mod.rs
pub mod http;
pub mod listener;
pub mod paging;
pub mod providers;
pub mod rate_limit;
pub mod scheduler;
pub mod timestamp;
pub mod types;

use metrics::{describe_counter, Unit};
use once_cell::sync::OnceCell;

pub use listener::ListenerLoop;
pub use rate_limit::{Attempt, FromFn, Operation, RateLimit, RateLimitedCall};
pub use scheduler::Scheduler;
pub use types::{Fetched, SourceAdapter, SourceError};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_articles_total",
            Unit::Count,
            "New articles handed to the sink."
        );
        describe_counter!(
            "ingest_pages_fetched_total",
            Unit::Count,
            "Provider pages fetched."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            Unit::Count,
            "Provider payload errors caught by the listener loop."
        );
        describe_counter!(
            "ingest_rate_limited_total",
            Unit::Count,
            "Calls delayed by the local budget or throttled upstream."
        );
        describe_counter!(
            "sink_dropped_total",
            Unit::Count,
            "Articles dropped after storage kept failing."
        );
    });
}
