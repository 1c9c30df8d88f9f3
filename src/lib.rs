// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod article;
pub mod config;
pub mod ingest;
pub mod notify;
pub mod sink;
pub mod storage;

// ---- Re-exports for stable public API ----
pub use crate::article::{Article, Origin};
pub use crate::config::{ListenerConfig, SourceKind};
pub use crate::ingest::{ListenerLoop, RateLimit, RateLimitedCall, Scheduler, SourceAdapter};
pub use crate::notify::{NewsEvent, Notifier, NotifierMux};
pub use crate::sink::{ArticleSink, StoreAndNotify};
