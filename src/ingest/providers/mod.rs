// src/ingest/providers/mod.rs
pub mod cnbc;
pub mod guardian;
pub mod nyt;

pub use cnbc::CnbcAdapter;
pub use guardian::GuardianAdapter;
pub use nyt::NytAdapter;
