pub mod listeners;

pub use listeners::{Endpoints, ListenerConfig, SourceKind};
