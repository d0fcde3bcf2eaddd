// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod classify;
pub mod config;
pub mod error;
pub mod format;
pub mod ingest;
pub mod locate;
pub mod overflow;
pub mod publish;
pub mod run;
pub mod translate;
pub mod transport;

// ---- Re-exports for stable public API ----
pub use config::AppConfig;
pub use error::{DigestError, DigestResult};
pub use format::{FormattedEntry, RenderMode};
pub use ingest::types::{RankedItem, RankedSource, SourceKind, SourceSpec};
pub use locate::{LocateOutcome, LocatorConfig};
pub use publish::PublishedDigest;
pub use run::{run_once, RunDeps, RunSummaryEntry};
pub use transport::{BotApi, ChannelTransport, ChatEvent, MessageHandle};
