// src/ingest/mod.rs
pub mod providers;
pub mod types;

use metrics::counter;

use crate::error::DigestError;
use providers::{headline::HeadlineProvider, hotlist::HotlistProvider};
use types::{RankedItem, RankedSource, SourceKind, SourceSpec};

/// Hard cap on how many items one source can contribute to a run.
pub const MAX_FAN_OUT: usize = 30;

/// Dispatches a `SourceSpec` to the matching upstream client and collapses
/// every failure mode to an empty batch (the "skip this source" contract).
pub struct Upstream {
    hotlist: HotlistProvider,
    headline: Option<HeadlineProvider>,
}

impl Upstream {
    pub fn new(hotlist: HotlistProvider, headline: Option<HeadlineProvider>) -> Self {
        Self { hotlist, headline }
    }
}

#[async_trait::async_trait]
impl RankedSource for Upstream {
    async fn fetch_ranked(&self, spec: &SourceSpec) -> Vec<RankedItem> {
        let fetched = match spec.kind {
            SourceKind::Hotlist => self.hotlist.fetch(spec).await,
            SourceKind::Headline => match &self.headline {
                Some(p) => p.fetch(spec).await,
                None => {
                    tracing::warn!(source = %spec.name, "headline source configured without an API key");
                    return Vec::new();
                }
            },
        };

        match fetched {
            Ok(items) => items,
            Err(e) => {
                match &e {
                    DigestError::Transport(_) => {
                        counter!("source_transport_errors_total").increment(1)
                    }
                    _ => counter!("source_upstream_errors_total").increment(1),
                }
                tracing::warn!(source = %spec.name, error = %e, "source fetch failed, skipping");
                Vec::new()
            }
        }
    }
}
