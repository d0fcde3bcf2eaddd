// src/ingest/types.rs
use serde::{Deserialize, Serialize};

/// One entry of a ranked upstream list, normalized across providers.
/// Ordering within a batch is significant: display rank = position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedItem {
    pub title: String,
    pub url: String,
    pub rank: Option<u32>,
    /// Raw popularity figure as the upstream reports it (e.g. "1234567").
    pub popularity: Option<String>,
    pub summary: Option<String>,
}

/// Which upstream family a source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Hotlist,
    Headline,
}

/// How a headline source is addressed on the upstream API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadlineQuery {
    #[default]
    Sources,
    Category,
}

/// Typed description of one configured source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub upstream_id: String,
    /// Which field of an upstream record carries the item link.
    #[serde(default = "default_link_field")]
    pub link_field: String,
    pub kind: SourceKind,
    /// Only meaningful for `kind = "headline"`.
    #[serde(default)]
    pub query: HeadlineQuery,
}

fn default_link_field() -> String {
    "url".to_string()
}

impl SourceSpec {
    pub fn hotlist(name: &str, upstream_id: &str, link_field: &str) -> Self {
        Self {
            name: name.to_string(),
            upstream_id: upstream_id.to_string(),
            link_field: link_field.to_string(),
            kind: SourceKind::Hotlist,
            query: HeadlineQuery::Sources,
        }
    }

    pub fn headline(name: &str, upstream_id: &str, query: HeadlineQuery) -> Self {
        Self {
            name: name.to_string(),
            upstream_id: upstream_id.to_string(),
            link_field: default_link_field(),
            kind: SourceKind::Headline,
            query,
        }
    }
}

/// Fetches the current ranked list for one configured source.
///
/// Contract: never fails upward. Upstream rejections and transport errors
/// are logged and collapse to an empty batch, which callers treat as
/// "skip this source for this run."
#[async_trait::async_trait]
pub trait RankedSource: Send + Sync {
    async fn fetch_ranked(&self, spec: &SourceSpec) -> Vec<RankedItem>;
}
