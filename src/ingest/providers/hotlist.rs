// src/ingest/providers/hotlist.rs
// Client for the "daily hot search" aggregator API. One GET per platform,
// payload shape: { code: 200, data: [ { title, hot, desc, url, mobileUrl } ] }.

use std::time::Duration;

use metrics::counter;
use serde_json::Value;

use crate::error::{DigestError, DigestResult};
use crate::ingest::types::{RankedItem, SourceSpec};
use crate::ingest::MAX_FAN_OUT;

pub struct HotlistProvider {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HotlistProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub async fn fetch(&self, spec: &SourceSpec) -> DigestResult<Vec<RankedItem>> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("title", spec.upstream_id.as_str())])
            .timeout(self.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(DigestError::Upstream(format!(
                "hotlist {}: HTTP {}",
                spec.name,
                resp.status()
            )));
        }
        let body: Value = resp.json().await?;
        parse_payload(spec, &body)
    }
}

pub(crate) fn parse_payload(spec: &SourceSpec, body: &Value) -> DigestResult<Vec<RankedItem>> {
    let code = body.get("code").and_then(Value::as_i64).unwrap_or(0);
    if code != 200 {
        let msg = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown upstream error");
        return Err(DigestError::Upstream(format!(
            "hotlist {}: payload code {code}: {msg}",
            spec.name
        )));
    }

    let Some(rows) = body.get("data").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(rows.len().min(MAX_FAN_OUT));
    for (i, row) in rows.iter().take(MAX_FAN_OUT).enumerate() {
        let title = row
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("(untitled)");
        let url = row
            .get(spec.link_field.as_str())
            .and_then(Value::as_str)
            .unwrap_or("#");
        let popularity = match row.get("hot") {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };
        let summary = row
            .get("desc")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        out.push(RankedItem {
            title: html_escape::decode_html_entities(title).into_owned(),
            url: url.to_string(),
            rank: Some((i + 1) as u32),
            popularity,
            summary,
        });
    }

    counter!("ingest_items_total").increment(out.len() as u64);
    Ok(out)
}
