// src/ingest/providers/headline.rs
// Client for the top-headlines API. Addressed either by source id or by
// category, payload shape: { status: "ok", articles: [ { title, description,
// url } ] }.

use std::time::Duration;

use metrics::counter;
use serde_json::Value;

use crate::error::{DigestError, DigestResult};
use crate::ingest::types::{HeadlineQuery, RankedItem, SourceSpec};
use crate::ingest::MAX_FAN_OUT;

pub struct HeadlineProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HeadlineProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub async fn fetch(&self, spec: &SourceSpec) -> DigestResult<Vec<RankedItem>> {
        let query_key = match spec.query {
            HeadlineQuery::Sources => "sources",
            HeadlineQuery::Category => "category",
        };
        let page_size = MAX_FAN_OUT.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("pageSize", page_size.as_str()),
                (query_key, spec.upstream_id.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(DigestError::Upstream(format!(
                "headline {}: HTTP {}",
                spec.name,
                resp.status()
            )));
        }
        let body: Value = resp.json().await?;
        parse_payload(spec, &body)
    }
}

pub(crate) fn parse_payload(spec: &SourceSpec, body: &Value) -> DigestResult<Vec<RankedItem>> {
    let status = body.get("status").and_then(Value::as_str).unwrap_or("");
    if status != "ok" {
        let msg = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown upstream error");
        return Err(DigestError::Upstream(format!(
            "headline {}: status {status:?}: {msg}",
            spec.name
        )));
    }

    let Some(rows) = body.get("articles").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(rows.len().min(MAX_FAN_OUT));
    for row in rows.iter().take(MAX_FAN_OUT) {
        let Some(title) = row.get("title").and_then(Value::as_str) else {
            continue;
        };
        let url = row
            .get(spec.link_field.as_str())
            .and_then(Value::as_str)
            .unwrap_or("#");
        let summary = row
            .get("description")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        out.push(RankedItem {
            title: html_escape::decode_html_entities(title).into_owned(),
            url: url.to_string(),
            rank: None,
            popularity: None,
            summary,
        });
    }

    counter!("ingest_items_total").increment(out.len() as u64);
    Ok(out)
}
