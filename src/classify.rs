// src/classify.rs
// Optional zero-shot categorization of formatted entries through the
// chat-completion collaborator, fanning matched groups out to per-category
// channels. Entirely best-effort: any failure maps to the fallback category.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{json, Value};

use crate::format::FormattedEntry;
use crate::transport::ChannelTransport;

/// Cap on entries repeated into one category-channel message.
const CATEGORY_MESSAGE_CAP: usize = 15;

#[async_trait::async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// OpenAI-style chat-completions client.
pub struct ChatCompleter {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl ChatCompleter {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait::async_trait]
impl Completer for ChatCompleter {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body: Value = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
                "temperature": 0.1,
                "max_tokens": 50,
            }))
            .send()
            .await
            .context("completion request")?
            .error_for_status()
            .context("completion status")?
            .json()
            .await
            .context("completion body")?;

        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("completion reply missing choices[0].message.content"))
    }
}

pub struct Classifier<'a> {
    completer: &'a dyn Completer,
    categories: Vec<String>,
    fallback: String,
}

impl<'a> Classifier<'a> {
    pub fn new(completer: &'a dyn Completer, categories: Vec<String>, fallback: String) -> Self {
        Self {
            completer,
            categories,
            fallback,
        }
    }

    /// Zero-shot single-label classification. Any failure, or a label outside
    /// the configured set, resolves to the fallback category.
    pub async fn classify(&self, text: &str) -> String {
        let clipped: String = text.chars().take(1000).collect();
        let user = format!(
            "Classify the following news entry. Reply with JSON only, in the form \
             {{\"category\": \"<name>\"}}.\nAllowed categories: {}.\n\nEntry:\n{clipped}",
            self.categories.join(", ")
        );
        let reply = match self
            .completer
            .complete("You label news items with exactly one category.", &user)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                counter!("classify_failures_total").increment(1);
                tracing::warn!(error = %e, "classification failed, using fallback");
                return self.fallback.clone();
            }
        };

        match extract_category(&reply) {
            Some(c) if self.categories.iter().any(|k| k == &c) => c,
            _ => self.fallback.clone(),
        }
    }
}

/// Pull the label out of a (possibly chatty) model reply.
pub(crate) fn extract_category(reply: &str) -> Option<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r#"\{\s*"category"\s*:\s*"([^"]+)"\s*\}"#).unwrap());
    re.captures(reply).map(|c| c[1].to_string())
}

/// Groups entries per category and posts one message per mapped channel.
/// Unmapped categories are skipped; send failures are logged and isolated.
pub async fn fan_out_categories(
    transport: &dyn ChannelTransport,
    channels: &BTreeMap<String, String>,
    classifier: &Classifier<'_>,
    source_name: &str,
    entries: &[FormattedEntry],
    pace: Duration,
) {
    if channels.is_empty() {
        return;
    }

    let mut grouped: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for entry in entries {
        let category = classifier.classify(&entry.rendered).await;
        grouped.entry(category).or_default().push(&entry.rendered);
    }

    for (category, items) in grouped {
        let Some(channel) = channels.get(&category) else {
            tracing::debug!(category = %category, "no channel mapped, skipping");
            continue;
        };
        let body: Vec<&str> = items.into_iter().take(CATEGORY_MESSAGE_CAP).collect();
        let text = format!("[{source_name} - {category}]\n\n{}", body.join("\n\n"));
        match transport.send_message(channel, &text, None).await {
            Ok(_) => counter!("category_messages_sent_total").increment(1),
            Err(e) => {
                tracing::warn!(error = %e, category = %category, "category send failed")
            }
        }
        tokio::time::sleep(pace).await;
    }
}
