// src/translate.rs
// Injected translation capability. The formatter treats failures as
// "keep the original text", so implementations are free to error out.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
}

/// Identity translator for sources that are already in the target language.
pub struct NoTranslate;

#[async_trait::async_trait]
impl Translator for NoTranslate {
    async fn translate(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Query-style HTTP translation endpoint:
/// `GET {endpoint}?msg={text}` -> `{ "data": { "target": "..." } }`.
pub struct HttpTranslator {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
    /// Upstream rate limit on the free tier; slept after every call.
    pace: Duration,
}

impl HttpTranslator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
            pace: Duration::from_secs(3),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }
}

#[async_trait::async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        if text.is_empty() {
            return Ok(String::new());
        }
        let body: Value = self
            .client
            .get(&self.endpoint)
            .query(&[("msg", text)])
            .timeout(self.timeout)
            .send()
            .await
            .context("translate request")?
            .error_for_status()
            .context("translate status")?
            .json()
            .await
            .context("translate body")?;

        let target = body
            .pointer("/data/target")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("translate payload missing data.target"))?
            .to_string();

        tokio::time::sleep(self.pace).await;
        Ok(target)
    }
}
