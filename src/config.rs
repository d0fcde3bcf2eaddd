// src/config.rs
// Typed configuration: environment for secrets and knobs, TOML for the
// ordered source list. Missing required keys fail at startup; everything
// else has a default.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::format::RenderMode;
use crate::ingest::types::{HeadlineQuery, SourceSpec};
use crate::locate::LocatorConfig;

const ENV_SOURCES_PATH: &str = "DIGEST_SOURCES_PATH";
const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    /// Broadcast destination ("@name" or numeric id).
    pub channel_id: String,
    /// Linked discussion group (numeric id as the event feed reports it).
    pub group_id: String,

    pub hotlist_base_url: String,
    pub headline_base_url: String,
    pub headline_api_key: Option<String>,
    pub translate_endpoint: Option<String>,
    pub completion_endpoint: Option<String>,
    pub completion_model: String,

    pub render_mode: RenderMode,
    pub head_size: usize,
    pub batch_size: usize,
    pub fetch_timeout_secs: u64,
    /// Pause between sources and between reply sends.
    pub pace: Duration,
    pub locator: LocatorConfig,

    pub sources: Vec<SourceSpec>,
    pub category_channels: BTreeMap<String, String>,
    pub fallback_category: String,
    pub footer: Option<String>,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_required(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| anyhow!("missing required env var {key}"))
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let bot_token = env_required("BOT_TOKEN")?;
        let channel_id = env_required("DIGEST_CHANNEL_ID")?;
        let group_id = env_required("DIGEST_GROUP_ID")?;

        let render_mode = match env_opt("DIGEST_RENDER_MODE").as_deref() {
            Some("markdown") => RenderMode::Markdown,
            _ => RenderMode::Html,
        };

        let locator = LocatorConfig {
            max_rounds: env_parse("LOCATOR_MAX_ROUNDS", 6u32),
            poll_pace: Duration::from_secs(env_parse("LOCATOR_POLL_SECS", 2u64)),
            settle_delay: Duration::from_secs(env_parse("LOCATOR_SETTLE_SECS", 4u64)),
        };

        let file = load_sources_default()?;

        Ok(Self {
            bot_token,
            channel_id,
            group_id,
            hotlist_base_url: env_opt("HOTLIST_BASE_URL")
                .unwrap_or_else(|| "https://api.pearktrue.cn/api/dailyhot/".to_string()),
            headline_base_url: env_opt("HEADLINE_BASE_URL")
                .unwrap_or_else(|| "https://newsapi.org/v2/top-headlines".to_string()),
            headline_api_key: env_opt("HEADLINE_API_KEY"),
            translate_endpoint: env_opt("TRANSLATE_ENDPOINT"),
            completion_endpoint: env_opt("COMPLETION_ENDPOINT"),
            completion_model: env_opt("COMPLETION_MODEL").unwrap_or_else(|| "qwq".to_string()),
            render_mode,
            head_size: env_parse("DIGEST_HEAD_SIZE", 10usize).clamp(1, 10),
            batch_size: env_parse("DIGEST_BATCH_SIZE", 10usize).clamp(1, 10),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", 10u64),
            pace: Duration::from_secs(env_parse("DIGEST_PACE_SECS", 2u64)),
            locator,
            sources: file.sources,
            category_channels: file.category_channels,
            fallback_category: file.fallback_category,
            footer: file.footer,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub category_channels: BTreeMap<String, String>,
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,
    #[serde(default)]
    pub footer: Option<String>,
}

fn default_fallback_category() -> String {
    "general".to_string()
}

pub fn load_sources_from(path: &Path) -> Result<SourcesFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Load the source list using env var + fallbacks:
/// 1) $DIGEST_SOURCES_PATH
/// 2) config/sources.toml
/// 3) built-in defaults
pub fn load_sources_default() -> Result<SourcesFile> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        }
        return Err(anyhow!("DIGEST_SOURCES_PATH points to non-existent path"));
    }
    let default = PathBuf::from(DEFAULT_SOURCES_PATH);
    if default.exists() {
        return load_sources_from(&default);
    }
    Ok(builtin_sources())
}

/// Fixed publish order: foreign media, then topical categories, then the
/// platform hot lists.
fn builtin_sources() -> SourcesFile {
    SourcesFile {
        sources: vec![
            SourceSpec::headline("Bloomberg", "bloomberg", HeadlineQuery::Sources),
            SourceSpec::headline("BBC", "bbc-news", HeadlineQuery::Sources),
            SourceSpec::headline("World-Business", "business", HeadlineQuery::Category),
            SourceSpec::headline("World-Science", "science", HeadlineQuery::Category),
            SourceSpec::headline("World-Technology", "technology", HeadlineQuery::Category),
            SourceSpec::hotlist("Bilibili", "哔哩哔哩", "mobileUrl"),
            SourceSpec::hotlist("Weibo", "微博", "url"),
            SourceSpec::hotlist("Zhihu", "知乎", "url"),
        ],
        category_channels: BTreeMap::new(),
        fallback_category: default_fallback_category(),
        footer: None,
    }
}
