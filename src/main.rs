//! Digest Bot — Binary Entrypoint
//! Runs one publish cycle over the configured sources and exits.
//! Ctrl-C aborts the current source's remaining steps; messages already
//! published stand (no retraction).

use anyhow::Result;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hotlist_digest::classify::{ChatCompleter, Classifier};
use hotlist_digest::config::AppConfig;
use hotlist_digest::ingest::providers::{headline::HeadlineProvider, hotlist::HotlistProvider};
use hotlist_digest::ingest::Upstream;
use hotlist_digest::run::{run_once, RunDeps};
use hotlist_digest::translate::{HttpTranslator, NoTranslate, Translator};
use hotlist_digest::transport::BotApi;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hotlist_digest=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op where the environment is already set.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env()?;
    tracing::info!(
        sources = cfg.sources.len(),
        head_size = cfg.head_size,
        batch_size = cfg.batch_size,
        "starting digest run"
    );

    let transport = BotApi::new(&cfg.bot_token, cfg.render_mode).with_timeout(cfg.fetch_timeout_secs);

    let hotlist =
        HotlistProvider::new(cfg.hotlist_base_url.clone()).with_timeout(cfg.fetch_timeout_secs);
    let headline = cfg.headline_api_key.as_ref().map(|key| {
        HeadlineProvider::new(cfg.headline_base_url.clone(), key.clone())
            .with_timeout(cfg.fetch_timeout_secs)
    });
    let upstream = Upstream::new(hotlist, headline);

    let translator: Box<dyn Translator> = match &cfg.translate_endpoint {
        Some(endpoint) => Box::new(HttpTranslator::new(endpoint.clone())),
        None => Box::new(NoTranslate),
    };

    let completer = cfg
        .completion_endpoint
        .as_ref()
        .map(|endpoint| ChatCompleter::new(endpoint.clone(), cfg.completion_model.clone()));
    let classifier = completer.as_ref().map(|c| {
        let mut categories: Vec<String> = cfg.category_channels.keys().cloned().collect();
        if !categories.contains(&cfg.fallback_category) {
            categories.push(cfg.fallback_category.clone());
        }
        Classifier::new(c, categories, cfg.fallback_category.clone())
    });

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("cancellation requested");
            let _ = cancel_tx.send(true);
        }
    });

    let deps = RunDeps {
        transport: &transport,
        upstream: &upstream,
        translator: translator.as_ref(),
        classifier: classifier.as_ref(),
    };
    let summary = run_once(&deps, &cfg, cancel_rx).await;
    tracing::info!(digests = summary.len(), "done");
    Ok(())
}
