// src/run.rs
// Run Orchestrator: pins a run-started marker, walks the configured sources
// in order (fetch -> format -> publish -> locate forward -> overflow), and
// closes with one cross-reference message linking every published digest.
// Source pipelines are isolated: one failing source never stops the loop.

use metrics::{describe_counter, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::watch;

use crate::classify::{fan_out_categories, Classifier};
use crate::config::AppConfig;
use crate::format::{escape_markup, FormattedEntry, Formatter, RenderMode};
use crate::ingest::types::{RankedSource, SourceKind, SourceSpec};
use crate::locate::{locate_forward, LocateOutcome};
use crate::overflow::{dispatch_overflow, OverflowConfig};
use crate::publish::publish_digest;
use crate::translate::{NoTranslate, Translator};
use crate::transport::ChannelTransport;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items parsed from upstream sources.");
        describe_counter!("source_upstream_errors_total", "Upstream rejections per source fetch.");
        describe_counter!("source_transport_errors_total", "Transport failures per source fetch.");
        describe_counter!("translation_failures_total", "Translations that fell back to the original text.");
        describe_counter!("digest_published_total", "Head digests posted to the broadcast channel.");
        describe_counter!("publish_errors_total", "Head digest sends that failed.");
        describe_counter!("forward_found_total", "Auto-forwards located in the discussion group.");
        describe_counter!("forward_timeout_total", "Forward discoveries that timed out.");
        describe_counter!("overflow_batches_sent_total", "Overflow reply batches sent.");
        describe_counter!("overflow_batch_errors_total", "Overflow reply batches that failed.");
        describe_counter!("overflow_dropped_total", "Sources whose overflow was dropped for lack of a forward.");
        describe_counter!("classify_failures_total", "Classifications that fell back to the default category.");
        describe_counter!("category_messages_sent_total", "Messages fanned out to category channels.");
    });
}

/// Everything a run needs, constructed by the caller with a lifetime of one
/// run. Keeps the pipeline free of process-wide singletons.
pub struct RunDeps<'a> {
    pub transport: &'a dyn ChannelTransport,
    pub upstream: &'a dyn RankedSource,
    pub translator: &'a dyn Translator,
    pub classifier: Option<&'a Classifier<'a>>,
}

/// Cross-reference record for one successfully published digest.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummaryEntry {
    pub source_name: String,
    pub message_id: i64,
    pub head_entry: FormattedEntry,
}

fn cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow()
}

/// Run the whole digest cycle once. Returns the summary entries that made it
/// out; an empty vec means no source produced a digest this run.
pub async fn run_once(
    deps: &RunDeps<'_>,
    cfg: &AppConfig,
    cancel: watch::Receiver<bool>,
) -> Vec<RunSummaryEntry> {
    ensure_metrics_described();
    let started = chrono::Utc::now();
    gauge!("digest_run_last_started_ts").set(started.timestamp() as f64);

    let stamp = started.format("%Y-%m-%d %H:%M");
    let marker = match cfg.render_mode {
        RenderMode::Html => format!("Run started: <b>{stamp} UTC</b>"),
        RenderMode::Markdown => format!("Run started: *{stamp} UTC*"),
    };
    match deps
        .transport
        .send_message(&cfg.channel_id, &marker, None)
        .await
    {
        Ok(handle) => {
            if let Err(e) = deps.transport.pin_message(&cfg.channel_id, handle.id).await {
                tracing::warn!(error = %e, "pinning run marker failed");
            }
        }
        Err(e) => tracing::warn!(error = %e, "run marker send failed"),
    }
    tokio::time::sleep(cfg.pace).await;

    let mut summary = Vec::new();
    for spec in &cfg.sources {
        if cancelled(&cancel) {
            tracing::info!("cancellation requested, stopping before next source");
            break;
        }
        if let Some(entry) = run_source(deps, cfg, spec, &cancel).await {
            summary.push(entry);
        }
        tokio::time::sleep(cfg.pace).await;
    }

    if !summary.is_empty() && !cancelled(&cancel) {
        let text = render_summary(&stamp.to_string(), &summary, cfg);
        if let Err(e) = deps
            .transport
            .send_message(&cfg.channel_id, &text, None)
            .await
        {
            tracing::warn!(error = %e, "summary send failed");
        }
    }

    tracing::info!(digests = summary.len(), "run finished");
    summary
}

/// One source, end to end. Every failure is logged and collapses to `None`;
/// the caller just moves on.
async fn run_source(
    deps: &RunDeps<'_>,
    cfg: &AppConfig,
    spec: &SourceSpec,
    cancel: &watch::Receiver<bool>,
) -> Option<RunSummaryEntry> {
    tracing::info!(source = %spec.name, "fetching");
    let items = deps.upstream.fetch_ranked(spec).await;
    if items.is_empty() {
        tracing::info!(source = %spec.name, "no items, skipping");
        return None;
    }

    // Hot lists are already in the target language; only headline feeds go
    // through the translator.
    let translator: &dyn Translator = match spec.kind {
        SourceKind::Headline => deps.translator,
        SourceKind::Hotlist => &NoTranslate,
    };
    let formatter = Formatter::new(cfg.render_mode, spec.kind, translator);
    let entries = formatter.format_batch(&items).await;

    let digest = match publish_digest(
        deps.transport,
        &cfg.channel_id,
        &spec.name,
        &entries,
        cfg.head_size,
        cfg.render_mode,
    )
    .await
    {
        Ok(d) => d,
        Err(e) => {
            metrics::counter!("publish_errors_total").increment(1);
            tracing::warn!(source = %spec.name, error = %e, "head digest failed, abandoning source");
            return None;
        }
    };

    let entry = RunSummaryEntry {
        source_name: digest.source_name.clone(),
        message_id: digest.message_id,
        head_entry: digest.head_entry.clone(),
    };

    // The digest stands even if we get cancelled past this point.
    if cancelled(cancel) {
        return Some(entry);
    }

    let outcome = locate_forward(
        deps.transport,
        &cfg.group_id,
        digest.sent_at_epoch,
        &cfg.locator,
    )
    .await;
    let forward_id = match outcome {
        LocateOutcome::Found { group_message_id } => Some(group_message_id),
        LocateOutcome::TimedOut => None,
    };

    dispatch_overflow(
        deps.transport,
        &cfg.group_id,
        forward_id,
        &entries,
        &OverflowConfig {
            head_size: cfg.head_size,
            batch_size: cfg.batch_size,
            pace: cfg.pace,
        },
    )
    .await;

    if let Some(classifier) = deps.classifier {
        if !cancelled(cancel) {
            fan_out_categories(
                deps.transport,
                &cfg.category_channels,
                classifier,
                &spec.name,
                &entries,
                cfg.pace,
            )
            .await;
        }
    }

    Some(entry)
}

/// The final "table of contents" message: one deep link per digest plus its
/// head entry, with the optional configured footer.
pub fn render_summary(stamp: &str, summary: &[RunSummaryEntry], cfg: &AppConfig) -> String {
    let channel = cfg.channel_id.trim_start_matches('@');
    let mut blocks = Vec::with_capacity(summary.len() + 2);
    blocks.push(match cfg.render_mode {
        RenderMode::Html => format!("Run of <b>{stamp} UTC</b>\n<b>- quick preview -</b>"),
        RenderMode::Markdown => format!("Run of *{stamp} UTC*\n*- quick preview -*"),
    });

    for entry in summary {
        let url = format!("https://t.me/{channel}/{}", entry.message_id);
        // The head entry always carries index 1; drop the numbering for the
        // preview line.
        let preview = entry
            .head_entry
            .rendered
            .strip_prefix("1. ")
            .unwrap_or(&entry.head_entry.rendered);
        blocks.push(match cfg.render_mode {
            RenderMode::Html => format!(
                "<b><a href=\"{url}\">☞ {}</a></b>\n\nTop: {preview}",
                escape_markup(&entry.source_name)
            ),
            RenderMode::Markdown => format!(
                "*[☞ {}]({url})*\n\nTop: {preview}",
                escape_markup(&entry.source_name)
            ),
        });
    }

    if let Some(footer) = &cfg.footer {
        blocks.push(footer.clone());
    }
    blocks.join("\n\n")
}
