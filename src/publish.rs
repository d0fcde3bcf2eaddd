// src/publish.rs
// Digest Publisher: one broadcast message carrying the head of the ranked
// list. The returned handle anchors forward discovery for this source.

use metrics::counter;

use crate::error::{DigestError, DigestResult};
use crate::format::{escape_markup, FormattedEntry, RenderMode};
use crate::transport::ChannelTransport;

/// Handle for one successfully published head digest. Lives only within one
/// orchestration run.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedDigest {
    pub destination: String,
    pub message_id: i64,
    pub sent_at_epoch: f64,
    pub source_name: String,
    pub head_entry: FormattedEntry,
}

pub fn render_digest(
    source_name: &str,
    entries: &[FormattedEntry],
    head_size: usize,
    mode: RenderMode,
) -> String {
    let head: Vec<&str> = entries
        .iter()
        .take(head_size)
        .map(|e| e.rendered.as_str())
        .collect();
    let header = match mode {
        RenderMode::Html => format!("<b>{}</b>", escape_markup(source_name)),
        RenderMode::Markdown => format!("*{}*", escape_markup(source_name)),
    };
    format!("{header}\n{}", head.join("\n\n"))
}

pub async fn publish_digest(
    transport: &dyn ChannelTransport,
    channel_id: &str,
    source_name: &str,
    entries: &[FormattedEntry],
    head_size: usize,
    mode: RenderMode,
) -> DigestResult<PublishedDigest> {
    let Some(head_entry) = entries.first().cloned() else {
        return Err(DigestError::EmptyDigest(source_name.to_string()));
    };

    let text = render_digest(source_name, entries, head_size, mode);
    let handle = transport.send_message(channel_id, &text, None).await?;
    counter!("digest_published_total").increment(1);
    tracing::info!(
        source = %source_name,
        message_id = handle.id,
        "digest published"
    );

    Ok(PublishedDigest {
        destination: handle.destination,
        message_id: handle.id,
        sent_at_epoch: handle.sent_at_epoch,
        source_name: source_name.to_string(),
        head_entry,
    })
}
