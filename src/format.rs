// src/format.rs
// Pure-ish rendering of a RankedItem into one display entry. The only I/O is
// the injected translation capability, and a translation failure always falls
// back to the original text so it can never stall the pipeline.

use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::types::{RankedItem, SourceKind};
use crate::translate::Translator;

/// Summaries longer than this get truncated...
pub const SUMMARY_LIMIT: usize = 150;
/// ...down to this many chars plus an ellipsis.
pub const SUMMARY_KEEP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Html,
    Markdown,
}

/// Derived 1:1 from a RankedItem; `index` is 1-based within its batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedEntry {
    pub index: usize,
    pub rendered: String,
}

/// Replace exactly `&`, `<`, `>` with entities. Everything else passes
/// through untouched. `&` first so already-produced entities stay intact.
pub fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn clean_summary(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re.replace_all(s, " ").trim().to_string()
}

fn truncate_summary(s: &str) -> String {
    if s.chars().count() > SUMMARY_LIMIT {
        let kept: String = s.chars().take(SUMMARY_KEEP).collect();
        format!("{kept}…")
    } else {
        s.to_string()
    }
}

pub struct Formatter<'a> {
    mode: RenderMode,
    kind: SourceKind,
    translator: &'a dyn Translator,
}

impl<'a> Formatter<'a> {
    pub fn new(mode: RenderMode, kind: SourceKind, translator: &'a dyn Translator) -> Self {
        Self {
            mode,
            kind,
            translator,
        }
    }

    /// Best-effort translate; on failure keep the original text.
    async fn translated(&self, text: &str) -> String {
        match self.translator.translate(text).await {
            Ok(t) if !t.is_empty() => t,
            Ok(_) => text.to_string(),
            Err(e) => {
                counter!("translation_failures_total").increment(1);
                tracing::warn!(error = %e, "translation failed, keeping original text");
                text.to_string()
            }
        }
    }

    pub async fn format_one(&self, index: usize, item: &RankedItem) -> FormattedEntry {
        let title = escape_markup(&self.translated(&item.title).await);

        // Rank/popularity suffix only applies to hot lists.
        let hot = match (self.kind, item.popularity.as_deref()) {
            (SourceKind::Hotlist, Some(p)) if !p.is_empty() => match self.mode {
                RenderMode::Html => format!("<i>{}🔥</i>", escape_markup(p)),
                RenderMode::Markdown => format!(" _{}🔥_", escape_markup(p)),
            },
            _ => String::new(),
        };

        // Translate first, then apply the length policy (the translated text
        // is what the reader sees, so it is what gets measured).
        let summary = match item.summary.as_deref() {
            Some(s) if !s.is_empty() => {
                let cleaned = clean_summary(&self.translated(s).await);
                format!("\n\n{}", escape_markup(&truncate_summary(&cleaned)))
            }
            _ => String::new(),
        };

        let rendered = match self.mode {
            RenderMode::Html => {
                format!("{index}. <a href=\"{}\">{title}</a>{hot}{summary}", item.url)
            }
            RenderMode::Markdown => {
                format!("{index}. [{title}]({}){hot}{summary}", item.url)
            }
        };

        FormattedEntry { index, rendered }
    }

    /// Renders a whole batch; indices are 1-based and gap-free.
    pub async fn format_batch(&self, items: &[RankedItem]) -> Vec<FormattedEntry> {
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            out.push(self.format_one(i + 1, item).await);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::NoTranslate;
    use anyhow::bail;

    fn item(title: &str, summary: Option<&str>, popularity: Option<&str>) -> RankedItem {
        RankedItem {
            title: title.to_string(),
            url: "https://example.test/a".to_string(),
            rank: Some(1),
            popularity: popularity.map(str::to_string),
            summary: summary.map(str::to_string),
        }
    }

    struct FailingTranslator;

    #[async_trait::async_trait]
    impl Translator for FailingTranslator {
        async fn translate(&self, _text: &str) -> anyhow::Result<String> {
            bail!("translation service down")
        }
    }

    struct UpperTranslator;

    #[async_trait::async_trait]
    impl Translator for UpperTranslator {
        async fn translate(&self, text: &str) -> anyhow::Result<String> {
            Ok(text.to_uppercase())
        }
    }

    #[test]
    fn escape_touches_only_the_three_markup_chars() {
        let raw = "a<b & c>d — ok 热搜";
        assert_eq!(escape_markup(raw), "a&lt;b &amp; c&gt;d — ok 热搜");
    }

    #[tokio::test]
    async fn indices_are_one_based_and_gap_free() {
        let items: Vec<RankedItem> = (0..7).map(|i| item(&format!("t{i}"), None, None)).collect();
        let fmt = Formatter::new(RenderMode::Html, SourceKind::Hotlist, &NoTranslate);
        let entries = fmt.format_batch(&items).await;
        let idx: Vec<usize> = entries.iter().map(|e| e.index).collect();
        assert_eq!(idx, (1..=7).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn long_summary_is_truncated_with_ellipsis() {
        let long = "x".repeat(SUMMARY_LIMIT + 1);
        let fmt = Formatter::new(RenderMode::Html, SourceKind::Hotlist, &NoTranslate);
        let e = fmt.format_one(1, &item("t", Some(&long), None)).await;
        let expected = format!("{}…", "x".repeat(SUMMARY_KEEP));
        assert!(e.rendered.ends_with(&expected));
        // Boundary: exactly at the limit stays whole.
        let edge = "好".repeat(SUMMARY_LIMIT);
        let e = fmt.format_one(1, &item("t", Some(&edge), None)).await;
        assert!(e.rendered.ends_with(&edge));
    }

    #[tokio::test]
    async fn popularity_suffix_only_for_hotlists() {
        let it = item("t", None, Some("999"));
        let hot = Formatter::new(RenderMode::Html, SourceKind::Hotlist, &NoTranslate);
        assert!(hot.format_one(1, &it).await.rendered.contains("<i>999🔥</i>"));
        let news = Formatter::new(RenderMode::Html, SourceKind::Headline, &NoTranslate);
        assert!(!news.format_one(1, &it).await.rendered.contains("🔥"));
    }

    #[tokio::test]
    async fn translation_failure_keeps_original_text() {
        let fmt = Formatter::new(RenderMode::Html, SourceKind::Headline, &FailingTranslator);
        let e = fmt.format_one(1, &item("Original", Some("untouched"), None)).await;
        assert!(e.rendered.contains("Original"));
        assert!(e.rendered.contains("untouched"));
    }

    #[tokio::test]
    async fn translation_applies_to_title_and_summary() {
        let fmt = Formatter::new(RenderMode::Html, SourceKind::Headline, &UpperTranslator);
        let e = fmt.format_one(1, &item("abc", Some("def"), None)).await;
        assert!(e.rendered.contains("ABC"));
        assert!(e.rendered.contains("DEF"));
    }

    #[tokio::test]
    async fn markdown_mode_renders_bracket_links() {
        let fmt = Formatter::new(RenderMode::Markdown, SourceKind::Hotlist, &NoTranslate);
        let e = fmt.format_one(3, &item("t", None, None)).await;
        assert_eq!(e.rendered, "3. [t](https://example.test/a)");
    }
}
