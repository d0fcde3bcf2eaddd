// src/overflow.rs
// Overflow Dispatcher: everything past the head batch gets threaded as
// replies under the located forward. Each batch send is independent and
// best-effort; one failed batch never aborts the rest.

use std::time::Duration;

use metrics::counter;

use crate::format::FormattedEntry;
use crate::transport::ChannelTransport;

#[derive(Debug, Clone, Copy)]
pub struct OverflowConfig {
    pub head_size: usize,
    pub batch_size: usize,
    /// Pause between reply sends.
    pub pace: Duration,
}

/// Contiguous fixed-size slices of `entries[head_size..]`, in rank order.
pub fn batches(
    entries: &[FormattedEntry],
    head_size: usize,
    batch_size: usize,
) -> Vec<&[FormattedEntry]> {
    if entries.len() <= head_size || batch_size == 0 {
        return Vec::new();
    }
    entries[head_size..].chunks(batch_size).collect()
}

/// Sends overflow batches as replies to `forward_id`. Returns how many
/// batches went out. With no forward reference this is a logged no-op: the
/// overflow for this source is dropped for this run.
pub async fn dispatch_overflow(
    transport: &dyn ChannelTransport,
    group_id: &str,
    forward_id: Option<i64>,
    entries: &[FormattedEntry],
    cfg: &OverflowConfig,
) -> usize {
    let Some(reply_to) = forward_id else {
        if entries.len() > cfg.head_size {
            counter!("overflow_dropped_total").increment(1);
            tracing::info!(
                dropped_entries = entries.len() - cfg.head_size,
                "no forward reference, dropping overflow"
            );
        }
        return 0;
    };

    let mut sent = 0usize;
    for batch in batches(entries, cfg.head_size, cfg.batch_size) {
        let text: Vec<&str> = batch.iter().map(|e| e.rendered.as_str()).collect();
        match transport
            .send_message(group_id, &text.join("\n\n"), Some(reply_to))
            .await
        {
            Ok(_) => {
                sent += 1;
                counter!("overflow_batches_sent_total").increment(1);
            }
            Err(e) => {
                counter!("overflow_batch_errors_total").increment(1);
                tracing::warn!(error = %e, "overflow batch send failed, continuing");
            }
        }
        tokio::time::sleep(cfg.pace).await;
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(n: usize) -> Vec<FormattedEntry> {
        (1..=n)
            .map(|i| FormattedEntry {
                index: i,
                rendered: format!("{i}. item"),
            })
            .collect()
    }

    #[test]
    fn partitions_into_ceil_batches_with_partial_tail() {
        let all = entries(12);
        let got = batches(&all, 5, 5);
        assert_eq!(got.len(), 2); // ceil((12-5)/5)
        assert_eq!(got[0].len(), 5);
        assert_eq!(got[1].len(), 2);
        assert_eq!(got[0][0].index, 6);
        assert_eq!(got[1][1].index, 12);
    }

    #[test]
    fn exact_multiple_has_no_partial_tail() {
        let all = entries(25);
        let got = batches(&all, 5, 10);
        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|b| b.len() == 10));
    }

    #[test]
    fn head_only_list_yields_no_batches() {
        let all = entries(5);
        assert!(batches(&all, 5, 5).is_empty());
        assert!(batches(&entries(3), 5, 5).is_empty());
    }
}
