// src/locate.rs
// Forward Locator: bridges the eventually-consistent link between a channel
// post and its auto-forwarded copy in the discussion group. Explicit
// Polling -> Found | TimedOut state machine over a bounded, paced poll of the
// event feed. TimedOut is an accepted outcome, never an error.

use std::time::Duration;

use metrics::counter;

use crate::transport::{ChannelTransport, ChatEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateOutcome {
    Found { group_message_id: i64 },
    TimedOut,
}

#[derive(Debug, Clone, Copy)]
pub struct LocatorConfig {
    /// How many polling rounds before giving up.
    pub max_rounds: u32,
    /// Pause between rounds; also the rate-limit pacing on getUpdates.
    pub poll_pace: Duration,
    /// Grace period before the first poll, giving the surface time to mirror
    /// the broadcast post at all.
    pub settle_delay: Duration,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            max_rounds: 6,
            poll_pace: Duration::from_secs(2),
            settle_delay: Duration::from_secs(4),
        }
    }
}

/// Scan one polled batch in arrival order. Advances `offset` past every event
/// it consumes; stops at the first event that (a) belongs to `group_id`,
/// (b) is an automatic forward, and (c) is newer than `sent_after`. First
/// match wins even if later events in the batch would also match.
pub(crate) fn scan_batch(
    events: &[ChatEvent],
    group_id: &str,
    sent_after: f64,
    offset: &mut i64,
) -> Option<i64> {
    for ev in events {
        *offset = ev.update_id + 1;
        if ev.destination == group_id
            && ev.is_automatic_forward
            && ev.timestamp_epoch > sent_after
        {
            return Some(ev.message_id);
        }
    }
    None
}

/// Poll the discussion surface for the automatic forward of a message sent at
/// `sent_after`. The caller owns the cursor implicitly: never run two
/// locators concurrently against the same feed, matching would race.
pub async fn locate_forward(
    transport: &dyn ChannelTransport,
    group_id: &str,
    sent_after: f64,
    cfg: &LocatorConfig,
) -> LocateOutcome {
    tokio::time::sleep(cfg.settle_delay).await;

    let mut offset: i64 = 0;
    for round in 1..=cfg.max_rounds {
        let events = match transport.poll_events(offset).await {
            Ok(events) => events,
            Err(e) => {
                // A failed poll burns the round but not the run.
                tracing::warn!(error = %e, round, "event poll failed");
                Vec::new()
            }
        };

        if let Some(group_message_id) = scan_batch(&events, group_id, sent_after, &mut offset) {
            counter!("forward_found_total").increment(1);
            tracing::debug!(round, group_message_id, "forward located");
            return LocateOutcome::Found { group_message_id };
        }

        if round < cfg.max_rounds {
            tokio::time::sleep(cfg.poll_pace).await;
        }
    }

    counter!("forward_timeout_total").increment(1);
    tracing::info!(group = %group_id, "no auto-forward found within budget");
    LocateOutcome::TimedOut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(update_id: i64, dest: &str, message_id: i64, ts: f64, fwd: bool) -> ChatEvent {
        ChatEvent {
            update_id,
            destination: dest.to_string(),
            message_id,
            timestamp_epoch: ts,
            is_automatic_forward: fwd,
        }
    }

    #[test]
    fn first_match_wins_within_a_batch() {
        let batch = vec![
            ev(10, "-100", 1, 50.0, true),  // too old
            ev(11, "-200", 2, 99.0, true),  // wrong group
            ev(12, "-100", 3, 99.0, false), // not a forward
            ev(13, "-100", 4, 99.0, true),  // first real match
            ev(14, "-100", 5, 99.5, true),  // also matches, must be ignored
        ];
        let mut offset = 0;
        let hit = scan_batch(&batch, "-100", 90.0, &mut offset);
        assert_eq!(hit, Some(4));
        // Cursor advanced past the match, not past the unconsumed tail.
        assert_eq!(offset, 14);
    }

    #[test]
    fn offset_advances_past_every_consumed_event_without_match() {
        let batch = vec![
            ev(7, "", 0, 0.0, false), // non-message update
            ev(8, "-100", 2, 10.0, false),
        ];
        let mut offset = 0;
        assert_eq!(scan_batch(&batch, "-100", 90.0, &mut offset), None);
        assert_eq!(offset, 9);
    }

    #[test]
    fn timestamp_must_be_strictly_newer() {
        let batch = vec![ev(1, "-100", 9, 90.0, true)];
        let mut offset = 0;
        assert_eq!(scan_batch(&batch, "-100", 90.0, &mut offset), None);
    }
}
