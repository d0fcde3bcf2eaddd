// tests/common/mod.rs
// Shared test doubles: a scripted transport that records every send and
// replays canned event-feed batches, and a canned upstream.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use hotlist_digest::error::{DigestError, DigestResult};
use hotlist_digest::ingest::types::{RankedItem, RankedSource, SourceSpec};
use hotlist_digest::transport::{ChannelTransport, ChatEvent, MessageHandle};

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub destination: String,
    pub text: String,
    pub reply_to: Option<i64>,
}

pub struct ScriptedTransport {
    pub sent: Mutex<Vec<SentMessage>>,
    pub pins: Mutex<Vec<(String, i64)>>,
    pub poll_offsets: Mutex<Vec<i64>>,
    batches: Mutex<VecDeque<Vec<ChatEvent>>>,
    next_id: AtomicI64,
    epoch: f64,
    fail_destination: Option<String>,
    fail_send_numbers: Vec<i64>,
}

impl ScriptedTransport {
    pub fn new(epoch: f64) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            pins: Mutex::new(Vec::new()),
            poll_offsets: Mutex::new(Vec::new()),
            batches: Mutex::new(VecDeque::new()),
            next_id: AtomicI64::new(1),
            epoch,
            fail_destination: None,
            fail_send_numbers: Vec::new(),
        }
    }

    /// Every send to this destination fails.
    pub fn failing_destination(mut self, destination: &str) -> Self {
        self.fail_destination = Some(destination.to_string());
        self
    }

    /// Fail the nth send call (1-based, counted across all destinations).
    pub fn failing_send_number(mut self, n: i64) -> Self {
        self.fail_send_numbers.push(n);
        self
    }

    /// Queue one poll round's worth of events.
    pub fn push_batch(&self, batch: Vec<ChatEvent>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn sent_to(&self, destination: &str) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.destination == destination)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl ChannelTransport for ScriptedTransport {
    async fn send_message(
        &self,
        destination: &str,
        text: &str,
        reply_to: Option<i64>,
    ) -> DigestResult<MessageHandle> {
        if self.fail_destination.as_deref() == Some(destination) {
            return Err(DigestError::Publish(format!("scripted failure for {destination}")));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if self.fail_send_numbers.contains(&id) {
            return Err(DigestError::Publish(format!("scripted failure for send #{id}")));
        }
        self.sent.lock().unwrap().push(SentMessage {
            destination: destination.to_string(),
            text: text.to_string(),
            reply_to,
        });
        Ok(MessageHandle {
            id,
            destination: destination.to_string(),
            sent_at_epoch: self.epoch,
        })
    }

    async fn pin_message(&self, destination: &str, message_id: i64) -> DigestResult<()> {
        self.pins
            .lock()
            .unwrap()
            .push((destination.to_string(), message_id));
        Ok(())
    }

    async fn poll_events(&self, offset: i64) -> DigestResult<Vec<ChatEvent>> {
        self.poll_offsets.lock().unwrap().push(offset);
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }
}

pub fn forward_event(update_id: i64, group: &str, message_id: i64, ts: f64) -> ChatEvent {
    ChatEvent {
        update_id,
        destination: group.to_string(),
        message_id,
        timestamp_epoch: ts,
        is_automatic_forward: true,
    }
}

/// Canned upstream keyed by source name; unknown names yield empty batches,
/// mirroring the adapter's skip-on-failure contract.
pub struct CannedUpstream {
    items: HashMap<String, Vec<RankedItem>>,
}

impl CannedUpstream {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    pub fn with_items(mut self, source_name: &str, items: Vec<RankedItem>) -> Self {
        self.items.insert(source_name.to_string(), items);
        self
    }
}

#[async_trait::async_trait]
impl RankedSource for CannedUpstream {
    async fn fetch_ranked(&self, spec: &SourceSpec) -> Vec<RankedItem> {
        self.items.get(&spec.name).cloned().unwrap_or_default()
    }
}

pub fn ranked_items(n: usize) -> Vec<RankedItem> {
    (1..=n)
        .map(|i| RankedItem {
            title: format!("story {i}"),
            url: format!("https://example.test/{i}"),
            rank: Some(i as u32),
            popularity: None,
            summary: None,
        })
        .collect()
}
