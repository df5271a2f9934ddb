//! Ingestion of the chunked, line-delimited invocation stream.
//!
//! The stream is a latency optimization, not the source of truth: a read
//! error or premature close ends ingestion without failing any item, because
//! the server keeps processing whether or not the client is still attached.
//! The change feed remains the authority for final statuses.

use std::io;
use std::sync::Arc;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use crate::enrich::store::JobItemStore;
use crate::enrich::types::{ItemStatus, ItemUpdate, JobSummary, StreamEvent};

/// Chunked response body of the batch-invocation call.
pub type ByteStream = BoxStream<'static, io::Result<Vec<u8>>>;

/// Accumulates raw chunks and yields complete lines.
///
/// Chunk boundaries carry no meaning: a frame may span several chunks and a
/// chunk may carry several frames. The partial tail is kept across pushes.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let rest = self.buf.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buf, rest);
            line.pop(); // the '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Returns the unterminated tail, if any. Call once at end of stream.
    pub fn finish(self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            let mut line = self.buf;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            Some(String::from_utf8_lossy(&line).into_owned())
        }
    }
}

/// What an ingestion run observed, for the caller's final notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Decoded events applied to the store (including the complete event).
    pub events_applied: usize,
    /// `data:` frames whose payload failed to decode and were skipped.
    pub payloads_skipped: usize,
    /// Whether the job-level `complete` event was seen before the stream ended.
    pub saw_complete: bool,
    /// Summary carried by the `complete` event, when present.
    pub summary: Option<JobSummary>,
}

/// Decodes `data: <json>` frames and feeds them into the store.
pub struct StreamIngester {
    store: Arc<JobItemStore>,
}

impl StreamIngester {
    pub fn new(store: Arc<JobItemStore>) -> Self {
        Self { store }
    }

    /// Consumes the stream to its end (or first read error) and applies
    /// every decodable event. Never fails: transport problems degrade to an
    /// early return, leaving the change feed as the fallback authority.
    pub async fn run(&self, mut body: ByteStream) -> StreamOutcome {
        let mut framer = LineFramer::new();
        let mut outcome = StreamOutcome::default();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for line in framer.push(&bytes) {
                        self.handle_line(&line, &mut outcome);
                    }
                    // The complete event is the last meaningful frame.
                    if outcome.saw_complete {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!(
                        "Enrichment stream read failed, deferring to change feed: {}",
                        e
                    );
                    return outcome;
                }
            }
        }

        if let Some(tail) = framer.finish() {
            self.handle_line(&tail, &mut outcome);
        }

        log::info!(
            "Enrichment stream ended: {} events applied, {} payloads skipped, complete={}",
            outcome.events_applied,
            outcome.payloads_skipped,
            outcome.saw_complete
        );
        outcome
    }

    fn handle_line(&self, line: &str, outcome: &mut StreamOutcome) {
        // Non-conforming lines (keep-alives, blanks) are ignored.
        let Some(payload) = line.strip_prefix("data:") else {
            return;
        };
        let payload = payload.trim();
        if payload.is_empty() {
            return;
        }

        match serde_json::from_str::<StreamEvent>(payload) {
            Ok(event) => {
                self.apply_event(event, outcome);
                outcome.events_applied += 1;
            }
            Err(e) => {
                outcome.payloads_skipped += 1;
                log::warn!("Skipping malformed stream payload: {}", e);
            }
        }
    }

    fn apply_event(&self, event: StreamEvent, outcome: &mut StreamOutcome) {
        match event {
            StreamEvent::Progress {
                prospect_id,
                domain,
            } => {
                self.store.apply(ItemUpdate {
                    item_id: prospect_id,
                    domain,
                    status: Some(ItemStatus::Processing),
                    ..Default::default()
                });
            }
            StreamEvent::Success {
                prospect_id,
                domain,
                contacts_found,
                has_emails,
            } => {
                self.store.apply(ItemUpdate {
                    item_id: prospect_id,
                    domain,
                    status: Some(ItemStatus::Success),
                    contacts_found: contacts_found.or(Some(0)),
                    has_emails: has_emails.or(Some(false)),
                    ..Default::default()
                });
            }
            StreamEvent::Error {
                prospect_id,
                domain,
                error,
                rate_limited,
            } => {
                let status = if rate_limited {
                    ItemStatus::RateLimited
                } else {
                    ItemStatus::Failed
                };
                self.store.apply(ItemUpdate {
                    item_id: prospect_id,
                    domain,
                    status: Some(status),
                    error,
                    ..Default::default()
                });
            }
            StreamEvent::Complete { summary } => {
                outcome.saw_complete = true;
                outcome.summary = summary;
            }
        }
    }
}
