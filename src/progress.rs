//! Progress and completion reporting for scan sessions
//!
//! The orchestrator reports through a [`ScanSink`]: one [`ScanProgress`] per
//! processed file in increasing order, then exactly one terminal result.
//! This module provides a channel-backed sink for embedding applications and
//! a reporter that writes JSON lines to stderr for the CLI.

use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::ScanError;
use crate::models::{ScanProgress, ScanSummary};

/// Destination for scan progress and the terminal scan result
pub trait ScanSink: Send + Sync {
    /// Called once at session start, after enumeration
    fn on_start(&self, _library_root: &Path, _total: u64) {}

    fn on_progress(&self, progress: &ScanProgress);

    fn on_complete(&self, result: &Result<ScanSummary, ScanError>);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ScanSink for NullSink {
    fn on_progress(&self, _progress: &ScanProgress) {}

    fn on_complete(&self, _result: &Result<ScanSummary, ScanError>) {}
}

/// Events delivered by [`ChannelSink`]
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Progress(ScanProgress),
    Completed(ScanSummary),
    Failed(ScanError),
}

/// Forwards scan events over a crossbeam channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<ScanEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<ScanEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink with an unbounded channel and return its receiver
    pub fn unbounded() -> (Self, Receiver<ScanEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    fn send(&self, event: ScanEvent) {
        // Receiver may be gone; the scan still runs to completion
        if self.tx.send(event).is_err() {
            log::debug!("Scan event receiver dropped");
        }
    }
}

impl ScanSink for ChannelSink {
    fn on_progress(&self, progress: &ScanProgress) {
        self.send(ScanEvent::Progress(*progress));
    }

    fn on_complete(&self, result: &Result<ScanSummary, ScanError>) {
        match result {
            Ok(summary) => self.send(ScanEvent::Completed(*summary)),
            Err(e) => self.send(ScanEvent::Failed(e.clone())),
        }
    }
}

/// Delivers to several sinks in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ScanSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ScanSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl ScanSink for FanoutSink {
    fn on_start(&self, library_root: &Path, total: u64) {
        for sink in &self.sinks {
            sink.on_start(library_root, total);
        }
    }

    fn on_progress(&self, progress: &ScanProgress) {
        for sink in &self.sinks {
            sink.on_progress(progress);
        }
    }

    fn on_complete(&self, result: &Result<ScanSummary, ScanError>) {
        for sink in &self.sinks {
            sink.on_complete(result);
        }
    }
}

/// Start message sent when the process phase begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    /// Message type identifier
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Library root being scanned
    pub root: String,
    /// Number of supported files enumerated
    pub total: u64,
}

impl StartMessage {
    pub fn new(seq: u64, ts: u64, root: String, total: u64) -> Self {
        Self {
            msg_type: "start",
            seq,
            ts,
            root,
            total,
        }
    }
}

/// Progress message sent during the process phase
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// 1-based index of the last processed file
    #[serde(rename = "c")]
    pub current: u64,
    /// Number of files to process
    #[serde(rename = "n")]
    pub total: u64,
}

impl ProgressMessage {
    pub fn new(seq: u64, ts: u64, current: u64, total: u64) -> Self {
        Self {
            msg_type: "p",
            seq,
            ts,
            current,
            total,
        }
    }
}

/// Error message sent when a session fails
#[derive(Debug, Clone, Serialize)]
pub struct ErrorProgressMessage {
    /// Message type identifier ("err" for error)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Error type/category
    pub error_type: String,
    /// Error message description
    pub message: String,
    /// Path that caused the error (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorProgressMessage {
    pub fn from_error(seq: u64, ts: u64, error: &ScanError) -> Self {
        Self {
            msg_type: "err",
            seq,
            ts,
            error_type: format!("{:?}", error.kind),
            message: error.message.clone(),
            path: error.path.as_ref().map(|p| p.to_string_lossy().to_string()),
        }
    }
}

/// Done message sent when a session completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Records added
    #[serde(rename = "a")]
    pub added: u64,
    /// Records updated
    #[serde(rename = "u")]
    pub updated: u64,
    /// Records removed
    #[serde(rename = "r")]
    pub removed: u64,
    /// Records in the catalog after the scan
    #[serde(rename = "t")]
    pub total: u64,
}

impl DoneMessage {
    pub fn new(seq: u64, ts: u64, summary: &ScanSummary) -> Self {
        Self {
            msg_type: "done",
            seq,
            ts,
            added: summary.added,
            updated: summary.updated,
            removed: summary.removed,
            total: summary.total,
        }
    }
}

/// Progress reporter for outputting scan progress to stderr
///
/// Progress lines are throttled to one per `interval_ms`, except the line for
/// the final file which is always written.
pub struct ProgressReporter {
    /// Whether progress reporting is enabled
    enabled: bool,
    /// Reporting interval in milliseconds
    interval_ms: u64,
    /// Last report time, `None` before the first progress line
    last_report: Mutex<Option<Instant>>,
    /// Sequence number for messages
    seq: AtomicU64,
    /// Start time of the reporter
    start_time: Instant,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.enabled)
            .field("interval_ms", &self.interval_ms)
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    /// Create a new ProgressReporter
    ///
    /// # Arguments
    /// * `enabled` - Whether progress reporting is enabled
    /// * `interval_ms` - Minimum interval between progress messages in milliseconds
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        Self {
            enabled,
            interval_ms,
            last_report: Mutex::new(None),
            seq: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Check if enough time has passed since the last report
    pub fn should_report(&self) -> bool {
        if !self.enabled {
            return false;
        }
        match *self.last_report.lock() {
            Some(last) => last.elapsed().as_millis() as u64 >= self.interval_ms,
            None => true,
        }
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the current timestamp in milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Output a serializable message to stderr as JSON
    fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            let mut stderr = std::io::stderr().lock();
            writeln!(stderr, "{}", json).ok();
            stderr.flush().ok();
        }
    }

    /// Check if the reporter is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl ScanSink for ProgressReporter {
    fn on_start(&self, library_root: &Path, total: u64) {
        if !self.enabled {
            return;
        }
        let msg = StartMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            library_root.to_string_lossy().to_string(),
            total,
        );
        self.output_to_stderr(&msg);
    }

    fn on_progress(&self, progress: &ScanProgress) {
        let is_last = progress.current >= progress.total;
        if !self.enabled || (!is_last && !self.should_report()) {
            return;
        }

        let msg = ProgressMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            progress.current,
            progress.total,
        );
        self.output_to_stderr(&msg);
        *self.last_report.lock() = Some(Instant::now());
    }

    fn on_complete(&self, result: &Result<ScanSummary, ScanError>) {
        if !self.enabled {
            return;
        }
        match result {
            Ok(summary) => {
                let msg = DoneMessage::new(self.next_seq(), self.current_timestamp(), summary);
                self.output_to_stderr(&msg);
            }
            Err(error) => {
                let msg =
                    ErrorProgressMessage::from_error(self.next_seq(), self.current_timestamp(), error);
                self.output_to_stderr(&msg);
            }
        }
    }
}
