//! Recorder events
//!
//! The poll loop and recording session report what they do as
//! [`RecorderEvent`] values through an [`EventSink`]. They never write to the
//! console themselves; rendering is the sink's job.

use std::path::PathBuf;
use std::time::Duration;

use parking_lot::Mutex;

use crate::status::StreamInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// The configured check interval was below the minimum
    CheckIntervalClamped { requested: u64, effective: u64 },
    /// Leftover raw files found at startup
    RecoveryStarted { count: usize },
    /// The recorded directory could not be scanned
    RecoveryScanFailed { reason: String },
    /// Polling begins
    Watching { username: String, quality: String, interval: u64 },
    /// Streamer offline, a countdown of `interval` seconds follows
    Offline { username: String, interval: u64 },
    /// Seconds left in the current offline countdown
    Countdown { username: String, remaining: u64 },
    /// Status check failed transiently
    CheckFailed { retry_in: Duration },
    /// Status check answered 401
    Unauthorized { attempt: u32 },
    /// Too many 401s in a row, the next refresh waits `retry_in`
    UnauthorizedBackoff { attempts: u32, retry_in: Duration },
    TokenRefreshed,
    /// Token endpoint unreachable, the current token is kept
    TokenRefreshFailed { reason: String, retry_in: Duration },
    /// Streamer unknown to the platform, the loop stops
    NotFound { username: String },
    /// Streamer went live
    Online { username: String, info: StreamInfo },
    RecordingStarted { path: PathBuf },
    /// Capture tool could not be started or crashed
    CaptureFailed { reason: String },
    RecordingFinished { duration: Duration, exit_code: Option<i32> },
    /// Capture tool exited without leaving a file behind
    OutputMissing { path: PathBuf },
    ProcessingStarted { from: PathBuf, to: PathBuf, repair: bool },
    FileMoved { from: PathBuf, to: PathBuf },
    FileRepaired { from: PathBuf, to: PathBuf },
    /// Raw file kept in place for the next run
    ProcessingFailed { path: PathBuf, reason: String },
    /// Recording handled, polling resumes after `interval` seconds
    Resuming { interval: u64 },
}

/// Receiver of recorder events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RecorderEvent);
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<RecorderEvent>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    #[must_use]
    pub fn events(&self) -> Vec<RecorderEvent> {
        self.events.lock().clone()
    }

    /// Number of received events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&RecorderEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: RecorderEvent) {
        self.events.lock().push(event);
    }
}
