//! One online period: capture, then post-process

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use stream_saver_twitch::AccessToken;

use crate::events::{EventSink, RecorderEvent};
use crate::layout::DownloadLayout;
use crate::processor::{FileProcessor, ProcessOutcome};
use crate::status::StreamInfo;
use crate::tool::ExternalTool;

/// `YYYY-MM-DD-HHhMMmSSs`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%Hh%Mm%Ss";

/// Keep ASCII letters, digits, `-`, `_` and `.`; drop everything else.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}

/// `<username>-<timestamp>-<title>.<extension>`, sanitized
#[must_use]
pub fn build_filename(username: &str, at: &DateTime<Local>, title: &str, extension: &str) -> String {
    sanitize_filename(&format!(
        "{username}-{}-{title}.{extension}",
        at.format(TIMESTAMP_FORMAT)
    ))
}

/// `--twitch-oauth-token <token> twitch.tv/<username> <quality> -o <output>`
#[must_use]
pub fn capture_args(token: &AccessToken, username: &str, quality: &str, output: &Path) -> Vec<OsString> {
    vec![
        "--twitch-oauth-token".into(),
        token.as_str().into(),
        format!("twitch.tv/{username}").into(),
        quality.into(),
        "-o".into(),
        output.as_os_str().to_owned(),
    ]
}

/// Everything known about one recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingJob {
    pub username: String,
    pub quality: String,
    pub started_at: DateTime<Local>,
    pub recorded_path: PathBuf,
    pub processed_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Processed(ProcessOutcome),
    /// Post-processing failed, the raw file was kept
    ProcessingFailed(String),
    /// The capture tool left no file
    OutputMissing,
    /// The capture tool could not be started
    CaptureFailed(String),
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub job: RecordingJob,
    pub duration: Duration,
    pub outcome: SessionOutcome,
}

/// Static settings of a recording session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub username: String,
    pub quality: String,
    pub file_extension: String,
}

pub struct RecordingSession {
    settings: SessionSettings,
    layout: DownloadLayout,
    capture: Arc<dyn ExternalTool>,
    processor: FileProcessor,
}

impl RecordingSession {
    pub fn new(
        settings: SessionSettings,
        layout: DownloadLayout,
        capture: Arc<dyn ExternalTool>,
        processor: FileProcessor,
    ) -> Self {
        Self {
            settings,
            layout,
            capture,
            processor,
        }
    }

    #[must_use]
    pub const fn layout(&self) -> &DownloadLayout {
        &self.layout
    }

    #[must_use]
    pub const fn processor(&self) -> &FileProcessor {
        &self.processor
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Plan the file paths for a stream starting now
    #[must_use]
    pub fn plan(&self, info: &StreamInfo) -> RecordingJob {
        let started_at = Local::now();
        let filename = build_filename(
            &self.settings.username,
            &started_at,
            &info.title,
            &self.settings.file_extension,
        );
        RecordingJob {
            username: self.settings.username.clone(),
            quality: self.settings.quality.clone(),
            started_at,
            recorded_path: self.layout.recorded_path(&filename),
            processed_path: self.layout.processed_path(&filename),
        }
    }

    /// Record the live stream until the capture tool exits, then process the
    /// result. Never fails: every problem ends up in the returned outcome.
    pub async fn record(&self, info: &StreamInfo, token: &AccessToken, events: &dyn EventSink) -> SessionReport {
        let job = self.plan(info);
        let clock = Instant::now();

        events.emit(RecorderEvent::RecordingStarted {
            path: job.recorded_path.clone(),
        });

        let args = capture_args(token, &job.username, &job.quality, &job.recorded_path);
        let exit_code = match self.capture.run(&args).await {
            Ok(output) => output.exit_code,
            Err(e) => {
                let reason = e.to_string();
                events.emit(RecorderEvent::CaptureFailed { reason: reason.clone() });
                return SessionReport {
                    job,
                    duration: clock.elapsed(),
                    outcome: SessionOutcome::CaptureFailed(reason),
                };
            }
        };

        let duration = clock.elapsed();
        events.emit(RecorderEvent::RecordingFinished { duration, exit_code });

        if !tokio::fs::try_exists(&job.recorded_path).await.unwrap_or(false) {
            events.emit(RecorderEvent::OutputMissing {
                path: job.recorded_path.clone(),
            });
            return SessionReport {
                job,
                duration,
                outcome: SessionOutcome::OutputMissing,
            };
        }

        let outcome = match process_and_report(&self.processor, &job.recorded_path, &job.processed_path, events).await {
            Ok(done) => SessionOutcome::Processed(done),
            Err(reason) => SessionOutcome::ProcessingFailed(reason),
        };

        SessionReport { job, duration, outcome }
    }
}

/// Run `processor` and emit the matching events.
pub(crate) async fn process_and_report(
    processor: &FileProcessor,
    raw: &Path,
    processed: &Path,
    events: &dyn EventSink,
) -> Result<ProcessOutcome, String> {
    events.emit(RecorderEvent::ProcessingStarted {
        from: raw.to_path_buf(),
        to: processed.to_path_buf(),
        repair: processor.mode() == crate::processor::ProcessingMode::Repair,
    });

    match processor.process(raw, processed).await {
        Ok(outcome) => {
            let (from, to) = (raw.to_path_buf(), processed.to_path_buf());
            events.emit(match outcome {
                ProcessOutcome::Moved => RecorderEvent::FileMoved { from, to },
                ProcessOutcome::Repaired => RecorderEvent::FileRepaired { from, to },
            });
            Ok(outcome)
        }
        Err(e) => {
            let reason = e.to_string();
            events.emit(RecorderEvent::ProcessingFailed {
                path: raw.to_path_buf(),
                reason: reason.clone(),
            });
            Err(reason)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::events::CollectingSink;
    use crate::processor::tests::FakeRemux;
    use crate::processor::ProcessingMode;
    use crate::tool::ToolOutput;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    /// Capture stand-in writing `payload` to the `-o` path, if any.
    pub(crate) struct FakeCapture {
        pub payload: Option<Vec<u8>>,
        pub calls: Mutex<Vec<Vec<OsString>>>,
    }

    impl FakeCapture {
        pub(crate) fn writing(payload: &[u8]) -> Self {
            Self {
                payload: Some(payload.to_vec()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn silent() -> Self {
            Self {
                payload: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExternalTool for FakeCapture {
        fn name(&self) -> &str {
            "fake-streamlink"
        }

        async fn run(&self, args: &[OsString]) -> Result<ToolOutput> {
            self.calls.lock().push(args.to_vec());
            if let Some(payload) = &self.payload {
                std::fs::write(&args[args.len() - 1], payload)?;
            }
            Ok(ToolOutput {
                exit_code: Some(0),
                ..ToolOutput::default()
            })
        }
    }

    struct BrokenCapture;

    #[async_trait]
    impl ExternalTool for BrokenCapture {
        fn name(&self) -> &str {
            "missing-streamlink"
        }

        async fn run(&self, _args: &[OsString]) -> Result<ToolOutput> {
            Err(Error::Tool("failed to start streamlink: No such file or directory".to_string()))
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            username: "streamer".to_string(),
            quality: "720p60".to_string(),
            file_extension: "mp4".to_string(),
        }
    }

    async fn session_with(
        root: &Path,
        capture: Arc<dyn ExternalTool>,
        remux: Arc<dyn ExternalTool>,
        mode: ProcessingMode,
    ) -> RecordingSession {
        let layout = DownloadLayout::new(root, "streamer");
        layout.ensure().await.unwrap();
        RecordingSession::new(settings(), layout, capture, FileProcessor::new(mode, remux))
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a b/c:d*e?.mp4"), "abcde.mp4");
        assert_eq!(sanitize_filename("Ünïcode 🎮 title"), "ncodetitle");
        assert_eq!(sanitize_filename("keep-this_one.ts"), "keep-this_one.ts");
    }

    #[test]
    fn test_sanitize_filename_idempotent_and_restricted() {
        let samples = [
            "",
            "plain",
            "../../etc/passwd",
            "!!! HYPE !!! day 3 | road to 1000 <3",
            "日本語のタイトル",
            "tab\tnew\nline\r",
            "C:\\Windows\\system32",
            "emoji 🚀🚀 and dots...",
        ];
        for sample in samples {
            let once = sanitize_filename(sample);
            assert_eq!(sanitize_filename(&once), once, "not idempotent for {sample:?}");
            assert!(
                once.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')),
                "unexpected character in {once:?}"
            );
        }
    }

    #[test]
    fn test_build_filename() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        let name = build_filename("streamer", &at, "Day 3: speedrun! (any%)", "mp4");
        assert_eq!(name, "streamer-2024-03-09-07h05m02s-Day3speedrunany.mp4");
    }

    #[test]
    fn test_capture_args() {
        let args = capture_args(
            &AccessToken::new("tok"),
            "streamer",
            "best",
            Path::new("/rec/streamer/file.mp4"),
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["--twitch-oauth-token", "tok", "twitch.tv/streamer", "best", "-o", "/rec/streamer/file.mp4"]
        );
    }

    #[tokio::test]
    async fn test_plan_uses_layout() {
        let temp_dir = tempdir().unwrap();
        let session = session_with(
            temp_dir.path(),
            Arc::new(FakeCapture::silent()),
            Arc::new(FakeRemux::new(true)),
            ProcessingMode::Repair,
        )
        .await;

        let job = session.plan(&StreamInfo::with_title("hello world"));
        assert_eq!(job.username, "streamer");
        assert_eq!(job.quality, "720p60");
        assert_eq!(job.recorded_path.parent(), Some(session.layout().recorded_dir()));
        assert_eq!(job.processed_path.parent(), Some(session.layout().processed_dir()));
        assert_eq!(job.recorded_path.file_name(), job.processed_path.file_name());
        let name = job.recorded_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("streamer-"));
        assert!(name.ends_with("-helloworld.mp4"));
    }

    #[tokio::test]
    async fn test_record_then_repair() {
        let temp_dir = tempdir().unwrap();
        let capture = Arc::new(FakeCapture::writing(b"captured"));
        let session = session_with(
            temp_dir.path(),
            capture.clone(),
            Arc::new(FakeRemux::new(true)),
            ProcessingMode::Repair,
        )
        .await;
        let sink = CollectingSink::new();

        let report = session
            .record(&StreamInfo::with_title("live now"), &AccessToken::new("tok"), &sink)
            .await;

        assert_eq!(report.outcome, SessionOutcome::Processed(ProcessOutcome::Repaired));
        assert!(!report.job.recorded_path.exists());
        assert_eq!(std::fs::read(&report.job.processed_path).unwrap(), b"captured");

        let calls = capture.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][1], OsString::from("tok"));
        assert_eq!(calls[0][5], report.job.recorded_path.as_os_str());

        assert_eq!(sink.count(|e| matches!(e, RecorderEvent::RecordingStarted { .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, RecorderEvent::RecordingFinished { .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, RecorderEvent::FileRepaired { .. })), 1);
    }

    #[tokio::test]
    async fn test_record_missing_output() {
        let temp_dir = tempdir().unwrap();
        let remux = Arc::new(FakeRemux::new(true));
        let session = session_with(
            temp_dir.path(),
            Arc::new(FakeCapture::silent()),
            remux.clone(),
            ProcessingMode::Repair,
        )
        .await;
        let sink = CollectingSink::new();

        let report = session
            .record(&StreamInfo::with_title("t"), &AccessToken::new("tok"), &sink)
            .await;

        assert_eq!(report.outcome, SessionOutcome::OutputMissing);
        assert_eq!(remux.runs(), 0);
        assert_eq!(sink.count(|e| matches!(e, RecorderEvent::OutputMissing { .. })), 1);
    }

    #[tokio::test]
    async fn test_record_capture_cannot_start() {
        let temp_dir = tempdir().unwrap();
        let session = session_with(
            temp_dir.path(),
            Arc::new(BrokenCapture),
            Arc::new(FakeRemux::new(true)),
            ProcessingMode::Repair,
        )
        .await;
        let sink = CollectingSink::new();

        let report = session
            .record(&StreamInfo::with_title("t"), &AccessToken::new("tok"), &sink)
            .await;

        assert!(matches!(report.outcome, SessionOutcome::CaptureFailed(_)));
        assert_eq!(sink.count(|e| matches!(e, RecorderEvent::CaptureFailed { .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, RecorderEvent::RecordingFinished { .. })), 0);
    }

    #[tokio::test]
    async fn test_record_repair_failure_keeps_raw() {
        let temp_dir = tempdir().unwrap();
        let session = session_with(
            temp_dir.path(),
            Arc::new(FakeCapture::writing(b"captured")),
            Arc::new(FakeRemux::new(false)),
            ProcessingMode::Repair,
        )
        .await;
        let sink = CollectingSink::new();

        let report = session
            .record(&StreamInfo::with_title("t"), &AccessToken::new("tok"), &sink)
            .await;

        assert!(matches!(report.outcome, SessionOutcome::ProcessingFailed(_)));
        assert!(report.job.recorded_path.exists());
        assert!(!report.job.processed_path.exists());
        assert_eq!(sink.count(|e| matches!(e, RecorderEvent::ProcessingFailed { .. })), 1);
    }

    #[tokio::test]
    async fn test_record_fast_mode_moves() {
        let temp_dir = tempdir().unwrap();
        let remux = Arc::new(FakeRemux::new(true));
        let session = session_with(
            temp_dir.path(),
            Arc::new(FakeCapture::writing(b"captured")),
            remux.clone(),
            ProcessingMode::Move,
        )
        .await;

        let report = session
            .record(&StreamInfo::with_title("t"), &AccessToken::new("tok"), &CollectingSink::new())
            .await;

        assert_eq!(report.outcome, SessionOutcome::Processed(ProcessOutcome::Moved));
        assert_eq!(remux.runs(), 0);
        assert_eq!(std::fs::read(&report.job.processed_path).unwrap(), b"captured");
    }
}
