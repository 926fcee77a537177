//! Terminal presentation of recorder events

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use stream_saver_core::{EventSink, RecorderEvent};
use tracing::{error, info, warn};

/// Logs recorder events through `tracing` and draws the offline countdown as
/// a single rewritten line on stderr.
pub struct ConsoleReporter {
    draw_countdown: bool,
    countdown_visible: AtomicBool,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            draw_countdown: std::io::stderr().is_terminal(),
            countdown_visible: AtomicBool::new(false),
        }
    }

    fn draw(&self, username: &str, remaining: u64) {
        if !self.draw_countdown {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r\x1b[2K{}", countdown_line(username, remaining));
        let _ = stderr.flush();
        self.countdown_visible.store(true, Ordering::Relaxed);
    }

    fn clear_countdown(&self) {
        if self.countdown_visible.swap(false, Ordering::Relaxed) {
            let mut stderr = std::io::stderr().lock();
            let _ = write!(stderr, "\r\x1b[2K");
            let _ = stderr.flush();
        }
    }
}

impl EventSink for ConsoleReporter {
    fn emit(&self, event: RecorderEvent) {
        if let RecorderEvent::Countdown { username, remaining } = &event {
            self.draw(username, *remaining);
            return;
        }
        self.clear_countdown();

        match event {
            RecorderEvent::CheckIntervalClamped { requested, effective } => {
                warn!(requested, effective, "Check interval too low, using {effective} seconds");
            }
            RecorderEvent::RecoveryStarted { count } => {
                info!(count, "Processing recordings left by a previous run");
            }
            RecorderEvent::RecoveryScanFailed { reason } => {
                warn!(%reason, "Could not scan for leftover recordings");
            }
            RecorderEvent::Watching {
                username,
                quality,
                interval,
            } => {
                info!(%username, %quality, interval, "Watching {username}");
            }
            RecorderEvent::Offline { username, interval } => {
                info!(%username, interval, "{username} is offline, checking again in {interval} seconds");
            }
            RecorderEvent::CheckFailed { retry_in } => {
                warn!(retry_in = %human(retry_in), "Status check failed, retrying");
            }
            RecorderEvent::Unauthorized { attempt } => {
                warn!(attempt, "Access token rejected, refreshing");
            }
            RecorderEvent::UnauthorizedBackoff { attempts, retry_in } => {
                warn!(attempts, retry_in = %human(retry_in), "Access token keeps being rejected, backing off");
            }
            RecorderEvent::TokenRefreshed => {
                info!("Access token refreshed");
            }
            RecorderEvent::TokenRefreshFailed { reason, retry_in } => {
                warn!(%reason, retry_in = %human(retry_in), "Token refresh failed, keeping the current token");
            }
            RecorderEvent::NotFound { username } => {
                error!(%username, "Broadcaster {username} does not exist");
            }
            RecorderEvent::Online { username, info } => {
                info!(
                    %username,
                    title = %info.title,
                    game = info.game_name.as_deref().unwrap_or(""),
                    started_at = info.started_at.as_deref().unwrap_or(""),
                    "{username} is live"
                );
            }
            RecorderEvent::RecordingStarted { path } => {
                info!(path = %path.display(), "Recording started");
            }
            RecorderEvent::CaptureFailed { reason } => {
                error!(%reason, "Could not record the stream");
            }
            RecorderEvent::RecordingFinished { duration, exit_code } => {
                info!(duration = %human(duration), exit_code = ?exit_code, "Recording finished");
            }
            RecorderEvent::OutputMissing { path } => {
                error!(path = %path.display(), "Recording produced no file");
            }
            RecorderEvent::ProcessingStarted { from, to, repair } => {
                info!(
                    from = %from.display(),
                    to = %to.display(),
                    repair,
                    "{} recording",
                    if repair { "Repairing" } else { "Moving" }
                );
            }
            RecorderEvent::FileMoved { to, .. } => {
                info!(path = %to.display(), "Recording moved");
            }
            RecorderEvent::FileRepaired { to, .. } => {
                info!(path = %to.display(), "Recording repaired");
            }
            RecorderEvent::ProcessingFailed { path, reason } => {
                error!(path = %path.display(), %reason, "Processing failed, raw file kept for the next run");
            }
            RecorderEvent::Resuming { interval } => {
                info!(interval, "Resuming checks in {interval} seconds");
            }
            RecorderEvent::Countdown { .. } => {}
        }
    }
}

fn countdown_line(username: &str, remaining: u64) -> String {
    format!("{username} is offline, next check in {remaining}s")
}

/// Whole seconds, humantime style ("1h 2m 3s")
fn human(duration: Duration) -> String {
    humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
}
