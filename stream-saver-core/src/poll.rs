//! The recorder state machine
//!
//! One status check per iteration, then a transition:
//!
//! | status         | next step                                         |
//! |----------------|---------------------------------------------------|
//! | Offline        | countdown of `check_interval` seconds              |
//! | Online         | record, process, sleep `check_interval`            |
//! | Unauthorized   | refresh the token, re-check immediately            |
//! |                | (after [`ERROR_RETRY_DELAY`] once the streak hits  |
//! |                | [`MAX_CONSECUTIVE_UNAUTHORIZED`])                  |
//! | TransientError | sleep [`ERROR_RETRY_DELAY`]                        |
//! | NotFound       | stop with [`Error::StreamerNotFound`]              |

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::events::{EventSink, RecorderEvent};
use crate::session::{process_and_report, RecordingSession};
use crate::status::{StatusChecker, StreamStatus};
use crate::token::TokenStore;

/// Lowest accepted check interval, in seconds
pub const MIN_CHECK_INTERVAL_SECS: u64 = 15;

/// Wait after a failed status check or token refresh
pub const ERROR_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Consecutive 401 answers refreshed immediately; later ones wait
/// [`ERROR_RETRY_DELAY`] before the refresh
pub const MAX_CONSECUTIVE_UNAUTHORIZED: u32 = 5;

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Interval actually used for `requested`, and whether it was raised.
#[must_use]
pub const fn effective_check_interval(requested: u64) -> (u64, bool) {
    if requested < MIN_CHECK_INTERVAL_SECS {
        (MIN_CHECK_INTERVAL_SECS, true)
    } else {
        (requested, false)
    }
}

pub struct PollLoop {
    checker: Arc<dyn StatusChecker>,
    tokens: TokenStore,
    session: RecordingSession,
    interval: u64,
    events: Arc<dyn EventSink>,
}

impl PollLoop {
    pub fn new(
        checker: Arc<dyn StatusChecker>,
        tokens: TokenStore,
        session: RecordingSession,
        check_interval: u64,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let (interval, clamped) = effective_check_interval(check_interval);
        if clamped {
            events.emit(RecorderEvent::CheckIntervalClamped {
                requested: check_interval,
                effective: interval,
            });
        }

        Self {
            checker,
            tokens,
            session,
            interval,
            events,
        }
    }

    /// Effective check interval in seconds
    #[must_use]
    pub const fn interval(&self) -> u64 {
        self.interval
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Prepare the directories, recover leftovers, then poll until a
    /// terminal condition.
    ///
    /// Only returns on a terminal condition, always as an `Err`:
    /// [`Error::StreamerNotFound`], [`Error::Authentication`] when the token
    /// endpoint rejects the credentials, or a failure to create the download
    /// directories.
    pub async fn run(&mut self) -> Result<()> {
        self.session.layout().ensure().await?;
        self.recover_leftovers().await;

        let settings = self.session.settings();
        self.events.emit(RecorderEvent::Watching {
            username: settings.username.clone(),
            quality: settings.quality.clone(),
            interval: self.interval,
        });

        self.poll().await
    }

    /// Process every file a previous run left in the recorded directory.
    pub async fn recover_leftovers(&self) {
        let leftovers = match self.session.layout().leftovers().await {
            Ok(files) => files,
            Err(e) => {
                self.events.emit(RecorderEvent::RecoveryScanFailed { reason: e.to_string() });
                return;
            }
        };
        if leftovers.is_empty() {
            return;
        }

        self.events.emit(RecorderEvent::RecoveryStarted {
            count: leftovers.len(),
        });

        for raw in leftovers {
            let Some(name) = raw.file_name() else {
                continue;
            };
            let processed = self.session.layout().processed_dir().join(name);
            // Failures are reported by process_and_report; the file stays for the next run.
            let _ = process_and_report(self.session.processor(), &raw, &processed, self.events.as_ref()).await;
        }
    }

    async fn poll(&mut self) -> Result<()> {
        let username = self.session.settings().username.clone();
        let mut unauthorized: u32 = 0;

        loop {
            let status = self.checker.check_user(&username, self.tokens.current()).await;
            tracing::debug!(username = %username, status = status.as_str(), "Status checked");

            if !matches!(status, StreamStatus::Unauthorized) {
                unauthorized = 0;
            }

            match status {
                StreamStatus::Offline => {
                    self.countdown(&username).await;
                }
                StreamStatus::Online(info) => {
                    self.events.emit(RecorderEvent::Online {
                        username: username.clone(),
                        info: info.clone(),
                    });
                    self.session
                        .record(&info, self.tokens.current(), self.events.as_ref())
                        .await;
                    self.events.emit(RecorderEvent::Resuming {
                        interval: self.interval,
                    });
                    tokio::time::sleep(Duration::from_secs(self.interval)).await;
                }
                StreamStatus::Unauthorized => {
                    unauthorized += 1;
                    self.events.emit(RecorderEvent::Unauthorized { attempt: unauthorized });
                    if unauthorized >= MAX_CONSECUTIVE_UNAUTHORIZED {
                        self.events.emit(RecorderEvent::UnauthorizedBackoff {
                            attempts: unauthorized,
                            retry_in: ERROR_RETRY_DELAY,
                        });
                        tokio::time::sleep(ERROR_RETRY_DELAY).await;
                    }
                    self.refresh_token().await?;
                }
                StreamStatus::TransientError => {
                    self.events.emit(RecorderEvent::CheckFailed {
                        retry_in: ERROR_RETRY_DELAY,
                    });
                    tokio::time::sleep(ERROR_RETRY_DELAY).await;
                }
                StreamStatus::NotFound => {
                    self.events.emit(RecorderEvent::NotFound {
                        username: username.clone(),
                    });
                    return Err(Error::StreamerNotFound(username));
                }
            }
        }
    }

    /// Replace the token. Rejected credentials are fatal; a network failure
    /// keeps the old token and waits [`ERROR_RETRY_DELAY`].
    async fn refresh_token(&mut self) -> Result<()> {
        match self.tokens.refresh().await {
            Ok(_) => {
                self.events.emit(RecorderEvent::TokenRefreshed);
                Ok(())
            }
            Err(e @ Error::Authentication(_)) => Err(e),
            Err(e) => {
                self.events.emit(RecorderEvent::TokenRefreshFailed {
                    reason: e.to_string(),
                    retry_in: ERROR_RETRY_DELAY,
                });
                tokio::time::sleep(ERROR_RETRY_DELAY).await;
                Ok(())
            }
        }
    }

    async fn countdown(&self, username: &str) {
        self.events.emit(RecorderEvent::Offline {
            username: username.to_string(),
            interval: self.interval,
        });
        for remaining in (1..=self.interval).rev() {
            self.events.emit(RecorderEvent::Countdown {
                username: username.to_string(),
                remaining,
            });
            tokio::time::sleep(COUNTDOWN_TICK).await;
        }
    }
}
