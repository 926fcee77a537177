//! Live status of the watched broadcaster

use async_trait::async_trait;
use stream_saver_twitch::{AccessToken, TwitchClient, TwitchError};

pub use stream_saver_twitch::StreamInfo;

/// Outcome of one status check. Produced fresh on every poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    /// Broadcasting; carries the first stream entry
    Online(StreamInfo),
    Offline,
    /// No such user
    NotFound,
    /// The access token was rejected
    Unauthorized,
    /// Network failure or unexpected answer, worth retrying
    TransientError,
}

impl StreamStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online(_) => "online",
            Self::Offline => "offline",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::TransientError => "error",
        }
    }
}

/// Queries whether a user is live.
///
/// Implementations never fail: every failure maps to a [`StreamStatus`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusChecker: Send + Sync {
    async fn check_user(&self, username: &str, token: &AccessToken) -> StreamStatus;
}

/// [`StatusChecker`] backed by the Helix streams endpoint
pub struct TwitchStatusChecker {
    client: TwitchClient,
}

impl TwitchStatusChecker {
    #[must_use]
    pub const fn new(client: TwitchClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusChecker for TwitchStatusChecker {
    async fn check_user(&self, username: &str, token: &AccessToken) -> StreamStatus {
        match self.client.get_streams(username, token).await {
            Ok(streams) => streams
                .into_first()
                .map_or(StreamStatus::Offline, StreamStatus::Online),
            Err(err) => {
                let status = classify_error(&err);
                tracing::debug!(username, error = %err, status = status.as_str(), "Status check failed");
                status
            }
        }
    }
}

fn classify_error(err: &TwitchError) -> StreamStatus {
    match err.status().map(|status| status.as_u16()) {
        Some(401) => StreamStatus::Unauthorized,
        Some(404) => StreamStatus::NotFound,
        _ => StreamStatus::TransientError,
    }
}
