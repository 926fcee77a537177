use stream_saver_twitch::TwitchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Streamer not found: {0}")]
    StreamerNotFound(String),

    #[error("External tool error: {0}")]
    Tool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit status for a run that ended with this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        1
    }

    /// Whether this is a known terminal condition rather than a crash.
    ///
    /// Expected terminations are reported to the operator but never produce
    /// a crash report.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::StreamerNotFound(_) | Self::Authentication(_)
        )
    }
}

impl From<TwitchError> for Error {
    fn from(err: TwitchError) -> Self {
        match err.status() {
            // The token endpoint answers 400 for an unknown client id and 403
            // for a wrong secret.
            Some(status) if matches!(status.as_u16(), 400 | 401 | 403) => {
                Self::Authentication(err.to_string())
            }
            _ => Self::Network(err.to_string()),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
