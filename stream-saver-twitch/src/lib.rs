// stream-saver Twitch client
//
// Pure HTTP client for the two Twitch endpoints the recorder needs:
// - the OAuth token endpoint (client-credentials grant)
// - the Helix streams endpoint (live status of one user)
//
// The client knows nothing about polling or recording. Status mapping and
// token ownership live in stream-saver-core.

// Client error type and response helpers
pub mod error;

// Wire types
pub mod types;

mod client;

pub use client::{TwitchClient, TwitchEndpoints, DEFAULT_API_URL, DEFAULT_TOKEN_URL, REQUEST_TIMEOUT};
pub use error::TwitchError;
pub use reqwest::StatusCode;
pub use types::{AccessToken, Credentials, StreamInfo, StreamsResponse, TokenResponse};
