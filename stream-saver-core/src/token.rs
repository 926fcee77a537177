//! App access token ownership
//!
//! The token is fetched once at startup and replaced only through
//! [`TokenStore::refresh`], which the poll loop calls after a 401. Everything
//! else borrows it read-only.

use std::sync::Arc;

use async_trait::async_trait;
use stream_saver_twitch::{AccessToken, TwitchClient};

use crate::error::Result;

/// Source of fresh app access tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain a new token.
    ///
    /// Rejected credentials surface as [`crate::Error::Authentication`],
    /// anything else as [`crate::Error::Network`].
    async fn fetch_access_token(&self) -> Result<AccessToken>;
}

/// [`TokenProvider`] using the client-credentials grant
pub struct TwitchTokenProvider {
    client: TwitchClient,
}

impl TwitchTokenProvider {
    #[must_use]
    pub const fn new(client: TwitchClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenProvider for TwitchTokenProvider {
    async fn fetch_access_token(&self) -> Result<AccessToken> {
        Ok(self.client.fetch_access_token().await?)
    }
}

/// Holder of the current token
pub struct TokenStore {
    provider: Arc<dyn TokenProvider>,
    current: AccessToken,
}

impl TokenStore {
    /// Fetch the initial token from `provider`
    pub async fn fetch(provider: Arc<dyn TokenProvider>) -> Result<Self> {
        let current = provider.fetch_access_token().await?;
        Ok(Self { provider, current })
    }

    /// Wrap an already obtained token
    pub fn with_token(provider: Arc<dyn TokenProvider>, token: AccessToken) -> Self {
        Self {
            provider,
            current: token,
        }
    }

    #[must_use]
    pub const fn current(&self) -> &AccessToken {
        &self.current
    }

    /// Replace the held token with a freshly fetched one.
    ///
    /// On failure the previous token stays in place.
    pub async fn refresh(&mut self) -> Result<&AccessToken> {
        self.current = self.provider.fetch_access_token().await?;
        Ok(&self.current)
    }
}
