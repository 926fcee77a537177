//! Twitch HTTP Client

use std::time::Duration;

use reqwest::{Client, header::{HeaderMap, HeaderValue, AUTHORIZATION}};

use super::error::{TwitchError, check_response, json_with_limit};
use super::types::{AccessToken, Credentials, StreamsResponse, TokenResponse};

pub const DEFAULT_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
pub const DEFAULT_API_URL: &str = "https://api.twitch.tv/helix";

/// Timeout applied to every request, token and status alike.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const CLIENT_ID_HEADER: &str = "Client-ID";

/// Endpoint roots, overridable for tests and proxies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitchEndpoints {
    pub token_url: String,
    pub api_url: String,
}

impl Default for TwitchEndpoints {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// Twitch HTTP Client
///
/// Provides the two calls the recorder needs:
/// - App access token (client-credentials grant)
/// - Live streams of a user (Helix `streams`)
#[derive(Clone)]
pub struct TwitchClient {
    credentials: Credentials,
    endpoints: TwitchEndpoints,
    client: Client,
}

impl TwitchClient {
    /// Create a client against the public Twitch endpoints
    pub fn new(credentials: Credentials) -> Result<Self, TwitchError> {
        Self::with_endpoints(credentials, TwitchEndpoints::default())
    }

    /// Create a client against custom endpoint roots
    pub fn with_endpoints(credentials: Credentials, endpoints: TwitchEndpoints) -> Result<Self, TwitchError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            credentials,
            endpoints,
            client,
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        self.credentials.client_id()
    }

    #[must_use]
    pub const fn endpoints(&self) -> &TwitchEndpoints {
        &self.endpoints
    }

    /// Exchange the client credentials for an app access token.
    ///
    /// Any non-2xx answer is returned as [`TwitchError::Http`]; nothing is
    /// retried here.
    pub async fn fetch_access_token(&self) -> Result<AccessToken, TwitchError> {
        let response = self
            .client
            .post(&self.endpoints.token_url)
            .query(&[
                ("client_id", self.credentials.client_id()),
                ("client_secret", self.credentials.client_secret()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let response = check_response(response)?;
        let resp: TokenResponse = json_with_limit(response).await?;

        tracing::debug!(
            expires_in = ?resp.expires_in,
            token_type = ?resp.token_type,
            "Obtained Twitch app access token"
        );

        Ok(AccessToken::new(resp.access_token))
    }

    /// Build request headers for authenticated Helix calls
    fn build_headers(&self, token: &AccessToken) -> Result<HeaderMap, TwitchError> {
        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_ID_HEADER, HeaderValue::from_str(self.credentials.client_id())?);

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        Ok(headers)
    }

    /// Get the live streams of `user_login`
    ///
    /// The `data` array is empty when the user is offline.
    pub async fn get_streams(&self, user_login: &str, token: &AccessToken) -> Result<StreamsResponse, TwitchError> {
        let url = format!("{}/streams", self.endpoints.api_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .headers(self.build_headers(token)?)
            .query(&[("user_login", user_login)])
            .send()
            .await?;

        let response = check_response(response)?;
        json_with_limit(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = TwitchClient::new(Credentials::new("id", "secret")).unwrap();
        assert_eq!(client.client_id(), "id");
        assert_eq!(client.endpoints(), &TwitchEndpoints::default());
    }

    #[test]
    fn test_build_headers() {
        let client = TwitchClient::new(Credentials::new("my-client", "secret")).unwrap();
        let headers = client.build_headers(&AccessToken::new("tok")).unwrap();
        assert_eq!(headers.get(CLIENT_ID_HEADER).unwrap(), "my-client");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
    }

    #[test]
    fn test_build_headers_rejects_control_chars() {
        let client = TwitchClient::new(Credentials::new("id", "secret")).unwrap();
        let result = client.build_headers(&AccessToken::new("bad\ntoken"));
        assert!(matches!(result, Err(TwitchError::InvalidHeader(_))));
    }
}
