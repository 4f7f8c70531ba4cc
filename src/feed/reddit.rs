//! HTTP upstream for Reddit comment listings.
//!
//! Authenticates with the OAuth password grant of a script app, checks that the
//! subreddit exists, then serves `/r/<feed>/comments` pages to a
//! [`FeedReader`](super::FeedReader). Tokens are refreshed shortly before they
//! expire and once more on a 401.

use reqwest::{header, redirect, Client, Response, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};

use super::record::Thing;
use super::{FeedError, Upstream};
use crate::config::Config;
use crate::credentials::Credentials;
use crate::name::FeedName;

/// Page size requested from the listing endpoint (upstream maximum).
pub const LISTING_LIMIT: u32 = 100;

/// Tokens are refreshed this long before their reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Hosts and timeouts used by [`RedditUpstream`].
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub auth_url: String,
    pub api_url: String,
    pub request_timeout: Duration,
}

impl From<&Config> for UpstreamConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth_url: config.auth_url.trim_end_matches('/').to_string(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct About {
    kind: String,
}

#[derive(Debug)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

/// Authenticated, read-only session on one subreddit.
pub struct RedditUpstream {
    client: Client,
    credentials: Credentials,
    config: UpstreamConfig,
    feed: FeedName,
    token: Option<AccessToken>,
}

impl RedditUpstream {
    /// Authenticate and verify that `feed` exists.
    ///
    /// # Errors
    ///
    /// - [`FeedError::Auth`] if the credentials are rejected
    /// - [`FeedError::NotFound`] if the subreddit does not exist or is not readable
    pub async fn connect(
        credentials: Credentials,
        feed: FeedName,
        config: UpstreamConfig,
    ) -> Result<Self, FeedError> {
        let client = Client::builder()
            .user_agent(credentials.user_agent.clone())
            .timeout(config.request_timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        let mut upstream = Self {
            client,
            credentials,
            config,
            feed,
            token: None,
        };

        upstream.authenticate().await?;
        upstream.check_feed().await?;

        tracing::info!(feed = %upstream.feed, "Connected to upstream");
        Ok(upstream)
    }

    async fn authenticate(&mut self) -> Result<(), FeedError> {
        let url = format!("{}/api/v1/access_token", self.config.auth_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FeedError::Auth(format!("token endpoint returned {status}")));
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::Disconnected(format!("token endpoint returned {status}")));
        }
        if !status.is_success() {
            return Err(FeedError::Protocol(format!("token endpoint returned {status}")));
        }

        let body: TokenResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(FeedError::Auth(error));
        }
        let value = body
            .access_token
            .ok_or_else(|| FeedError::Auth("no access token in response".into()))?;
        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));

        self.token = Some(AccessToken {
            value,
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        tracing::debug!(expires_in = ?lifetime, "Obtained access token");
        Ok(())
    }

    async fn bearer(&mut self) -> Result<String, FeedError> {
        let fresh = matches!(&self.token, Some(token) if Instant::now() < token.refresh_at);
        if !fresh {
            self.authenticate().await?;
        }
        self.token
            .as_ref()
            .map(|token| token.value.clone())
            .ok_or_else(|| FeedError::Auth("no access token".into()))
    }

    /// GET an API path, re-authenticating once if the token was rejected.
    async fn get(&mut self, path: &str, query: &[(&str, String)]) -> Result<Response, FeedError> {
        let url = format!("{}{}", self.config.api_url, path);
        let mut retried = false;
        loop {
            let token = self.bearer().await?;
            let response = self
                .client
                .get(&url)
                .header(header::AUTHORIZATION, format!("bearer {token}"))
                .query(query)
                .send()
                .await?;

            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                tracing::debug!(path, "Access token rejected, re-authenticating");
                self.token = None;
                retried = true;
                continue;
            }
            return Ok(response);
        }
    }

    fn check_status(&self, response: &Response) -> Result<(), FeedError> {
        let status = response.status();
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(FeedError::Auth(format!("API returned {status}"))),
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(FeedError::NotFound(self.feed.to_string()))
            }
            // Unknown subreddits redirect to the search page.
            s if s.is_redirection() => Err(FeedError::NotFound(self.feed.to_string())),
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                Err(FeedError::Disconnected(format!("API returned {status}")))
            }
            _ => Err(FeedError::Protocol(format!("API returned {status}"))),
        }
    }

    async fn check_feed(&mut self) -> Result<(), FeedError> {
        let path = format!("/r/{}/about", self.feed);
        let response = self.get(&path, &[("raw_json", "1".into())]).await?;
        self.check_status(&response)?;

        let about: About = response.json().await?;
        if about.kind != "t5" {
            return Err(FeedError::NotFound(self.feed.to_string()));
        }
        Ok(())
    }
}

impl Upstream for RedditUpstream {
    async fn fetch_latest(&mut self) -> Result<Vec<Thing>, FeedError> {
        let path = format!("/r/{}/comments", self.feed);
        let query = [
            ("limit", LISTING_LIMIT.to_string()),
            ("raw_json", "1".to_string()),
        ];
        let response = self.get(&path, &query).await?;
        self.check_status(&response)?;

        let listing: Listing = response.json().await?;
        Ok(listing.data.children)
    }

    async fn reconnect(&mut self) -> Result<(), FeedError> {
        self.token = None;
        self.authenticate().await
    }
}
