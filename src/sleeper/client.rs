// HTTP client for the public Sleeper API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{normalize, SportsData, UpstreamError};
use crate::config::SleeperConfig;
use crate::draft::league::{Draft, League, User};
use crate::draft::pick::Pick;
use crate::draft::player::Player;

// ---------------------------------------------------------------------------
// SleeperClient
// ---------------------------------------------------------------------------

/// Read-only Sleeper client. Every request carries a timeout; the player
/// dump uses the longer `players_timeout`.
pub struct SleeperClient {
    http: reqwest::Client,
    base_url: String,
    sport: String,
    timeout: Duration,
    players_timeout: Duration,
}

impl SleeperClient {
    pub fn new(
        base_url: impl Into<String>,
        sport: impl Into<String>,
        timeout: Duration,
        players_timeout: Duration,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            sport: sport.into(),
            timeout,
            players_timeout,
        }
    }

    pub fn from_config(config: &SleeperConfig) -> Self {
        Self::new(
            config.base_url.clone(),
            config.sport.clone(),
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.players_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    /// GET a JSON document. Non-2xx responses become `UpstreamError::Status`.
    async fn get_json(&self, path: &str, timeout: Duration) -> Result<Value, UpstreamError> {
        let url = self.url(path);
        debug!(%url, "sleeper GET");

        let response = self
            .http
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout { url: url.clone() }
            } else {
                UpstreamError::Decode {
                    url: url.clone(),
                    message: e.to_string(),
                }
            }
        })
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout {
            url: url.to_string(),
        }
    } else {
        UpstreamError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

fn shape_error(url: String, expected: &str) -> UpstreamError {
    UpstreamError::Decode {
        url,
        message: format!("expected {expected}"),
    }
}

#[async_trait]
impl SportsData for SleeperClient {
    async fn fetch_players(&self) -> Result<Vec<Player>, UpstreamError> {
        let path = format!("/players/{}", self.sport);
        let raw = self.get_json(&path, self.players_timeout).await?;
        normalize::players(&raw).ok_or_else(|| shape_error(self.url(&path), "an object of players"))
    }

    async fn fetch_picks(&self, draft_id: &str) -> Result<Vec<Pick>, UpstreamError> {
        let path = format!("/draft/{draft_id}/picks");
        let raw = self.get_json(&path, self.timeout).await?;
        normalize::picks(draft_id, &raw).ok_or_else(|| shape_error(self.url(&path), "an array of picks"))
    }

    async fn fetch_draft(&self, draft_id: &str) -> Result<Draft, UpstreamError> {
        let path = format!("/draft/{draft_id}");
        let raw = self.get_json(&path, self.timeout).await?;
        normalize::draft(&raw).ok_or_else(|| shape_error(self.url(&path), "a draft object"))
    }

    async fn fetch_league(&self, league_id: &str) -> Result<League, UpstreamError> {
        let path = format!("/league/{league_id}");
        let raw = self.get_json(&path, self.timeout).await?;
        normalize::league(&raw).ok_or_else(|| shape_error(self.url(&path), "a league object"))
    }

    async fn fetch_user(&self, username: &str) -> Result<Option<User>, UpstreamError> {
        let path = format!("/user/{username}");
        let raw = self.get_json(&path, self.timeout).await?;
        Ok(normalize::user(&raw))
    }

    async fn fetch_user_leagues(
        &self,
        user_id: &str,
        season: &str,
    ) -> Result<Vec<League>, UpstreamError> {
        let path = format!("/user/{user_id}/leagues/{}/{season}", self.sport);
        let raw = self.get_json(&path, self.timeout).await?;
        normalize::leagues(&raw).ok_or_else(|| shape_error(self.url(&path), "an array of leagues"))
    }

    async fn fetch_league_drafts(&self, league_id: &str) -> Result<Vec<Draft>, UpstreamError> {
        let path = format!("/league/{league_id}/drafts");
        let raw = self.get_json(&path, self.timeout).await?;
        normalize::drafts(&raw).ok_or_else(|| shape_error(self.url(&path), "an array of drafts"))
    }
}
