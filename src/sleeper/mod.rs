// Sleeper fantasy API: data source trait, HTTP client and payload normalization.

pub mod client;
pub mod normalize;

use async_trait::async_trait;
use thiserror::Error;

use crate::draft::league::{Draft, League, User};
use crate::draft::pick::Pick;
use crate::draft::player::Player;

pub use client::SleeperClient;

/// Failure talking to the upstream sports-data API.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out: {url}")]
    Timeout { url: String },

    #[error("upstream returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("upstream request failed for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("unexpected upstream payload from {url}: {message}")]
    Decode { url: String, message: String },
}

impl UpstreamError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::Status { status: 404, .. })
    }
}

/// Read access to users, leagues, drafts, picks and the player pool.
///
/// [`SleeperClient`] is the production implementation; tests substitute
/// in-memory fakes.
#[async_trait]
pub trait SportsData: Send + Sync {
    /// The full player pool, already normalized.
    async fn fetch_players(&self) -> Result<Vec<Player>, UpstreamError>;

    /// Picks made so far in a draft, ordered by `pick_no`.
    async fn fetch_picks(&self, draft_id: &str) -> Result<Vec<Pick>, UpstreamError>;

    async fn fetch_draft(&self, draft_id: &str) -> Result<Draft, UpstreamError>;

    async fn fetch_league(&self, league_id: &str) -> Result<League, UpstreamError>;

    /// `None` when no account has this username.
    async fn fetch_user(&self, username: &str) -> Result<Option<User>, UpstreamError>;

    async fn fetch_user_leagues(
        &self,
        user_id: &str,
        season: &str,
    ) -> Result<Vec<League>, UpstreamError>;

    async fn fetch_league_drafts(&self, league_id: &str) -> Result<Vec<Draft>, UpstreamError>;
}
