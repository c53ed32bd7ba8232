// Sleeper account, league and draft records.

use serde::{Deserialize, Serialize};

use super::roster::RosterTemplate;

/// A Sleeper account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

/// A league and the settings the ranking engine reads from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub league_id: String,
    pub name: String,
    pub season: String,
    pub sport: String,
    pub status: String,
    /// Ordered roster slot labels, e.g. `["QB", "RB", "RB", "FLEX", "BN"]`.
    #[serde(default)]
    pub roster_positions: Vec<String>,
    /// Scoring rules keyed by stat name. Stored, not read by the engine.
    #[serde(default)]
    pub scoring_settings: serde_json::Value,
}

impl League {
    /// The roster template for this league, or `None` when the league
    /// reports no slot labels.
    pub fn roster_template(&self) -> Option<RosterTemplate> {
        if self.roster_positions.is_empty() {
            None
        } else {
            Some(RosterTemplate::new(self.roster_positions.clone()))
        }
    }
}

/// Membership of a user in a league.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLeague {
    pub user_id: String,
    pub league_id: String,
    /// "owner" or "member".
    pub role: String,
}

/// A draft belonging to a league.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub draft_id: String,
    /// Mock drafts have no league.
    pub league_id: Option<String>,
    /// "snake", "linear" or "auction".
    #[serde(rename = "type")]
    pub draft_type: String,
    /// "pre_draft", "drafting" or "complete".
    pub status: String,
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub draft_order: serde_json::Value,
}
