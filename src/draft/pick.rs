// Draft pick representation and football positions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Football positions known to the ranking engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "QB")]
    Quarterback,
    #[serde(rename = "RB")]
    RunningBack,
    #[serde(rename = "WR")]
    WideReceiver,
    #[serde(rename = "TE")]
    TightEnd,
    #[serde(rename = "K")]
    Kicker,
    #[serde(rename = "DEF")]
    Defense,
}

/// Positions that enter the candidate pool and the scarcity count.
pub const RANKED_POSITIONS: &[Position] = &[
    Position::Quarterback,
    Position::RunningBack,
    Position::WideReceiver,
    Position::TightEnd,
];

impl Position {
    /// Parse a position string into a Position enum.
    ///
    /// Handles the Sleeper abbreviations plus the common defense aliases
    /// ("DST", "D/ST"). Returns `None` for IDP and anything else.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "QB" => Some(Position::Quarterback),
            "RB" => Some(Position::RunningBack),
            "WR" => Some(Position::WideReceiver),
            "TE" => Some(Position::TightEnd),
            "K" => Some(Position::Kicker),
            "DEF" | "DST" | "D/ST" => Some(Position::Defense),
            _ => None,
        }
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Kicker => "K",
            Position::Defense => "DEF",
        }
    }

    /// Whether players at this position are ranked as candidates.
    pub fn is_ranked(&self) -> bool {
        RANKED_POSITIONS.contains(self)
    }

    /// Whether a FLEX slot (RB/WR/TE) can hold this position.
    pub fn is_flex_eligible(&self) -> bool {
        matches!(
            self,
            Position::RunningBack | Position::WideReceiver | Position::TightEnd
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// A single draft pick record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub draft_id: String,
    pub round: u32,
    /// Pick number within the round.
    pub pick: u32,
    /// Overall pick number (1-indexed).
    pub pick_no: u32,
    /// Owning roster, in string form so numeric and text ids compare alike.
    pub roster_id: String,
    /// `None` while the pick is unresolved.
    pub player_id: Option<String>,
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Pick {
    /// Whether this pick belongs to the given roster.
    pub fn is_owned_by(&self, team_id: &str) -> bool {
        self.roster_id == team_id
    }
}
