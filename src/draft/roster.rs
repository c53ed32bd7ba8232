// Roster templates, starter slot counting and per-team roster state.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::pick::{Pick, Position};
use super::player::{Player, PlayerCatalog};

// ---------------------------------------------------------------------------
// Slot label policy
// ---------------------------------------------------------------------------

/// What a roster slot label contributes to starter requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Dedicated starter slot for one position.
    Starter(Position),
    /// RB/WR/TE flex (`FLEX`, `WRRB_FLEX`, `REC_FLEX`).
    Flex,
    /// QB-eligible flex (`SUPER_FLEX`).
    SuperFlex,
    /// Bench, injured reserve and taxi squad.
    Reserve,
    /// IDP and any label the engine does not model.
    Ignored,
}

impl SlotKind {
    /// Classify a Sleeper roster label.
    pub fn classify(label: &str) -> Self {
        let label = label.trim().to_uppercase();
        match label.as_str() {
            "FLEX" | "WRRB_FLEX" | "REC_FLEX" => SlotKind::Flex,
            "SUPER_FLEX" => SlotKind::SuperFlex,
            "BN" | "IR" | "TAXI" => SlotKind::Reserve,
            other => match Position::from_str_pos(other) {
                Some(pos) => SlotKind::Starter(pos),
                None => SlotKind::Ignored,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Roster template
// ---------------------------------------------------------------------------

/// Ordered slot labels for a league roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RosterTemplate {
    labels: Vec<String>,
}

impl RosterTemplate {
    pub fn new(labels: Vec<String>) -> Self {
        RosterTemplate { labels }
    }

    pub fn from_strs(labels: &[&str]) -> Self {
        RosterTemplate::new(labels.iter().map(|s| s.to_string()).collect())
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Count starter requirements from the slot labels.
    pub fn starter_slots(&self) -> StarterSlots {
        let mut slots = StarterSlots::default();
        for label in &self.labels {
            match SlotKind::classify(label) {
                SlotKind::Starter(pos) => *slots.required.entry(pos).or_insert(0) += 1,
                SlotKind::Flex => slots.flex += 1,
                SlotKind::SuperFlex => slots.superflex += 1,
                SlotKind::Reserve | SlotKind::Ignored => {}
            }
        }
        slots
    }
}

// ---------------------------------------------------------------------------
// Starter slots
// ---------------------------------------------------------------------------

/// Starter requirements derived from a roster template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StarterSlots {
    /// Dedicated slots per position.
    pub required: HashMap<Position, usize>,
    pub flex: usize,
    pub superflex: usize,
}

impl StarterSlots {
    /// Dedicated starter slots for a position.
    pub fn required_for(&self, pos: Position) -> usize {
        self.required.get(&pos).copied().unwrap_or(0)
    }

    /// Shared slots a position can also fill.
    pub fn pool_for(&self, pos: Position) -> usize {
        if pos.is_flex_eligible() {
            self.flex
        } else if pos == Position::Quarterback {
            self.superflex
        } else {
            0
        }
    }

    /// Open starter need for a position given how many are already rostered.
    ///
    /// The shared pool is only added while dedicated slots are still open:
    /// once the dedicated slots are filled the need is 0 even if a FLEX or
    /// SUPER_FLEX slot remains unfilled.
    pub fn unfilled_need(&self, pos: Position, filled: usize) -> usize {
        let required = self.required_for(pos);
        if filled < required {
            required + self.pool_for(pos) - filled
        } else {
            0
        }
    }
}

// ---------------------------------------------------------------------------
// Roster state extraction
// ---------------------------------------------------------------------------

/// Ids of every player already taken in the draft.
pub fn drafted_player_ids(picks: &[Pick]) -> HashSet<&str> {
    picks.iter().filter_map(|p| p.player_id.as_deref()).collect()
}

/// Players drafted by `team_id`, resolved through the catalog.
///
/// Picks without a player, or whose player is missing from the catalog, are
/// skipped.
pub fn team_players<'a>(
    picks: &[Pick],
    catalog: &'a PlayerCatalog,
    team_id: &str,
) -> Vec<&'a Player> {
    picks
        .iter()
        .filter(|p| p.is_owned_by(team_id))
        .filter_map(|p| p.player_id.as_deref())
        .filter_map(|id| catalog.get(id))
        .collect()
}

/// Per-position counts of the players `team_id` has drafted.
pub fn count_positions(
    picks: &[Pick],
    catalog: &PlayerCatalog,
    team_id: &str,
) -> HashMap<Position, usize> {
    let mut counts = HashMap::new();
    for player in team_players(picks, catalog, team_id) {
        if let Some(pos) = player.position {
            *counts.entry(pos).or_insert(0) += 1;
        }
    }
    counts
}
