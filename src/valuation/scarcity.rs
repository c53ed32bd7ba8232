// Positional scarcity from the undrafted pool.
//
// The fewer eligible players remain at a position, the larger the boost for
// drafting one now. Positions with a steep talent cliff carry a larger base.

use std::collections::{HashMap, HashSet};

use crate::draft::pick::{Position, RANKED_POSITIONS};
use crate::draft::player::PlayerCatalog;

// ---------------------------------------------------------------------------
// Base scarcity
// ---------------------------------------------------------------------------

/// Base scarcity constant per position.
///
/// RB > TE > WR > DEF > QB > K.
pub fn base_scarcity(pos: Position) -> f64 {
    match pos {
        Position::RunningBack => 50.0,
        Position::TightEnd => 30.0,
        Position::WideReceiver => 20.0,
        Position::Defense => 15.0,
        Position::Quarterback => 10.0,
        Position::Kicker => 5.0,
    }
}

// ---------------------------------------------------------------------------
// Remaining pool
// ---------------------------------------------------------------------------

/// Undrafted player counts for each ranked position.
///
/// Every ranked position is present in the result, with 0 when the pool is
/// exhausted.
pub fn remaining_counts(
    catalog: &PlayerCatalog,
    drafted: &HashSet<&str>,
) -> HashMap<Position, usize> {
    let mut counts: HashMap<Position, usize> =
        RANKED_POSITIONS.iter().map(|&pos| (pos, 0)).collect();

    for player in catalog.iter() {
        if drafted.contains(player.player_id.as_str()) {
            continue;
        }
        if let Some(pos) = player.position.filter(|p| p.is_ranked()) {
            *counts.entry(pos).or_insert(0) += 1;
        }
    }
    counts
}

/// Scarcity boost for a position with `remaining` undrafted players.
pub fn scarcity_boost(pos: Position, remaining: usize) -> f64 {
    base_scarcity(pos) * (100.0 / remaining.max(1) as f64) * 0.1
}
