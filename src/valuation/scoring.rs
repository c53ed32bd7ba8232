// Deterministic candidate scoring.
//
// Combines VORP, ADP discount, roster need, positional scarcity, bye-week
// stacking, injury risk and tier upside into one weighted score, then ranks
// the undrafted pool. Pure function of its inputs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::draft::pick::{Pick, Position};
use crate::draft::player::{Player, PlayerCatalog};
use crate::draft::roster::{
    count_positions, drafted_player_ids, team_players, RosterTemplate, StarterSlots,
};
use crate::valuation::scarcity::{remaining_counts, scarcity_boost};
use crate::valuation::strategy::StrategyWeights;
use crate::valuation::vor::vorp;

/// Maximum number of candidates returned by [`rank`].
pub const MAX_CANDIDATES: usize = 12;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Unweighted score components for one candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub vorp: f64,
    pub adp_discount: f64,
    pub need_boost: f64,
    pub scarcity_boost: f64,
    pub bye_penalty: f64,
    pub injury_penalty: f64,
    pub upside_bonus: f64,
}

impl ScoreComponents {
    /// Weighted total. Penalties subtract.
    pub fn weighted(&self, w: &StrategyWeights) -> f64 {
        self.vorp * w.vorp
            + self.adp_discount * w.adp_discount
            + self.need_boost * w.need
            + self.scarcity_boost * w.scarcity
            - self.bye_penalty * w.bye
            - self.injury_penalty * w.injury
            + self.upside_bonus * w.upside
    }

    fn rounded(&self) -> Self {
        ScoreComponents {
            vorp: round2(self.vorp),
            adp_discount: round2(self.adp_discount),
            need_boost: round2(self.need_boost),
            scarcity_boost: round2(self.scarcity_boost),
            bye_penalty: round2(self.bye_penalty),
            injury_penalty: round2(self.injury_penalty),
            upside_bonus: round2(self.upside_bonus),
        }
    }
}

/// A ranked candidate with its score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub player_id: String,
    pub full_name: String,
    pub position: Position,
    pub team: Option<String>,
    pub score: f64,
    #[serde(flatten)]
    pub components: ScoreComponents,
    /// Score lead over the next candidate; 0 for the last one.
    pub edge_vs_next: f64,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Everything the engine needs to rank one pick.
#[derive(Debug, Clone, Copy)]
pub struct RankContext<'a> {
    pub catalog: &'a PlayerCatalog,
    pub picks: &'a [Pick],
    pub template: &'a RosterTemplate,
    /// 1-based overall pick being made.
    pub pick_number: u32,
    pub team_on_clock: &'a str,
    pub weights: &'a StrategyWeights,
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// How far a player's ADP sits behind the current pick.
pub fn adp_discount(adp: Option<f64>, pick_number: u32) -> f64 {
    adp.map(|adp| (adp - f64::from(pick_number)).max(0.0))
        .unwrap_or(0.0)
}

/// Boost for open starter slots. A small floor keeps filled positions in play.
pub fn need_boost(unfilled: usize) -> f64 {
    if unfilled > 0 {
        unfilled as f64 * 0.5
    } else {
        0.1
    }
}

/// Penalty for stacking bye weeks on one roster.
///
/// `same_bye` is how many players the team already has with the candidate's
/// bye week.
pub fn bye_penalty(same_bye: usize) -> f64 {
    match same_bye {
        0 | 1 => 0.0,
        2 => 10.0,
        _ => 20.0,
    }
}

/// Upside for better tiers; 0 when tier is unknown.
pub fn upside_bonus(tier: Option<u32>) -> f64 {
    match tier {
        Some(t) if t > 0 => 20.0 / f64::from(t),
        _ => 0.0,
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Rank the undrafted QB/RB/WR/TE pool for the team on the clock.
///
/// Candidates keep catalog order before the stable sort, so equal scores
/// stay in catalog order. At most [`MAX_CANDIDATES`] are returned.
pub fn rank(ctx: &RankContext<'_>) -> Vec<ScoredCandidate> {
    let drafted = drafted_player_ids(ctx.picks);
    let remaining = remaining_counts(ctx.catalog, &drafted);
    let slots = ctx.template.starter_slots();
    let filled = count_positions(ctx.picks, ctx.catalog, ctx.team_on_clock);
    let bye_counts = team_bye_counts(&team_players(ctx.picks, ctx.catalog, ctx.team_on_clock));

    let mut scored: Vec<(f64, ScoredCandidate)> = ctx
        .catalog
        .iter()
        .filter(|p| !drafted.contains(p.player_id.as_str()))
        .filter_map(|p| {
            let pos = p.position.filter(|pos| pos.is_ranked())?;
            let components = components_for(
                p,
                pos,
                ctx.pick_number,
                &slots,
                &filled,
                &remaining,
                &bye_counts,
            );
            let score = components.weighted(ctx.weights);
            Some((
                score,
                ScoredCandidate {
                    player_id: p.player_id.clone(),
                    full_name: p.full_name.clone(),
                    position: pos,
                    team: p.team.clone(),
                    score: round2(score),
                    components: components.rounded(),
                    edge_vs_next: 0.0,
                },
            ))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(MAX_CANDIDATES);

    let mut ranked: Vec<ScoredCandidate> = scored.into_iter().map(|(_, c)| c).collect();
    annotate_edges(&mut ranked);
    ranked
}

fn components_for(
    player: &Player,
    pos: Position,
    pick_number: u32,
    slots: &StarterSlots,
    filled: &HashMap<Position, usize>,
    remaining: &HashMap<Position, usize>,
    bye_counts: &HashMap<u8, usize>,
) -> ScoreComponents {
    let have = filled.get(&pos).copied().unwrap_or(0);
    let same_bye = player
        .bye_week
        .and_then(|bye| bye_counts.get(&bye).copied())
        .unwrap_or(0);

    ScoreComponents {
        vorp: vorp(pos, player.projected_points()),
        adp_discount: adp_discount(player.adp, pick_number),
        need_boost: need_boost(slots.unfilled_need(pos, have)),
        scarcity_boost: scarcity_boost(pos, remaining.get(&pos).copied().unwrap_or(0)),
        bye_penalty: bye_penalty(same_bye),
        injury_penalty: player.injury_status.map(|s| s.penalty()).unwrap_or(0.0),
        upside_bonus: upside_bonus(player.tier),
    }
}

fn team_bye_counts(players: &[&Player]) -> HashMap<u8, usize> {
    let mut counts = HashMap::new();
    for bye in players.iter().filter_map(|p| p.bye_week) {
        *counts.entry(bye).or_insert(0) += 1;
    }
    counts
}

/// Fill `edge_vs_next` from the rounded scores.
fn annotate_edges(ranked: &mut [ScoredCandidate]) {
    for i in 0..ranked.len() {
        let edge = match ranked.get(i + 1) {
            Some(next) => round2(ranked[i].score - next.score),
            None => 0.0,
        };
        ranked[i].edge_vs_next = edge;
    }
}
