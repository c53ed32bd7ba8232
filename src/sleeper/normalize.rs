// Coercion of raw Sleeper JSON into typed draft entities.
//
// Sleeper payloads are loosely typed: ids arrive as numbers or strings,
// numeric fields sometimes as strings, and most fields may be null. Entries
// that cannot be coerced are dropped here so nothing untyped reaches the
// scoring engine.

use serde_json::{Map, Value};
use tracing::debug;

use crate::draft::league::{Draft, League, User};
use crate::draft::pick::{Pick, Position};
use crate::draft::player::{InjuryStatus, Player};

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// A string or number field as text. Empty strings read as `None`.
pub(crate) fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A number or numeric string field as `f64`.
pub(crate) fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let n = match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn whole(obj: &Map<String, Value>, key: &str) -> Option<u32> {
    number(obj, key)
        .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n as u32)
}

fn first_number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| number(obj, k))
}

fn json_or_null(obj: &Map<String, Value>, key: &str) -> Value {
    obj.get(key).cloned().unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Projection fields in order of preference.
const PROJECTION_KEYS: &[&str] = &["projection_baseline", "fantasy_points_ppr", "proj"];

/// Display name, falling back to first + last name.
fn display_name(obj: &Map<String, Value>) -> Option<String> {
    if let Some(full) = text(obj, "full_name") {
        return Some(full);
    }
    let first = text(obj, "first_name").unwrap_or_default();
    let last = text(obj, "last_name").unwrap_or_default();
    let joined = format!("{first} {last}").trim().to_string();
    (!joined.is_empty()).then_some(joined)
}

/// Normalize one player entry. Returns `None` when the entry is not an object
/// or has no usable display name.
pub fn player(player_id: &str, raw: &Value) -> Option<Player> {
    let obj = raw.as_object()?;
    let full_name = display_name(obj)?;
    let position = text(obj, "position")
        .or_else(|| text(obj, "pos"))
        .and_then(|p| Position::from_str_pos(&p));
    let bye_week = whole(obj, "bye_week")
        .filter(|b| (1..=18).contains(b))
        .map(|b| b as u8);

    Some(Player {
        player_id: player_id.to_string(),
        full_name,
        position,
        team: text(obj, "team"),
        adp: number(obj, "adp").filter(|a| *a > 0.0),
        tier: whole(obj, "tier").filter(|t| *t >= 1),
        projection: first_number(obj, PROJECTION_KEYS),
        bye_week,
        injury_status: text(obj, "injury_status").and_then(|s| InjuryStatus::parse(&s)),
        news: text(obj, "news"),
        metadata: raw.clone(),
    })
}

/// Normalize the `/players/{sport}` map (player id → record).
///
/// Entries without a usable name are dropped. Output keeps the upstream key
/// order, which becomes catalog order and breaks score ties.
pub fn players(raw: &Value) -> Option<Vec<Player>> {
    let map = raw.as_object()?;
    let mut out = Vec::with_capacity(map.len());
    let mut dropped = 0usize;
    for (id, entry) in map {
        match player(id, entry) {
            Some(p) => out.push(p),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!(dropped, kept = out.len(), "dropped unusable player entries");
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Picks
// ---------------------------------------------------------------------------

/// Normalize one pick. `draft_id` is used when the entry omits its own.
pub fn pick(draft_id: &str, raw: &Value) -> Option<Pick> {
    let obj = raw.as_object()?;
    let pick_no = whole(obj, "pick_no").filter(|n| *n >= 1)?;
    let round = whole(obj, "round").unwrap_or(1);
    let pick_in_round = whole(obj, "pick")
        .or_else(|| whole(obj, "draft_slot"))
        .unwrap_or(pick_no);

    Some(Pick {
        draft_id: text(obj, "draft_id").unwrap_or_else(|| draft_id.to_string()),
        round,
        pick: pick_in_round,
        pick_no,
        roster_id: text(obj, "roster_id").unwrap_or_default(),
        player_id: text(obj, "player_id"),
        timestamp: number(obj, "timestamp").map(|t| t as i64),
        metadata: json_or_null(obj, "metadata"),
    })
}

/// Normalize a pick list, sorted by overall pick number.
pub fn picks(draft_id: &str, raw: &Value) -> Option<Vec<Pick>> {
    let mut out: Vec<Pick> = raw
        .as_array()?
        .iter()
        .filter_map(|p| pick(draft_id, p))
        .collect();
    out.sort_by_key(|p| p.pick_no);
    Some(out)
}

// ---------------------------------------------------------------------------
// Users, leagues, drafts
// ---------------------------------------------------------------------------

/// Normalize a user. Sleeper answers `null` for unknown usernames.
pub fn user(raw: &Value) -> Option<User> {
    let obj = raw.as_object()?;
    Some(User {
        user_id: text(obj, "user_id")?,
        username: text(obj, "username").unwrap_or_default(),
        display_name: text(obj, "display_name"),
        avatar: text(obj, "avatar"),
    })
}

pub fn league(raw: &Value) -> Option<League> {
    let obj = raw.as_object()?;
    let roster_positions = obj
        .get("roster_positions")
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|l| l.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Some(League {
        league_id: text(obj, "league_id")?,
        name: text(obj, "name").unwrap_or_default(),
        season: text(obj, "season").unwrap_or_default(),
        sport: text(obj, "sport").unwrap_or_else(|| "nfl".to_string()),
        status: text(obj, "status").unwrap_or_else(|| "active".to_string()),
        roster_positions,
        scoring_settings: json_or_null(obj, "scoring_settings"),
    })
}

pub fn leagues(raw: &Value) -> Option<Vec<League>> {
    Some(raw.as_array()?.iter().filter_map(league).collect())
}

pub fn draft(raw: &Value) -> Option<Draft> {
    let obj = raw.as_object()?;
    Some(Draft {
        draft_id: text(obj, "draft_id")?,
        league_id: text(obj, "league_id"),
        draft_type: text(obj, "type").unwrap_or_else(|| "snake".to_string()),
        status: text(obj, "status").unwrap_or_else(|| "pre_draft".to_string()),
        settings: json_or_null(obj, "settings"),
        draft_order: json_or_null(obj, "draft_order"),
    })
}

pub fn drafts(raw: &Value) -> Option<Vec<Draft>> {
    Some(raw.as_array()?.iter().filter_map(draft).collect())
}
