// Re-rank parsing and the deterministic fallback.
//
// The model's reply is loose text. Only the outermost `{...}` span is read,
// entries are coerced into `RankedPick`s joined against the engine's
// candidates, and any failure yields the engine order instead.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::prompt::{build_rerank_prompt, system_prompt, RerankContext};
use crate::llm::{LlmClient, LlmError};
use crate::valuation::scoring::{round2, ScoreComponents, ScoredCandidate};

pub const DEFAULT_REASON: &str = "High value pick";
pub const MAX_REASON_CHARS: usize = 140;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Why a pick fits the roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
    #[default]
    Value,
    Need,
    Stack,
    Upside,
    Safe,
}

impl Fit {
    /// Case-insensitive; anything unrecognised is `Value`.
    pub fn coerce(s: &str) -> Fit {
        match s.trim().to_ascii_lowercase().as_str() {
            "need" => Fit::Need,
            "stack" => Fit::Stack,
            "upside" => Fit::Upside,
            "safe" => Fit::Safe,
            _ => Fit::Value,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Fit::Value => "value",
            Fit::Need => "need",
            Fit::Stack => "stack",
            Fit::Upside => "upside",
            Fit::Safe => "safe",
        }
    }
}

/// One entry of a recommendation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPick {
    pub player_id: String,
    pub reason: String,
    pub fit: Fit,
    pub edge_vs_next: f64,
    pub score: f64,
    #[serde(flatten)]
    pub components: ScoreComponents,
}

impl RankedPick {
    /// Engine candidate with default annotation.
    pub fn from_engine(c: &ScoredCandidate) -> Self {
        RankedPick {
            player_id: c.player_id.clone(),
            reason: DEFAULT_REASON.to_string(),
            fit: Fit::Value,
            edge_vs_next: c.edge_vs_next,
            score: c.score,
            components: c.components,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Slice from the first `{` to the last `}`, if both exist in order.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a model reply against the candidates it was shown.
///
/// Entries without a known `player_id` and repeated ids are dropped. An
/// empty result is an error so the caller falls back.
pub fn parse_rerank(text: &str, candidates: &[ScoredCandidate]) -> Result<Vec<RankedPick>, LlmError> {
    let json = extract_json_object(text).ok_or(LlmError::NoJson)?;
    let parsed: Value =
        serde_json::from_str(json).map_err(|e| LlmError::Malformed(e.to_string()))?;
    let entries = parsed
        .get("ranked")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::Malformed("missing `ranked` array".into()))?;

    let mut seen = HashSet::new();
    let mut picks = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(id) = entry_player_id(entry) else {
            debug!(?entry, "re-rank entry without player_id");
            continue;
        };
        let Some(candidate) = candidates.iter().find(|c| c.player_id == id) else {
            debug!(player_id = %id, "re-rank entry for unknown player");
            continue;
        };
        if !seen.insert(candidate.player_id.as_str()) {
            continue;
        }

        let mut pick = RankedPick::from_engine(candidate);
        if let Some(reason) = entry.get("reason").and_then(Value::as_str) {
            let reason = reason.trim();
            if !reason.is_empty() {
                pick.reason = truncate_chars(reason, MAX_REASON_CHARS);
            }
        }
        if let Some(fit) = entry.get("fit").and_then(Value::as_str) {
            pick.fit = Fit::coerce(fit);
        }
        if let Some(edge) = entry.get("edge_vs_next").and_then(Value::as_f64) {
            if edge.is_finite() {
                pick.edge_vs_next = round2(edge);
            }
        }
        picks.push(pick);
    }

    if picks.is_empty() {
        return Err(LlmError::Empty);
    }
    Ok(picks)
}

/// `player_id` as a string; numeric ids are accepted.
fn entry_player_id(entry: &Value) -> Option<String> {
    match entry.get("player_id")? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// The engine's first `limit` candidates with default annotation.
pub fn engine_fallback(candidates: &[ScoredCandidate], limit: usize) -> Vec<RankedPick> {
    candidates.iter().take(limit).map(RankedPick::from_engine).collect()
}

/// Re-rank the top `limit` candidates, falling back to the engine order on
/// any failure.
pub async fn rerank(
    llm: &LlmClient,
    ctx: &RerankContext<'_>,
    candidates: &[ScoredCandidate],
    limit: usize,
) -> Vec<RankedPick> {
    let top = &candidates[..candidates.len().min(limit)];
    if top.is_empty() {
        return Vec::new();
    }

    let prompt = build_rerank_prompt(ctx, top);
    let result = llm
        .complete(&system_prompt(), &prompt)
        .await
        .and_then(|text| parse_rerank(&text, top));

    match result {
        Ok(picks) => {
            debug!(count = picks.len(), "LLM re-rank applied");
            picks
        }
        Err(e) => {
            warn!(error = %e, "LLM re-rank failed, using engine order");
            engine_fallback(top, limit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::pick::Position;

    fn candidate(id: &str, score: f64, edge: f64) -> ScoredCandidate {
        ScoredCandidate {
            player_id: id.into(),
            full_name: format!("Player {id}"),
            position: Position::RunningBack,
            team: None,
            score,
            components: ScoreComponents {
                vorp: score,
                ..Default::default()
            },
            edge_vs_next: edge,
        }
    }

    fn pool() -> Vec<ScoredCandidate> {
        vec![
            candidate("a", 90.0, 10.0),
            candidate("b", 80.0, 5.0),
            candidate("c", 75.0, 0.0),
        ]
    }

    #[test]
    fn extracts_object_from_prose_and_fences() {
        let text = "Sure! Here you go:\n```json\n{\"ranked\": []}\n```\nGood luck.";
        assert_eq!(extract_json_object(text), Some("{\"ranked\": []}"));
        assert_eq!(extract_json_object("no braces"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn parses_reordered_annotated_entries() {
        let text = r#"{"ranked":[
            {"player_id":"b","reason":"Fills RB2","fit":"need","edge_vs_next":3.456},
            {"player_id":"a","reason":"Best on board","fit":"VALUE"}
        ]}"#;
        let picks = parse_rerank(text, &pool()).unwrap();

        assert_eq!(picks.len(), 2);
        assert_eq!(picks[0].player_id, "b");
        assert_eq!(picks[0].fit, Fit::Need);
        assert_eq!(picks[0].edge_vs_next, 3.46);
        assert_eq!(picks[0].score, 80.0);
        assert_eq!(picks[0].components.vorp, 80.0);
        // Missing edge keeps the engine's value.
        assert_eq!(picks[1].edge_vs_next, 10.0);
        assert_eq!(picks[1].fit, Fit::Value);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let picks = parse_rerank(r#"{"ranked":[{"player_id":"c","reason":"  "}]}"#, &pool()).unwrap();
        assert_eq!(picks[0].reason, DEFAULT_REASON);
        assert_eq!(picks[0].fit, Fit::Value);
        assert_eq!(picks[0].edge_vs_next, 0.0);
    }

    #[test]
    fn unknown_fit_coerced_to_value() {
        let picks =
            parse_rerank(r#"{"ranked":[{"player_id":"a","fit":"sleeper"}]}"#, &pool()).unwrap();
        assert_eq!(picks[0].fit, Fit::Value);
    }

    #[test]
    fn long_reason_truncated() {
        let long = "é".repeat(200);
        let text = format!(r#"{{"ranked":[{{"player_id":"a","reason":"{long}"}}]}}"#);
        let picks = parse_rerank(&text, &pool()).unwrap();
        assert_eq!(picks[0].reason.chars().count(), MAX_REASON_CHARS);
    }

    #[test]
    fn unknown_missing_and_duplicate_ids_dropped() {
        let text = r#"{"ranked":[
            {"player_id":"zzz"},
            {"reason":"no id"},
            {"player_id":"a"},
            {"player_id":"a","reason":"again"}
        ]}"#;
        let picks = parse_rerank(text, &pool()).unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].reason, DEFAULT_REASON);
    }

    #[test]
    fn shape_failures_are_errors() {
        assert!(matches!(parse_rerank("nothing here", &pool()), Err(LlmError::NoJson)));
        assert!(matches!(parse_rerank("{not json}", &pool()), Err(LlmError::Malformed(_))));
        assert!(matches!(parse_rerank(r#"{"picks":[]}"#, &pool()), Err(LlmError::Malformed(_))));
        assert!(matches!(parse_rerank(r#"{"ranked":"a,b"}"#, &pool()), Err(LlmError::Malformed(_))));
        assert!(matches!(parse_rerank(r#"{"ranked":[]}"#, &pool()), Err(LlmError::Empty)));
    }

    #[test]
    fn fallback_keeps_engine_order_and_values() {
        let picks = engine_fallback(&pool(), 2);
        assert_eq!(picks.len(), 2);
        assert_eq!(picks[0].player_id, "a");
        assert_eq!(picks[0].edge_vs_next, 10.0);
        assert_eq!(picks[1].player_id, "b");
        assert!(picks.iter().all(|p| p.reason == DEFAULT_REASON));
    }

    #[test]
    fn ranked_pick_serializes_flat() {
        let json = serde_json::to_value(RankedPick::from_engine(&pool()[0])).unwrap();
        assert_eq!(json["fit"], "value");
        assert_eq!(json["vorp"], 90.0);
        assert_eq!(json["injury_penalty"], 0.0);
        assert!(json.get("components").is_none());
    }

    #[tokio::test]
    async fn disabled_client_falls_back() {
        let template = crate::draft::roster::RosterTemplate::from_strs(&["RB"]);
        let ctx = RerankContext {
            league_name: "L",
            team_on_clock: "1",
            pick_number: 1,
            strategy: crate::valuation::strategy::Strategy::Balanced,
            roster_template: &template,
        };
        let picks = rerank(&LlmClient::Disabled, &ctx, &pool(), 8).await;
        assert_eq!(
            picks.iter().map(|p| p.player_id.as_str()).collect::<Vec<_>>(),
            ["a", "b", "c"]
        );
    }

    #[tokio::test]
    async fn empty_pool_returns_empty() {
        let template = crate::draft::roster::RosterTemplate::from_strs(&["RB"]);
        let ctx = RerankContext {
            league_name: "L",
            team_on_clock: "1",
            pick_number: 1,
            strategy: crate::valuation::strategy::Strategy::Safe,
            roster_template: &template,
        };
        assert!(rerank(&LlmClient::Disabled, &ctx, &[], 8).await.is_empty());
    }
}
