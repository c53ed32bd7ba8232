// Prompt templates for candidate re-ranking.
//
// The engine's numbers are passed through verbatim so the model weighs
// context and trade-offs instead of redoing arithmetic.

use crate::draft::roster::RosterTemplate;
use crate::valuation::scoring::ScoredCandidate;
use crate::valuation::strategy::Strategy;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Draft context shown alongside the candidate list.
#[derive(Debug, Clone)]
pub struct RerankContext<'a> {
    pub league_name: &'a str,
    pub team_on_clock: &'a str,
    pub pick_number: u32,
    pub strategy: Strategy,
    pub roster_template: &'a RosterTemplate,
}

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

/// Static system instruction for every re-rank call.
pub fn system_prompt() -> String {
    "You are an NFL fantasy draft strategy expert. Given league settings, roster needs, and a \
     candidate list with pre-computed VORP, ADP discount, need, scarcity and risk numbers, \
     re-rank the candidates and annotate each one.\n\
     \n\
     Guidelines:\n\
     - Prefer VORP and positional scarcity\n\
     - Do not overreact to minor news\n\
     - Consider roster construction needs and draft position value\n\
     - Keep each reason to 140 characters or fewer\n\
     - Only use player_id values from the candidate list\n\
     \n\
     Output only a JSON object of this shape:\n\
     {\"ranked\": [{\"player_id\": \"string\", \"reason\": \"string\", \
     \"fit\": \"value|need|stack|upside|safe\", \"edge_vs_next\": number}]}"
        .to_string()
}

// ---------------------------------------------------------------------------
// User prompt
// ---------------------------------------------------------------------------

/// Build the user message for re-ranking `candidates`.
pub fn build_rerank_prompt(ctx: &RerankContext<'_>, candidates: &[ScoredCandidate]) -> String {
    let mut prompt = String::with_capacity(1024 + candidates.len() * 160);

    prompt.push_str(&format!(
        "## DRAFT\n\
         League: {}\n\
         Team on clock: {}\n\
         Pick number: {}\n\
         Strategy: {}\n\
         Roster: {}\n\n",
        ctx.league_name,
        ctx.team_on_clock,
        ctx.pick_number,
        ctx.strategy,
        ctx.roster_template.labels().join(", "),
    ));

    prompt.push_str("## CANDIDATES (engine order)\n");
    for (i, c) in candidates.iter().enumerate() {
        prompt.push_str(&format_candidate(i + 1, c));
    }

    prompt.push_str("\nReturn only the JSON object.");
    prompt
}

fn format_candidate(rank: usize, c: &ScoredCandidate) -> String {
    let team = c.team.as_deref().unwrap_or("FA");
    let k = &c.components;
    format!(
        "{rank}. {} | {} ({}, {team}) | score {:.2}, edge {:.2} | VORP {:.2}, ADP disc {:.2}, \
         need {:.2}, scarcity {:.2}, bye pen {:.2}, injury pen {:.2}, upside {:.2}\n",
        c.player_id,
        c.full_name,
        c.position,
        c.score,
        c.edge_vs_next,
        k.vorp,
        k.adp_discount,
        k.need_boost,
        k.scarcity_boost,
        k.bye_penalty,
        k.injury_penalty,
        k.upside_bonus,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::pick::Position;
    use crate::valuation::scoring::ScoreComponents;

    fn candidate(id: &str, name: &str, pos: Position, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            player_id: id.into(),
            full_name: name.into(),
            position: pos,
            team: Some("KC".into()),
            score,
            components: ScoreComponents {
                vorp: 180.0,
                injury_penalty: 15.0,
                ..Default::default()
            },
            edge_vs_next: 4.5,
        }
    }

    #[test]
    fn system_prompt_names_schema_and_fits() {
        let s = system_prompt();
        assert!(s.contains("\"ranked\""));
        assert!(s.contains("value|need|stack|upside|safe"));
        assert!(s.contains("140"));
    }

    #[test]
    fn prompt_carries_context_and_candidates() {
        let template = RosterTemplate::from_strs(&["QB", "RB", "FLEX", "BN"]);
        let ctx = RerankContext {
            league_name: "Dynasty Bros",
            team_on_clock: "7",
            pick_number: 13,
            strategy: Strategy::Upside,
            roster_template: &template,
        };
        let prompt = build_rerank_prompt(
            &ctx,
            &[
                candidate("4046", "Patrick Mahomes", Position::Quarterback, 61.25),
                candidate("9509", "Bijan Robinson", Position::RunningBack, 58.0),
            ],
        );

        assert!(prompt.contains("League: Dynasty Bros"));
        assert!(prompt.contains("Team on clock: 7"));
        assert!(prompt.contains("Pick number: 13"));
        assert!(prompt.contains("Strategy: upside"));
        assert!(prompt.contains("Roster: QB, RB, FLEX, BN"));
        assert!(prompt.contains("1. 4046 | Patrick Mahomes (QB, KC)"));
        assert!(prompt.contains("2. 9509 | Bijan Robinson (RB, KC)"));
        assert!(prompt.contains("injury pen 15.00"));
    }

    #[test]
    fn free_agent_shown_as_fa() {
        let mut c = candidate("1", "Somebody", Position::WideReceiver, 1.0);
        c.team = None;
        assert!(format_candidate(1, &c).contains("(WR, FA)"));
    }
}
