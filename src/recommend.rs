// Recommendation orchestrator.
//
// Pulls picks, league context and the player catalog together, runs the
// scoring engine, optionally lets the LLM re-rank the top candidates, and
// hands the result to the persistence worker. Discovery, draft and pick
// lookups used by the HTTP layer also live here so they share the response
// cache and persistence queue.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{cache_key, ResponseCache};
use crate::config::RosterDefaults;
use crate::db::{Database, RecommendationRecord};
use crate::draft::league::{Draft, League, User};
use crate::draft::pick::Pick;
use crate::draft::player::PlayerCatalog;
use crate::draft::roster::RosterTemplate;
use crate::error::ServiceError;
use crate::llm::prompt::RerankContext;
use crate::llm::rerank::{engine_fallback, rerank, RankedPick};
use crate::llm::LlmClient;
use crate::persist::{PersistJob, PersistQueue};
use crate::player_sync::PlayerSync;
use crate::sleeper::SportsData;
use crate::valuation::scoring::{rank, RankContext};
use crate::valuation::strategy::{Strategy, WeightTable};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /recommend`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub draft_id: String,
    #[serde(default)]
    pub team_on_clock: String,
    pub strategy: Option<String>,
}

impl RecommendRequest {
    /// Check required fields and resolve the strategy name.
    pub fn validate(&self) -> Result<(String, String, Strategy), ServiceError> {
        let draft_id = self.draft_id.trim();
        if draft_id.is_empty() {
            return Err(ServiceError::validation("draft_id is required"));
        }
        let team = self.team_on_clock.trim();
        if team.is_empty() {
            return Err(ServiceError::validation("team_on_clock is required"));
        }
        let strategy = parse_strategy(self.strategy.as_deref())?;
        Ok((draft_id.to_string(), team.to_string(), strategy))
    }
}

/// Missing or blank means balanced; unknown names are rejected.
pub fn parse_strategy(name: Option<&str>) -> Result<Strategy, ServiceError> {
    match name.map(str::trim) {
        None | Some("") => Ok(Strategy::Balanced),
        Some(s) => Strategy::parse(s).ok_or_else(|| {
            ServiceError::validation(format!(
                "strategy must be one of safe, balanced, upside (got {s:?})"
            ))
        }),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub ranked: Vec<RankedPick>,
    /// Unix seconds.
    pub generated_at: i64,
    pub strategy: Strategy,
    pub llm_enabled: bool,
}

/// A user and their leagues for one season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discovery {
    pub user: User,
    pub leagues: Vec<League>,
}

/// Roster template and display name for the league a draft belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeagueContext {
    pub league_name: String,
    pub template: RosterTemplate,
}

// ---------------------------------------------------------------------------
// Recommender
// ---------------------------------------------------------------------------

pub struct Recommender {
    source: Arc<dyn SportsData>,
    sync: Arc<PlayerSync>,
    db: Arc<Database>,
    cache: Arc<ResponseCache>,
    llm: Arc<LlmClient>,
    persist: PersistQueue,
    weights: WeightTable,
    roster_defaults: RosterDefaults,
    candidate_limit: usize,
}

impl Recommender {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn SportsData>,
        sync: Arc<PlayerSync>,
        db: Arc<Database>,
        cache: Arc<ResponseCache>,
        llm: Arc<LlmClient>,
        persist: PersistQueue,
        weights: WeightTable,
        roster_defaults: RosterDefaults,
        candidate_limit: usize,
    ) -> Self {
        Self {
            source,
            sync,
            db,
            cache,
            llm,
            persist,
            weights,
            roster_defaults,
            candidate_limit,
        }
    }

    pub fn llm_enabled(&self) -> bool {
        self.llm.is_enabled()
    }

    pub fn player_sync(&self) -> &Arc<PlayerSync> {
        &self.sync
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Rank the best available players for `team_on_clock`.
    pub async fn recommend(
        &self,
        draft_id: &str,
        team_on_clock: &str,
        strategy: Strategy,
    ) -> Result<RecommendationResponse, ServiceError> {
        let picks = self.picks(draft_id).await?;
        let league = self.league_context(draft_id).await;
        let catalog = self.sync.ensure_players_loaded().await?;
        let pick_number = picks.len() as u32 + 1;

        let candidates = rank(&RankContext {
            catalog: &catalog,
            picks: &picks,
            template: &league.template,
            pick_number,
            team_on_clock,
            weights: self.weights.weights_for(strategy),
        });
        debug!(
            draft_id,
            pick_number,
            candidates = candidates.len(),
            "engine ranking complete"
        );

        let ranked = if self.llm.is_enabled() {
            let ctx = RerankContext {
                league_name: &league.league_name,
                team_on_clock,
                pick_number,
                strategy,
                roster_template: &league.template,
            };
            rerank(&self.llm, &ctx, &candidates, self.candidate_limit).await
        } else {
            engine_fallback(&candidates, candidates.len())
        };

        let generated_at = Utc::now().timestamp();
        self.persist.enqueue(PersistJob::Recommendations(history_records(
            draft_id,
            team_on_clock,
            strategy,
            &ranked,
            generated_at,
        )));

        info!(
            draft_id,
            team_on_clock,
            %strategy,
            pick_number,
            returned = ranked.len(),
            "recommendation generated"
        );
        Ok(RecommendationResponse {
            ranked,
            generated_at,
            strategy,
            llm_enabled: self.llm.is_enabled(),
        })
    }

    /// Picks made so far, through the response cache.
    pub async fn picks(&self, draft_id: &str) -> Result<Vec<Pick>, ServiceError> {
        let key = cache_key("picks", &[("draft_id", draft_id)]);
        if let Some(picks) = self.cache.get_as::<Vec<Pick>>(&key) {
            return Ok(picks);
        }
        let picks = self.source.fetch_picks(draft_id).await?;
        self.cache.insert_as(key, &picks);
        if !picks.is_empty() {
            self.persist.enqueue(PersistJob::Picks(picks.clone()));
        }
        Ok(picks)
    }

    /// Drafts of a league, through the response cache.
    pub async fn drafts(&self, league_id: &str) -> Result<Vec<Draft>, ServiceError> {
        let key = cache_key("drafts", &[("league_id", league_id)]);
        if let Some(drafts) = self.cache.get_as::<Vec<Draft>>(&key) {
            return Ok(drafts);
        }
        let drafts = self.source.fetch_league_drafts(league_id).await?;
        self.cache.insert_as(key, &drafts);
        if !drafts.is_empty() {
            self.persist.enqueue(PersistJob::Drafts(drafts.clone()));
        }
        Ok(drafts)
    }

    /// Resolve a username and list their leagues for `season`.
    pub async fn discover(&self, username: &str, season: &str) -> Result<Discovery, ServiceError> {
        let key = cache_key("discover", &[("username", username), ("season", season)]);
        if let Some(found) = self.cache.get_as::<Discovery>(&key) {
            return Ok(found);
        }

        let user = self
            .source
            .fetch_user(username)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("user {username:?} not found")))?;
        let leagues = self.source.fetch_user_leagues(&user.user_id, season).await?;

        self.persist.enqueue(PersistJob::User(user.clone()));
        self.persist.enqueue(PersistJob::UserLeagues {
            user_id: user.user_id.clone(),
            leagues: leagues.clone(),
        });

        let found = Discovery { user, leagues };
        self.cache.insert_as(key, &found);
        Ok(found)
    }

    /// The loaded player catalog, syncing first if nothing is stored.
    pub async fn players(&self) -> Result<Arc<PlayerCatalog>, ServiceError> {
        self.sync.ensure_players_loaded().await
    }

    /// Stored recommendation history for a draft.
    pub async fn history(
        &self,
        draft_id: &str,
        limit: usize,
    ) -> Result<Vec<RecommendationRecord>, ServiceError> {
        let db = Arc::clone(&self.db);
        let draft_id = draft_id.to_string();
        let records = tokio::task::spawn_blocking(move || db.recent_recommendations(&draft_id, limit))
            .await
            .map_err(anyhow::Error::from)??;
        Ok(records)
    }

    /// Rows in the persisted player catalog.
    pub async fn stored_player_count(&self) -> Result<usize, ServiceError> {
        let db = Arc::clone(&self.db);
        let count = tokio::task::spawn_blocking(move || db.player_count())
            .await
            .map_err(anyhow::Error::from)??;
        Ok(count)
    }

    /// League name and roster template for a draft. Never fails: any lookup
    /// problem yields the configured defaults.
    pub async fn league_context(&self, draft_id: &str) -> LeagueContext {
        let key = cache_key("league_context", &[("draft_id", draft_id)]);
        if let Some(ctx) = self.cache.get_as::<LeagueContext>(&key) {
            return ctx;
        }

        match self.fetch_league_for_draft(draft_id).await {
            Ok(league) => {
                let template = league.roster_template().unwrap_or_else(|| {
                    debug!(league_id = %league.league_id, "league has no roster positions, using default template");
                    self.roster_defaults.default_template.clone()
                });
                let name = if league.name.trim().is_empty() {
                    self.roster_defaults.default_league_name.clone()
                } else {
                    league.name
                };
                let ctx = LeagueContext {
                    league_name: name,
                    template,
                };
                self.cache.insert_as(key, &ctx);
                ctx
            }
            Err(e) => {
                warn!(draft_id, error = %e, "league lookup failed, using default roster");
                self.default_context()
            }
        }
    }

    async fn fetch_league_for_draft(&self, draft_id: &str) -> Result<League, ServiceError> {
        let draft = self.source.fetch_draft(draft_id).await?;
        let league_id = draft
            .league_id
            .ok_or_else(|| ServiceError::not_found(format!("draft {draft_id} has no league")))?;
        Ok(self.source.fetch_league(&league_id).await?)
    }

    fn default_context(&self) -> LeagueContext {
        LeagueContext {
            league_name: self.roster_defaults.default_league_name.clone(),
            template: self.roster_defaults.default_template.clone(),
        }
    }
}

fn history_records(
    draft_id: &str,
    team_on_clock: &str,
    strategy: Strategy,
    ranked: &[RankedPick],
    created_at: i64,
) -> Vec<RecommendationRecord> {
    ranked
        .iter()
        .enumerate()
        .map(|(i, pick)| RecommendationRecord {
            draft_id: draft_id.to_string(),
            team_on_clock: team_on_clock.to_string(),
            strategy: strategy.as_str().to_string(),
            rank: i as u32 + 1,
            player_id: pick.player_id.clone(),
            reason: pick.reason.clone(),
            fit: pick.fit.as_str().to_string(),
            score: pick.score,
            components: pick.components,
            created_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::draft::pick::Position;
    use crate::draft::player::{InjuryStatus, Player};
    use crate::persist::{self, PersistWorker};
    use crate::sleeper::UpstreamError;

    // -- fake upstream --

    #[derive(Default)]
    struct FakeSleeper {
        players: Vec<Player>,
        picks: HashMap<String, Vec<Pick>>,
        drafts: HashMap<String, Draft>,
        leagues: HashMap<String, League>,
        users: HashMap<String, User>,
        user_leagues: HashMap<String, Vec<League>>,
        league_drafts: HashMap<String, Vec<Draft>>,
        pick_fetches: AtomicUsize,
    }

    fn not_found(what: &str) -> UpstreamError {
        UpstreamError::Status {
            url: format!("fake://{what}"),
            status: 404,
        }
    }

    #[async_trait]
    impl SportsData for FakeSleeper {
        async fn fetch_players(&self) -> Result<Vec<Player>, UpstreamError> {
            Ok(self.players.clone())
        }
        async fn fetch_picks(&self, draft_id: &str) -> Result<Vec<Pick>, UpstreamError> {
            self.pick_fetches.fetch_add(1, Ordering::SeqCst);
            self.picks
                .get(draft_id)
                .cloned()
                .ok_or_else(|| not_found("picks"))
        }
        async fn fetch_draft(&self, draft_id: &str) -> Result<Draft, UpstreamError> {
            self.drafts.get(draft_id).cloned().ok_or_else(|| not_found("draft"))
        }
        async fn fetch_league(&self, league_id: &str) -> Result<League, UpstreamError> {
            self.leagues.get(league_id).cloned().ok_or_else(|| not_found("league"))
        }
        async fn fetch_user(&self, username: &str) -> Result<Option<User>, UpstreamError> {
            Ok(self.users.get(username).cloned())
        }
        async fn fetch_user_leagues(
            &self,
            user_id: &str,
            _season: &str,
        ) -> Result<Vec<League>, UpstreamError> {
            Ok(self.user_leagues.get(user_id).cloned().unwrap_or_default())
        }
        async fn fetch_league_drafts(&self, league_id: &str) -> Result<Vec<Draft>, UpstreamError> {
            Ok(self.league_drafts.get(league_id).cloned().unwrap_or_default())
        }
    }

    fn player(
        id: &str,
        pos: Position,
        projection: f64,
        adp: f64,
        tier: u32,
        injury: InjuryStatus,
    ) -> Player {
        Player {
            player_id: id.into(),
            full_name: format!("Player {id}"),
            position: Some(pos),
            team: Some("KC".into()),
            adp: Some(adp),
            tier: Some(tier),
            projection: Some(projection),
            bye_week: Some(10),
            injury_status: Some(injury),
            news: None,
            metadata: serde_json::Value::Null,
        }
    }

    fn pick(draft_id: &str, pick_no: u32, roster_id: &str, player_id: &str) -> Pick {
        Pick {
            draft_id: draft_id.into(),
            round: 1,
            pick: pick_no,
            pick_no,
            roster_id: roster_id.into(),
            player_id: Some(player_id.into()),
            timestamp: None,
            metadata: serde_json::Value::Null,
        }
    }

    fn league(id: &str, name: &str, positions: &[&str]) -> League {
        League {
            league_id: id.into(),
            name: name.into(),
            season: "2025".into(),
            sport: "nfl".into(),
            status: "drafting".into(),
            roster_positions: positions.iter().map(|s| s.to_string()).collect(),
            scoring_settings: serde_json::Value::Null,
        }
    }

    fn draft(id: &str, league_id: Option<&str>) -> Draft {
        Draft {
            draft_id: id.into(),
            league_id: league_id.map(str::to_string),
            draft_type: "snake".into(),
            status: "drafting".into(),
            settings: serde_json::Value::Null,
            draft_order: serde_json::Value::Null,
        }
    }

    fn defaults() -> RosterDefaults {
        RosterDefaults {
            default_template: RosterTemplate::from_strs(&[
                "QB", "RB", "RB", "WR", "WR", "TE", "FLEX", "K", "DEF", "BN",
            ]),
            default_league_name: "Fantasy League".into(),
        }
    }

    fn build(fake: FakeSleeper) -> (Recommender, Arc<FakeSleeper>, Arc<Database>, PersistWorker) {
        let fake = Arc::new(fake);
        let db = Arc::new(Database::open(":memory:").unwrap());
        let sync = Arc::new(PlayerSync::new(
            Arc::clone(&db),
            fake.clone() as Arc<dyn SportsData>,
            Duration::from_secs(3600),
            Duration::from_secs(60),
        ));
        let (queue, worker) = persist::spawn(Arc::clone(&db), 32);
        let recommender = Recommender::new(
            fake.clone() as Arc<dyn SportsData>,
            sync,
            Arc::clone(&db),
            Arc::new(ResponseCache::new(Duration::from_secs(3))),
            Arc::new(LlmClient::Disabled),
            queue,
            WeightTable::default(),
            defaults(),
            8,
        );
        (recommender, fake, db, worker)
    }

    fn three_player_pool() -> FakeSleeper {
        let mut fake = FakeSleeper {
            players: vec![
                player("rb1", Position::RunningBack, 300.0, 5.0, 1, InjuryStatus::Healthy),
                player("wr1", Position::WideReceiver, 280.0, 8.0, 1, InjuryStatus::Healthy),
                player("rb2", Position::RunningBack, 250.0, 10.0, 2, InjuryStatus::Out),
            ],
            ..Default::default()
        };
        fake.picks.insert("D1".into(), vec![]);
        fake
    }

    // -- request validation --

    #[test]
    fn strategy_defaults_to_balanced() {
        assert_eq!(parse_strategy(None).unwrap(), Strategy::Balanced);
        assert_eq!(parse_strategy(Some(" ")).unwrap(), Strategy::Balanced);
        assert_eq!(parse_strategy(Some("UPSIDE")).unwrap(), Strategy::Upside);
    }

    #[test]
    fn unknown_strategy_rejected() {
        assert!(matches!(
            parse_strategy(Some("yolo")),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn missing_ids_rejected() {
        let req = RecommendRequest {
            draft_id: "".into(),
            team_on_clock: "1".into(),
            strategy: None,
        };
        assert!(matches!(req.validate(), Err(ServiceError::Validation(_))));

        let req = RecommendRequest {
            draft_id: "D1".into(),
            team_on_clock: "  ".into(),
            strategy: None,
        };
        assert!(matches!(req.validate(), Err(ServiceError::Validation(_))));
    }

    // -- orchestration --

    #[tokio::test]
    async fn recommend_without_llm_returns_engine_list() {
        let (rec, _fake, db, worker) = build(three_player_pool());

        let resp = rec.recommend("D1", "1", Strategy::Balanced).await.unwrap();
        assert!(!resp.llm_enabled);
        assert_eq!(resp.strategy, Strategy::Balanced);
        assert_eq!(resp.ranked.len(), 3);

        let ids: Vec<&str> = resp.ranked.iter().map(|p| p.player_id.as_str()).collect();
        let rb1 = ids.iter().position(|&i| i == "rb1").unwrap();
        let rb2 = ids.iter().position(|&i| i == "rb2").unwrap();
        assert!(rb1 < rb2);
        assert_eq!(resp.ranked[rb2].components.injury_penalty, 50.0);
        assert_eq!(resp.ranked[rb1].components.injury_penalty, 0.0);
        assert_eq!(resp.ranked.last().unwrap().edge_vs_next, 0.0);

        worker.shutdown().await;
        let history = db.recent_recommendations("D1", 10).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].rank, 1);
        assert_eq!(history[0].player_id, resp.ranked[0].player_id);
    }

    #[tokio::test]
    async fn drafted_players_never_recommended() {
        let mut fake = three_player_pool();
        fake.picks.insert("D1".into(), vec![pick("D1", 1, "2", "rb1")]);
        let (rec, _fake, _db, worker) = build(fake);

        let resp = rec.recommend("D1", "1", Strategy::Safe).await.unwrap();
        assert!(resp.ranked.iter().all(|p| p.player_id != "rb1"));
        assert_eq!(resp.ranked.len(), 2);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn upstream_pick_failure_is_surfaced() {
        let (rec, _fake, _db, worker) = build(three_player_pool());
        let err = rec.recommend("missing", "1", Strategy::Balanced).await.unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn picks_are_cached() {
        let (rec, fake, _db, worker) = build(three_player_pool());
        rec.picks("D1").await.unwrap();
        rec.picks("D1").await.unwrap();
        assert_eq!(fake.pick_fetches.load(Ordering::SeqCst), 1);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn league_context_uses_league_roster() {
        let mut fake = three_player_pool();
        fake.drafts.insert("D1".into(), draft("D1", Some("L1")));
        fake.leagues
            .insert("L1".into(), league("L1", "Dynasty Bros", &["QB", "SUPER_FLEX", "BN"]));
        let (rec, _fake, _db, worker) = build(fake);

        let ctx = rec.league_context("D1").await;
        assert_eq!(ctx.league_name, "Dynasty Bros");
        assert_eq!(ctx.template.labels(), &["QB", "SUPER_FLEX", "BN"]);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn league_context_falls_back_to_defaults() {
        let mut fake = three_player_pool();
        fake.drafts.insert("D2".into(), draft("D2", None));
        fake.drafts.insert("D3".into(), draft("D3", Some("L-empty")));
        fake.leagues.insert("L-empty".into(), league("L-empty", "", &[]));
        let (rec, _fake, _db, worker) = build(fake);

        // Unknown draft.
        let ctx = rec.league_context("nope").await;
        assert_eq!(ctx.league_name, "Fantasy League");
        assert_eq!(ctx.template.labels().len(), 10);

        // Draft without a league.
        assert_eq!(rec.league_context("D2").await.league_name, "Fantasy League");

        // League without name or positions.
        let ctx = rec.league_context("D3").await;
        assert_eq!(ctx.league_name, "Fantasy League");
        assert_eq!(ctx.template.labels()[0], "QB");
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn discover_persists_user_and_leagues() {
        let mut fake = three_player_pool();
        fake.users.insert(
            "coach".into(),
            User {
                user_id: "u1".into(),
                username: "coach".into(),
                display_name: Some("Coach".into()),
                avatar: None,
            },
        );
        fake.user_leagues
            .insert("u1".into(), vec![league("L1", "Alpha", &["QB"]), league("L2", "Beta", &["QB"])]);
        let (rec, _fake, db, worker) = build(fake);

        let found = rec.discover("coach", "2025").await.unwrap();
        assert_eq!(found.user.user_id, "u1");
        assert_eq!(found.leagues.len(), 2);

        worker.shutdown().await;
        assert!(db.get_user("u1").unwrap().is_some());
        assert_eq!(db.user_leagues("u1", "2025").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn discover_unknown_user_is_not_found() {
        let (rec, _fake, _db, worker) = build(three_player_pool());
        assert!(matches!(
            rec.discover("ghost", "2025").await,
            Err(ServiceError::NotFound(_))
        ));
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn drafts_lookup_persists() {
        let mut fake = three_player_pool();
        fake.league_drafts.insert("L1".into(), vec![draft("D1", Some("L1"))]);
        let (rec, _fake, db, worker) = build(fake);

        assert_eq!(rec.drafts("L1").await.unwrap().len(), 1);
        worker.shutdown().await;
        assert_eq!(db.drafts_for_league("L1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_reads_back_latest_batch() {
        let (rec, _fake, _db, _worker) = build(three_player_pool());
        let records = history_records(
            "D9",
            "4",
            Strategy::Upside,
            &[RankedPick {
                player_id: "rb1".into(),
                reason: "x".into(),
                fit: crate::llm::rerank::Fit::Need,
                edge_vs_next: 0.0,
                score: 10.0,
                components: Default::default(),
            }],
            1_700_000_000,
        );
        rec.db.insert_recommendations(&records).unwrap();

        let history = rec.history("D9", 5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].fit, "need");
        assert_eq!(history[0].strategy, "upside");
    }
}
