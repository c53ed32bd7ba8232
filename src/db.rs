// SQLite persistence layer for Sleeper data and recommendation history.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::draft::league::{Draft, League, User, UserLeague};
use crate::draft::pick::{Pick, Position};
use crate::draft::player::{InjuryStatus, Player, PlayerCatalog};
use crate::valuation::scoring::ScoreComponents;

/// One stored recommendation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub draft_id: String,
    pub team_on_clock: String,
    pub strategy: String,
    /// 1-based position in the returned list.
    pub rank: u32,
    pub player_id: String,
    pub reason: String,
    pub fit: String,
    pub score: f64,
    #[serde(flatten)]
    pub components: ScoreComponents,
    /// Unix seconds.
    pub created_at: i64,
}

/// SQLite-backed persistence for users, leagues, drafts, picks, the player
/// catalog and recommendation history.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                user_id      TEXT PRIMARY KEY,
                username     TEXT NOT NULL,
                display_name TEXT,
                avatar       TEXT,
                updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS leagues (
                league_id        TEXT PRIMARY KEY,
                name             TEXT NOT NULL,
                season           TEXT NOT NULL,
                sport            TEXT NOT NULL DEFAULT 'nfl',
                status           TEXT NOT NULL DEFAULT 'active',
                roster_positions TEXT,
                scoring_settings TEXT,
                updated_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS user_leagues (
                user_id   TEXT NOT NULL,
                league_id TEXT NOT NULL,
                role      TEXT NOT NULL DEFAULT 'member',
                PRIMARY KEY (user_id, league_id)
            );

            CREATE TABLE IF NOT EXISTS drafts (
                draft_id    TEXT PRIMARY KEY,
                league_id   TEXT,
                type        TEXT NOT NULL DEFAULT 'snake',
                status      TEXT NOT NULL DEFAULT 'pre_draft',
                settings    TEXT,
                draft_order TEXT,
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS picks (
                draft_id  TEXT NOT NULL,
                pick_no   INTEGER NOT NULL,
                round     INTEGER NOT NULL,
                pick      INTEGER NOT NULL,
                roster_id TEXT NOT NULL,
                player_id TEXT,
                timestamp INTEGER,
                metadata  TEXT,
                PRIMARY KEY (draft_id, pick_no)
            );

            CREATE TABLE IF NOT EXISTS players (
                player_id     TEXT PRIMARY KEY,
                full_name     TEXT NOT NULL,
                position      TEXT,
                team          TEXT,
                adp           REAL,
                tier          INTEGER,
                projection    REAL,
                bye_week      INTEGER,
                injury_status TEXT,
                news          TEXT,
                metadata      TEXT,
                updated_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS recommendations (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                draft_id       TEXT NOT NULL,
                team_on_clock  TEXT NOT NULL,
                strategy       TEXT NOT NULL,
                rank           INTEGER NOT NULL,
                player_id      TEXT NOT NULL,
                reason         TEXT NOT NULL,
                fit            TEXT NOT NULL,
                score          REAL NOT NULL,
                vorp           REAL NOT NULL,
                adp_discount   REAL NOT NULL,
                need_boost     REAL NOT NULL,
                scarcity_boost REAL NOT NULL,
                bye_penalty    REAL NOT NULL,
                injury_penalty REAL NOT NULL,
                upside_bonus   REAL NOT NULL,
                created_at     INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_recommendations_draft_id ON recommendations(draft_id);
            CREATE INDEX IF NOT EXISTS idx_drafts_league_id ON drafts(league_id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Users and leagues
    // ------------------------------------------------------------------

    pub fn upsert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO users (user_id, username, display_name, avatar)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                username     = excluded.username,
                display_name = excluded.display_name,
                avatar       = excluded.avatar,
                updated_at   = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![user.user_id, user.username, user.display_name, user.avatar],
        )
        .context("failed to upsert user")?;
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT user_id, username, display_name, avatar FROM users WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(User {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    display_name: row.get(2)?,
                    avatar: row.get(3)?,
                })
            },
        )
        .optional()
        .context("failed to query user")
    }

    pub fn upsert_league(&self, league: &League) -> Result<()> {
        let conn = self.conn();
        let roster_json = serde_json::to_string(&league.roster_positions)
            .context("failed to serialize roster_positions")?;
        let scoring_json = serde_json::to_string(&league.scoring_settings)
            .context("failed to serialize scoring_settings")?;
        conn.execute(
            "INSERT INTO leagues (league_id, name, season, sport, status, roster_positions, scoring_settings)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(league_id) DO UPDATE SET
                name             = excluded.name,
                season           = excluded.season,
                sport            = excluded.sport,
                status           = excluded.status,
                roster_positions = excluded.roster_positions,
                scoring_settings = excluded.scoring_settings,
                updated_at       = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![
                league.league_id,
                league.name,
                league.season,
                league.sport,
                league.status,
                roster_json,
                scoring_json,
            ],
        )
        .context("failed to upsert league")?;
        Ok(())
    }

    pub fn link_user_league(&self, link: &UserLeague) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO user_leagues (user_id, league_id, role) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, league_id) DO UPDATE SET role = excluded.role",
            params![link.user_id, link.league_id, link.role],
        )
        .context("failed to link user to league")?;
        Ok(())
    }

    /// Leagues a user belongs to for one season, ordered by name.
    pub fn user_leagues(&self, user_id: &str, season: &str) -> Result<Vec<League>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT l.league_id, l.name, l.season, l.sport, l.status,
                        l.roster_positions, l.scoring_settings
                 FROM leagues l
                 JOIN user_leagues ul ON l.league_id = ul.league_id
                 WHERE ul.user_id = ?1 AND l.season = ?2
                 ORDER BY l.name",
            )
            .context("failed to prepare user_leagues query")?;

        let leagues = stmt
            .query_map(params![user_id, season], league_from_row)
            .context("failed to query user leagues")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map league rows")?;
        Ok(leagues)
    }

    // ------------------------------------------------------------------
    // Drafts and picks
    // ------------------------------------------------------------------

    pub fn upsert_draft(&self, draft: &Draft) -> Result<()> {
        let conn = self.conn();
        let settings_json =
            serde_json::to_string(&draft.settings).context("failed to serialize settings")?;
        let order_json =
            serde_json::to_string(&draft.draft_order).context("failed to serialize draft_order")?;
        conn.execute(
            "INSERT INTO drafts (draft_id, league_id, type, status, settings, draft_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(draft_id) DO UPDATE SET
                league_id   = excluded.league_id,
                type        = excluded.type,
                status      = excluded.status,
                settings    = excluded.settings,
                draft_order = excluded.draft_order,
                updated_at  = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![
                draft.draft_id,
                draft.league_id,
                draft.draft_type,
                draft.status,
                settings_json,
                order_json,
            ],
        )
        .context("failed to upsert draft")?;
        Ok(())
    }

    pub fn drafts_for_league(&self, league_id: &str) -> Result<Vec<Draft>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT draft_id, league_id, type, status, settings, draft_order
                 FROM drafts WHERE league_id = ?1 ORDER BY draft_id",
            )
            .context("failed to prepare drafts_for_league query")?;

        let drafts = stmt
            .query_map(params![league_id], |row| {
                Ok(Draft {
                    draft_id: row.get(0)?,
                    league_id: row.get(1)?,
                    draft_type: row.get(2)?,
                    status: row.get(3)?,
                    settings: json_column(row, 4)?,
                    draft_order: json_column(row, 5)?,
                })
            })
            .context("failed to query drafts")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map draft rows")?;
        Ok(drafts)
    }

    /// Record picks in one transaction. A pick already stored under the same
    /// `(draft_id, pick_no)` is updated in place.
    pub fn record_picks(&self, picks: &[Pick]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin picks transaction")?;

        for pick in picks {
            let metadata_json =
                serde_json::to_string(&pick.metadata).context("failed to serialize metadata")?;
            tx.execute(
                "INSERT INTO picks (draft_id, pick_no, round, pick, roster_id, player_id, timestamp, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(draft_id, pick_no) DO UPDATE SET
                    round     = excluded.round,
                    pick      = excluded.pick,
                    roster_id = excluded.roster_id,
                    player_id = excluded.player_id,
                    timestamp = excluded.timestamp,
                    metadata  = excluded.metadata",
                params![
                    pick.draft_id,
                    pick.pick_no,
                    pick.round,
                    pick.pick,
                    pick.roster_id,
                    pick.player_id,
                    pick.timestamp,
                    metadata_json,
                ],
            )
            .context("failed to record pick")?;
        }

        tx.commit().context("failed to commit picks")?;
        Ok(())
    }

    /// Picks for a draft, ordered by overall pick number.
    pub fn load_picks(&self, draft_id: &str) -> Result<Vec<Pick>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT draft_id, round, pick, pick_no, roster_id, player_id, timestamp, metadata
                 FROM picks WHERE draft_id = ?1 ORDER BY pick_no",
            )
            .context("failed to prepare load_picks query")?;

        let picks = stmt
            .query_map(params![draft_id], |row| {
                Ok(Pick {
                    draft_id: row.get(0)?,
                    round: row.get(1)?,
                    pick: row.get(2)?,
                    pick_no: row.get(3)?,
                    roster_id: row.get(4)?,
                    player_id: row.get(5)?,
                    timestamp: row.get(6)?,
                    metadata: json_column(row, 7)?,
                })
            })
            .context("failed to query picks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map pick rows")?;
        Ok(picks)
    }

    // ------------------------------------------------------------------
    // Player catalog
    // ------------------------------------------------------------------

    /// Insert or update players in a single transaction. Existing rows keep
    /// their rowid, so catalog order is stable across syncs.
    pub fn upsert_players(&self, players: &[Player]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin players transaction")?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO players
                        (player_id, full_name, position, team, adp, tier, projection,
                         bye_week, injury_status, news, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT(player_id) DO UPDATE SET
                        full_name     = excluded.full_name,
                        position      = excluded.position,
                        team          = excluded.team,
                        adp           = excluded.adp,
                        tier          = excluded.tier,
                        projection    = excluded.projection,
                        bye_week      = excluded.bye_week,
                        injury_status = excluded.injury_status,
                        news          = excluded.news,
                        metadata      = excluded.metadata,
                        updated_at    = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                )
                .context("failed to prepare player upsert")?;

            for p in players {
                let metadata_json =
                    serde_json::to_string(&p.metadata).context("failed to serialize metadata")?;
                stmt.execute(params![
                    p.player_id,
                    p.full_name,
                    p.position.map(|pos| pos.display_str()),
                    p.team,
                    p.adp,
                    p.tier,
                    p.projection,
                    p.bye_week,
                    p.injury_status.map(|s| s.as_str()),
                    p.news,
                    metadata_json,
                ])
                .context("failed to upsert player")?;
            }
        }

        tx.commit().context("failed to commit players")?;
        Ok(())
    }

    /// The full persisted catalog in first-insertion order.
    pub fn load_players(&self) -> Result<PlayerCatalog> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player_id, full_name, position, team, adp, tier, projection,
                        bye_week, injury_status, news, metadata
                 FROM players ORDER BY rowid",
            )
            .context("failed to prepare load_players query")?;

        let players = stmt
            .query_map([], |row| {
                let position: Option<String> = row.get(2)?;
                let injury: Option<String> = row.get(8)?;
                Ok(Player {
                    player_id: row.get(0)?,
                    full_name: row.get(1)?,
                    position: position.as_deref().and_then(Position::from_str_pos),
                    team: row.get(3)?,
                    adp: row.get(4)?,
                    tier: row.get(5)?,
                    projection: row.get(6)?,
                    bye_week: row.get(7)?,
                    injury_status: injury.as_deref().and_then(InjuryStatus::parse),
                    news: row.get(9)?,
                    metadata: json_column(row, 10)?,
                })
            })
            .context("failed to query players")?
            .collect::<std::result::Result<PlayerCatalog, _>>()
            .context("failed to map player rows")?;
        Ok(players)
    }

    pub fn player_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))
            .context("failed to count players")?;
        Ok(count as usize)
    }

    // ------------------------------------------------------------------
    // Recommendation history
    // ------------------------------------------------------------------

    /// Append recommendation rows. History is never updated in place.
    pub fn insert_recommendations(&self, records: &[RecommendationRecord]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin recommendations transaction")?;

        for r in records {
            let c = &r.components;
            tx.execute(
                "INSERT INTO recommendations
                    (draft_id, team_on_clock, strategy, rank, player_id, reason, fit, score,
                     vorp, adp_discount, need_boost, scarcity_boost, bye_penalty,
                     injury_penalty, upside_bonus, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    r.draft_id,
                    r.team_on_clock,
                    r.strategy,
                    r.rank,
                    r.player_id,
                    r.reason,
                    r.fit,
                    r.score,
                    c.vorp,
                    c.adp_discount,
                    c.need_boost,
                    c.scarcity_boost,
                    c.bye_penalty,
                    c.injury_penalty,
                    c.upside_bonus,
                    r.created_at,
                ],
            )
            .context("failed to insert recommendation")?;
        }

        tx.commit().context("failed to commit recommendations")?;
        Ok(())
    }

    /// Most recent recommendations for a draft, newest batch first and in
    /// rank order within a batch.
    pub fn recent_recommendations(
        &self,
        draft_id: &str,
        limit: usize,
    ) -> Result<Vec<RecommendationRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT draft_id, team_on_clock, strategy, rank, player_id, reason, fit, score,
                        vorp, adp_discount, need_boost, scarcity_boost, bye_penalty,
                        injury_penalty, upside_bonus, created_at
                 FROM recommendations WHERE draft_id = ?1
                 ORDER BY created_at DESC, id ASC
                 LIMIT ?2",
            )
            .context("failed to prepare recent_recommendations query")?;

        let records = stmt
            .query_map(params![draft_id, limit as i64], |row| {
                Ok(RecommendationRecord {
                    draft_id: row.get(0)?,
                    team_on_clock: row.get(1)?,
                    strategy: row.get(2)?,
                    rank: row.get(3)?,
                    player_id: row.get(4)?,
                    reason: row.get(5)?,
                    fit: row.get(6)?,
                    score: row.get(7)?,
                    components: ScoreComponents {
                        vorp: row.get(8)?,
                        adp_discount: row.get(9)?,
                        need_boost: row.get(10)?,
                        scarcity_boost: row.get(11)?,
                        bye_penalty: row.get(12)?,
                        injury_penalty: row.get(13)?,
                        upside_bonus: row.get(14)?,
                    },
                    created_at: row.get(15)?,
                })
            })
            .context("failed to query recommendations")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map recommendation rows")?;
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

/// Decode a nullable JSON text column. NULL and undecodable text read as
/// `Value::Null`.
fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<serde_json::Value> {
    let text: Option<String> = row.get(idx)?;
    Ok(text
        .and_then(|t| serde_json::from_str(&t).ok())
        .unwrap_or(serde_json::Value::Null))
}

fn league_from_row(row: &Row<'_>) -> rusqlite::Result<League> {
    let roster_json: Option<String> = row.get(5)?;
    let roster_positions = roster_json
        .and_then(|t| serde_json::from_str::<Vec<String>>(&t).ok())
        .unwrap_or_default();
    Ok(League {
        league_id: row.get(0)?,
        name: row.get(1)?,
        season: row.get(2)?,
        sport: row.get(3)?,
        status: row.get(4)?,
        roster_positions,
        scoring_settings: json_column(row, 6)?,
    })
}
