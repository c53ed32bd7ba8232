// Player catalog synchronization with debounce, retry backoff and a
// periodic background refresh.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::draft::player::{Player, PlayerCatalog};
use crate::error::ServiceError;
use crate::sleeper::SportsData;

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Updated,
    Skipped,
}

/// Where the returned catalog came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncSource {
    Sleeper,
    Database,
}

/// Why a sync was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Last success is younger than the sync interval.
    #[serde(rename = "recent-sync")]
    RecentSync,
    /// Last attempt is younger than the minimum retry spacing.
    #[serde(rename = "retry-window")]
    RetryWindow,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub reason: Option<SkipReason>,
    /// Players written by this call; 0 when skipped.
    pub synced: usize,
    pub last_synced: Option<DateTime<Utc>>,
    pub source: SyncSource,
    pub player_count: usize,
    #[serde(skip)]
    pub players: Arc<PlayerCatalog>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusReport {
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_synced: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub interval_secs: u64,
    pub min_retry_secs: u64,
}

// ---------------------------------------------------------------------------
// Sync state
// ---------------------------------------------------------------------------

/// Monotonic instants drive the debounce; wall-clock times are for reporting.
#[derive(Debug, Default)]
struct SyncState {
    last_attempt: Option<Instant>,
    last_success: Option<Instant>,
    last_attempt_at: Option<DateTime<Utc>>,
    last_synced_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// PlayerSync
// ---------------------------------------------------------------------------

/// Owns the player catalog: loads it from the database, refreshes it from
/// upstream at most once per interval, and serves it to the engine.
pub struct PlayerSync {
    db: Arc<Database>,
    source: Arc<dyn SportsData>,
    interval: Duration,
    min_retry: Duration,
    /// Held for the whole fetch-and-store so only one refresh runs at a time.
    sync_lock: tokio::sync::Mutex<()>,
    state: Mutex<SyncState>,
    catalog: RwLock<Option<Arc<PlayerCatalog>>>,
}

impl PlayerSync {
    pub fn new(
        db: Arc<Database>,
        source: Arc<dyn SportsData>,
        interval: Duration,
        min_retry: Duration,
    ) -> Self {
        Self {
            db,
            source,
            interval,
            min_retry,
            sync_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(SyncState::default()),
            catalog: RwLock::new(None),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SyncState> {
        self.state.lock().expect("sync state mutex poisoned")
    }

    fn skip_reason(&self) -> Option<SkipReason> {
        let now = Instant::now();
        let state = self.state();
        if state
            .last_success
            .is_some_and(|t| now.duration_since(t) < self.interval)
        {
            return Some(SkipReason::RecentSync);
        }
        if state
            .last_attempt
            .is_some_and(|t| now.duration_since(t) < self.min_retry)
        {
            return Some(SkipReason::RetryWindow);
        }
        None
    }

    /// Refresh the catalog from upstream unless a recent sync or attempt makes
    /// it redundant. `force` bypasses both checks.
    pub async fn sync_players(&self, force: bool) -> Result<SyncOutcome, ServiceError> {
        if !force {
            if let Some(reason) = self.skip_reason() {
                return self.skipped(reason).await;
            }
        }

        let _guard = self.sync_lock.lock().await;

        // Another caller may have finished a sync while we waited.
        if !force {
            if let Some(reason) = self.skip_reason() {
                return self.skipped(reason).await;
            }
        }

        self.refresh(force).await
    }

    /// Fetch, store and publish the catalog. Callers hold `sync_lock`.
    async fn refresh(&self, force: bool) -> Result<SyncOutcome, ServiceError> {
        {
            let mut state = self.state();
            state.last_attempt = Some(Instant::now());
            state.last_attempt_at = Some(Utc::now());
        }

        info!(force, "syncing players from upstream");
        let fetched = match self.source.fetch_players().await {
            Ok(players) => players,
            Err(e) => {
                warn!(error = %e, "player sync failed");
                self.state().last_error = Some(e.to_string());
                return Err(e.into());
            }
        };

        let players: Vec<Player> = fetched.into_iter().filter(|p| p.has_usable_name()).collect();
        let synced = players.len();

        let db = Arc::clone(&self.db);
        let stored = tokio::task::spawn_blocking(move || {
            db.upsert_players(&players)?;
            db.load_players()
        })
        .await
        .map_err(anyhow::Error::from)
        .and_then(|r| r);

        let catalog = match stored {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                warn!(error = %e, "failed to store synced players");
                self.state().last_error = Some(format!("{e:#}"));
                return Err(ServiceError::Internal(e));
            }
        };

        let last_synced = {
            let mut state = self.state();
            state.last_success = Some(Instant::now());
            let now = Utc::now();
            state.last_synced_at = Some(now);
            state.last_error = None;
            now
        };
        self.set_catalog(Arc::clone(&catalog));
        info!(synced, total = catalog.len(), "player sync complete");

        Ok(SyncOutcome {
            status: SyncStatus::Updated,
            reason: None,
            synced,
            last_synced: Some(last_synced),
            source: SyncSource::Sleeper,
            player_count: catalog.len(),
            players: catalog,
        })
    }

    async fn skipped(&self, reason: SkipReason) -> Result<SyncOutcome, ServiceError> {
        debug!(?reason, "player sync skipped");
        let players = self.stored_catalog().await?;
        Ok(SyncOutcome {
            status: SyncStatus::Skipped,
            reason: Some(reason),
            synced: 0,
            last_synced: self.state().last_synced_at,
            source: SyncSource::Database,
            player_count: players.len(),
            players,
        })
    }

    /// The in-memory catalog, falling back to the database. May be empty.
    async fn stored_catalog(&self) -> Result<Arc<PlayerCatalog>, ServiceError> {
        if let Some(catalog) = self.cached_catalog() {
            return Ok(catalog);
        }
        let db = Arc::clone(&self.db);
        let catalog = tokio::task::spawn_blocking(move || db.load_players())
            .await
            .map_err(anyhow::Error::from)??;
        let catalog = Arc::new(catalog);
        if !catalog.is_empty() {
            self.set_catalog(Arc::clone(&catalog));
        }
        Ok(catalog)
    }

    /// The persisted catalog, or a forced sync when nothing is stored yet.
    pub async fn ensure_players_loaded(&self) -> Result<Arc<PlayerCatalog>, ServiceError> {
        let catalog = self.stored_catalog().await?;
        if !catalog.is_empty() {
            return Ok(catalog);
        }
        self.sync_if_empty().await
    }

    /// Initial load shared by concurrent cold-start callers: whoever gets the
    /// lock first fetches, the rest reuse its catalog.
    async fn sync_if_empty(&self) -> Result<Arc<PlayerCatalog>, ServiceError> {
        let _guard = self.sync_lock.lock().await;
        if let Some(catalog) = self.cached_catalog().filter(|c| !c.is_empty()) {
            debug!("catalog loaded by a concurrent sync");
            return Ok(catalog);
        }
        info!("player catalog empty, forcing initial sync");
        Ok(self.refresh(true).await?.players)
    }

    fn cached_catalog(&self) -> Option<Arc<PlayerCatalog>> {
        self.catalog
            .read()
            .expect("catalog lock poisoned")
            .as_ref()
            .map(Arc::clone)
    }

    fn set_catalog(&self, catalog: Arc<PlayerCatalog>) {
        *self.catalog.write().expect("catalog lock poisoned") = Some(catalog);
    }

    pub fn status(&self) -> SyncStatusReport {
        let state = self.state();
        SyncStatusReport {
            last_attempt: state.last_attempt_at,
            last_synced: state.last_synced_at,
            last_error: state.last_error.clone(),
            interval_secs: self.interval.as_secs(),
            min_retry_secs: self.min_retry.as_secs(),
        }
    }

    /// Spawn the background refresh loop. Returns `None` when the sync
    /// interval is 0.
    ///
    /// The loop stops when `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn_periodic(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        if self.interval.is_zero() {
            info!("periodic player sync disabled");
            return None;
        }

        let period = self.interval.max(self.min_retry);
        let sync = Arc::clone(self);
        info!(period_secs = period.as_secs(), "starting periodic player sync");

        Some(tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                if let Err(e) = sync.sync_players(false).await {
                    warn!(error = %e, "background player sync failed");
                }
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("periodic player sync stopped");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::league::{Draft, League, User};
    use crate::draft::pick::{Pick, Position};
    use crate::sleeper::UpstreamError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Fake upstream that counts player fetches and can be told to fail.
    #[derive(Default)]
    struct FakeSource {
        fetches: AtomicUsize,
        fail: AtomicBool,
    }

    fn player(id: &str, name: &str) -> Player {
        Player {
            player_id: id.into(),
            full_name: name.into(),
            position: Some(Position::WideReceiver),
            team: None,
            adp: None,
            tier: None,
            projection: Some(200.0),
            bye_week: None,
            injury_status: None,
            news: None,
            metadata: serde_json::Value::Null,
        }
    }

    #[async_trait]
    impl SportsData for FakeSource {
        async fn fetch_players(&self) -> Result<Vec<Player>, UpstreamError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(UpstreamError::Timeout {
                    url: "fake://players".into(),
                });
            }
            Ok(vec![player("1", "Ja'Marr Chase"), player("2", " "), player("3", "CeeDee Lamb")])
        }
        async fn fetch_picks(&self, _: &str) -> Result<Vec<Pick>, UpstreamError> {
            Ok(vec![])
        }
        async fn fetch_draft(&self, id: &str) -> Result<Draft, UpstreamError> {
            Err(UpstreamError::Status { url: id.into(), status: 404 })
        }
        async fn fetch_league(&self, id: &str) -> Result<League, UpstreamError> {
            Err(UpstreamError::Status { url: id.into(), status: 404 })
        }
        async fn fetch_user(&self, _: &str) -> Result<Option<User>, UpstreamError> {
            Ok(None)
        }
        async fn fetch_user_leagues(&self, _: &str, _: &str) -> Result<Vec<League>, UpstreamError> {
            Ok(vec![])
        }
        async fn fetch_league_drafts(&self, _: &str) -> Result<Vec<Draft>, UpstreamError> {
            Ok(vec![])
        }
    }

    fn setup(interval: u64, min_retry: u64) -> (Arc<PlayerSync>, Arc<FakeSource>) {
        let db = Arc::new(Database::open(":memory:").unwrap());
        let source = Arc::new(FakeSource::default());
        let sync = Arc::new(PlayerSync::new(
            db,
            source.clone(),
            Duration::from_secs(interval),
            Duration::from_secs(min_retry),
        ));
        (sync, source)
    }

    #[tokio::test(start_paused = true)]
    async fn first_sync_updates_and_drops_blank_names() {
        let (sync, source) = setup(21600, 300);
        let outcome = sync.sync_players(false).await.unwrap();

        assert_eq!(outcome.status, SyncStatus::Updated);
        assert_eq!(outcome.source, SyncSource::Sleeper);
        assert_eq!(outcome.synced, 2);
        assert_eq!(outcome.players.len(), 2);
        assert!(outcome.players.get("2").is_none());
        assert!(outcome.last_synced.is_some());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_within_interval_then_refreshes() {
        let (sync, source) = setup(21600, 300);
        sync.sync_players(false).await.unwrap();

        tokio::time::advance(Duration::from_secs(600)).await;
        let second = sync.sync_players(false).await.unwrap();
        assert_eq!(second.status, SyncStatus::Skipped);
        assert_eq!(second.reason, Some(SkipReason::RecentSync));
        assert_eq!(second.source, SyncSource::Database);
        assert_eq!(second.players.len(), 2);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(21600)).await;
        let third = sync.sync_players(false).await.unwrap();
        assert_eq!(third.status, SyncStatus::Updated);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempt_opens_retry_window() {
        let (sync, source) = setup(21600, 300);
        source.fail.store(true, Ordering::SeqCst);

        let err = sync.sync_players(false).await.unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(UpstreamError::Timeout { .. })));
        let status = sync.status();
        assert!(status.last_error.is_some());
        assert!(status.last_attempt.is_some());
        assert!(status.last_synced.is_none());

        source.fail.store(false, Ordering::SeqCst);
        let skipped = sync.sync_players(false).await.unwrap();
        assert_eq!(skipped.reason, Some(SkipReason::RetryWindow));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(301)).await;
        let updated = sync.sync_players(false).await.unwrap();
        assert_eq!(updated.status, SyncStatus::Updated);
        assert!(sync.status().last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn force_bypasses_debounce() {
        let (sync, source) = setup(21600, 300);
        sync.sync_players(false).await.unwrap();
        let forced = sync.sync_players(true).await.unwrap();
        assert_eq!(forced.status, SyncStatus::Updated);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_fetch_once() {
        let (sync, source) = setup(21600, 300);
        let (a, b) = tokio::join!(sync.sync_players(false), sync.sync_players(false));
        a.unwrap();
        b.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_players_loaded_forces_sync_when_empty() {
        let (sync, source) = setup(21600, 300);
        let catalog = sync.ensure_players_loaded().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        let again = sync.ensure_players_loaded().await.unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_cold_start_fetches_once() {
        let (sync, source) = setup(21600, 300);
        let (a, b, c) = tokio::join!(
            sync.ensure_players_loaded(),
            sync.ensure_players_loaded(),
            sync.ensure_players_loaded()
        );
        assert_eq!(a.unwrap().len(), 2);
        assert_eq!(b.unwrap().len(), 2);
        assert_eq!(c.unwrap().len(), 2);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_players_loaded_uses_database_without_fetch() {
        let db = Arc::new(Database::open(":memory:").unwrap());
        db.upsert_players(&[player("9", "Stored Player")]).unwrap();
        let source = Arc::new(FakeSource::default());
        let sync = PlayerSync::new(
            db,
            source.clone(),
            Duration::from_secs(21600),
            Duration::from_secs(300),
        );

        let catalog = sync.ensure_players_loaded().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_disabled_with_zero_interval() {
        let (sync, _source) = setup(0, 300);
        let (_tx, rx) = watch::channel(false);
        assert!(sync.spawn_periodic(rx).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_runs_and_stops_on_shutdown() {
        let (sync, source) = setup(3600, 300);
        let (tx, rx) = watch::channel(false);
        let handle = sync.spawn_periodic(rx).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(3700)).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn status_reports_configuration() {
        let (sync, _source) = setup(21600, 300);
        let status = sync.status();
        assert_eq!(status.interval_secs, 21600);
        assert_eq!(status.min_retry_secs, 300);
        assert!(status.last_attempt.is_none());
    }
}
