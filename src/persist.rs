// Background persistence worker.
//
// Request handlers hand finished results to a bounded queue and move on. A
// single worker task writes them to SQLite, logging failures without
// affecting callers. On shutdown the queue is closed and drained.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::{Database, RecommendationRecord};
use crate::draft::league::{Draft, League, User, UserLeague};
use crate::draft::pick::Pick;

/// A unit of deferred database work.
#[derive(Debug, Clone)]
pub enum PersistJob {
    User(User),
    /// Leagues discovered for a user; each is upserted and linked.
    UserLeagues { user_id: String, leagues: Vec<League> },
    Drafts(Vec<Draft>),
    Picks(Vec<Pick>),
    Recommendations(Vec<RecommendationRecord>),
}

impl PersistJob {
    fn kind(&self) -> &'static str {
        match self {
            PersistJob::User(_) => "user",
            PersistJob::UserLeagues { .. } => "user_leagues",
            PersistJob::Drafts(_) => "drafts",
            PersistJob::Picks(_) => "picks",
            PersistJob::Recommendations(_) => "recommendations",
        }
    }

    fn apply(self, db: &Database) -> anyhow::Result<()> {
        match self {
            PersistJob::User(user) => db.upsert_user(&user),
            PersistJob::UserLeagues { user_id, leagues } => {
                for league in &leagues {
                    db.upsert_league(league)?;
                    db.link_user_league(&UserLeague {
                        user_id: user_id.clone(),
                        league_id: league.league_id.clone(),
                        role: "member".to_string(),
                    })?;
                }
                Ok(())
            }
            PersistJob::Drafts(drafts) => {
                for draft in &drafts {
                    db.upsert_draft(draft)?;
                }
                Ok(())
            }
            PersistJob::Picks(picks) => db.record_picks(&picks),
            PersistJob::Recommendations(records) => db.insert_recommendations(&records),
        }
    }
}

/// Cloneable handle for submitting jobs.
#[derive(Debug, Clone)]
pub struct PersistQueue {
    tx: mpsc::Sender<PersistJob>,
}

impl PersistQueue {
    /// Queue a job without waiting. Returns `false` (and logs) when the
    /// queue is full or the worker has stopped.
    pub fn enqueue(&self, job: PersistJob) -> bool {
        let kind = job.kind();
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(kind, "persistence queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(kind, "persistence worker stopped, dropping job");
                false
            }
        }
    }
}

/// Owner of the worker task.
pub struct PersistWorker {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Start the worker with a queue of `capacity` jobs.
pub fn spawn(db: Arc<Database>, capacity: usize) -> (PersistQueue, PersistWorker) {
    let (tx, mut rx) = mpsc::channel::<PersistJob>(capacity);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                job = rx.recv() => match job {
                    Some(job) => run_job(&db, job).await,
                    None => break,
                },
                _ = &mut shutdown_rx => {
                    rx.close();
                    while let Some(job) = rx.recv().await {
                        run_job(&db, job).await;
                    }
                    break;
                }
            }
        }
        info!("persistence worker stopped");
    });

    (
        PersistQueue { tx },
        PersistWorker {
            shutdown_tx,
            handle,
        },
    )
}

async fn run_job(db: &Arc<Database>, job: PersistJob) {
    let kind = job.kind();
    let db = Arc::clone(db);
    match tokio::task::spawn_blocking(move || job.apply(&db)).await {
        Ok(Ok(())) => debug!(kind, "persisted"),
        Ok(Err(e)) => warn!(kind, error = %format!("{e:#}"), "persistence job failed"),
        Err(e) => warn!(kind, error = %e, "persistence job panicked"),
    }
}

impl PersistWorker {
    /// Stop accepting jobs, finish the queued ones, and wait for the worker.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            warn!(error = %e, "persistence worker task failed");
        }
    }
}
