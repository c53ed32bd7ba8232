// Sleeper draft assistant entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config
// 3. Open database
// 4. Build upstream client, player sync, LLM client and persistence worker
// 5. Spawn periodic player sync and rate-limiter pruning
// 6. Serve HTTP until Ctrl+C
// 7. Stop background tasks, drain persistence

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};

use sleeper_draft::cache::ResponseCache;
use sleeper_draft::config;
use sleeper_draft::db::Database;
use sleeper_draft::llm::LlmClient;
use sleeper_draft::persist;
use sleeper_draft::player_sync::PlayerSync;
use sleeper_draft::rate_limit::RateLimiter;
use sleeper_draft::recommend::Recommender;
use sleeper_draft::server::{self, ApiState};
use sleeper_draft::sleeper::{SleeperClient, SportsData};

const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Tracing
    init_tracing()?;
    info!("Sleeper draft assistant starting up");

    // 2. Config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        upstream = %config.sleeper.base_url,
        "config loaded"
    );

    // 3. Database
    let db = Arc::new(Database::open(&config.db_path).context("failed to open database")?);
    info!("Database opened at {}", config.db_path);

    // 4. Collaborators
    let source: Arc<dyn SportsData> = Arc::new(SleeperClient::from_config(&config.sleeper));
    let sync = Arc::new(PlayerSync::new(
        Arc::clone(&db),
        Arc::clone(&source),
        Duration::from_secs(config.sync.interval_secs),
        Duration::from_secs(config.sync.min_retry_secs),
    ));

    let llm = LlmClient::from_config(&config);
    match &llm {
        LlmClient::Active(_) => info!(model = %config.strategy.llm.model, "LLM re-rank enabled"),
        LlmClient::Disabled => info!("LLM re-rank disabled (no API key)"),
    }

    let (queue, persist_worker) =
        persist::spawn(Arc::clone(&db), config.persistence.queue_capacity);

    let recommender = Arc::new(Recommender::new(
        source,
        Arc::clone(&sync),
        Arc::clone(&db),
        Arc::new(ResponseCache::new(Duration::from_secs(config.cache.ttl_secs))),
        Arc::new(llm),
        queue,
        config.strategy.weights.clone(),
        config.strategy.roster.clone(),
        config.strategy.llm.candidate_limit,
    ));

    let window = Duration::from_secs(config.rate_limit.window_secs);
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.max_requests, window));

    // 5. Background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_handle = sync.spawn_periodic(shutdown_rx.clone());
    let prune_handle = spawn_limiter_pruning(Arc::clone(&limiter), window, shutdown_rx);

    // 6. HTTP
    let app = server::router(
        ApiState {
            recommender,
            limiter,
        },
        &config.server.allowed_origins,
    );
    let bind = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;

    server::serve(listener, app, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
        }
        info!("shutdown requested");
    })
    .await?;

    // 7. Cleanup
    let _ = shutdown_tx.send(true);
    if let Some(handle) = sync_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "periodic sync task failed");
        }
    }
    let _ = prune_handle.await;

    if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, persist_worker.shutdown())
        .await
        .is_err()
    {
        warn!("persistence queue not drained before timeout");
    }

    info!("Sleeper draft assistant shut down cleanly");
    Ok(())
}

/// Forget idle rate-limit clients once per window.
fn spawn_limiter_pruning(
    limiter: Arc<RateLimiter>,
    window: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(window);
        loop {
            tokio::select! {
                _ = ticker.tick() => limiter.prune(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sleeper_draft=info,tower_http=info,warn")),
        )
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
