// Configuration loading and parsing (server.toml, strategy.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::draft::roster::RosterTemplate;
use crate::valuation::scoring::MAX_CANDIDATES;
use crate::valuation::strategy::WeightTable;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub sleeper: SleeperConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub persistence: PersistenceConfig,
    pub db_path: String,
    pub strategy: StrategyConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct ServerFile {
    server: ServerConfig,
    sleeper: SleeperConfig,
    sync: SyncConfig,
    cache: CacheConfig,
    rate_limit: RateLimitConfig,
    database: DatabaseSection,
    persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// CORS origins. An empty list allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SleeperConfig {
    pub base_url: String,
    pub sport: String,
    pub timeout_secs: u64,
    /// The full player dump is several megabytes and gets its own timeout.
    pub players_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub interval_secs: u64,
    pub min_retry_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub queue_capacity: usize,
}

// ---------------------------------------------------------------------------
// strategy.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub weights: WeightTable,
    pub roster: RosterDefaults,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterDefaults {
    pub default_template: RosterTemplate,
    pub default_league_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f64,
    /// How many engine candidates are offered for re-ranking.
    pub candidate_limit: usize,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub anthropic_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/server.toml`,
/// `config/strategy.toml`, and (optionally) `config/credentials.toml`,
/// all relative to the given `base_dir`.
///
/// Does not copy defaults or read environment overrides; `load_config()`
/// does both.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config = read_config_files(base_dir)?;
    validate(&config)?;
    Ok(config)
}

fn read_config_files(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- server.toml (required) ---
    let server_path = config_dir.join("server.toml");
    let server_text = read_file(&server_path)?;
    let server_file: ServerFile =
        toml::from_str(&server_text).map_err(|e| ConfigError::ParseError {
            path: server_path.clone(),
            source: e,
        })?;

    // --- strategy.toml (required) ---
    let strategy_path = config_dir.join("strategy.toml");
    let strategy_text = read_file(&strategy_path)?;
    let strategy: StrategyConfig =
        toml::from_str(&strategy_text).map_err(|e| ConfigError::ParseError {
            path: strategy_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    Ok(Config {
        server: server_file.server,
        sleeper: server_file.sleeper,
        sync: server_file.sync,
        cache: server_file.cache,
        rate_limit: server_file.rate_limit,
        persistence: server_file.persistence,
        db_path: server_file.database.path,
        strategy,
        credentials,
    })
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying defaults
/// first and applying environment overrides before validation.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    let mut config = read_config_files(&cwd)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

/// Apply `SLEEPER_BASE_URL`, `ANTHROPIC_API_KEY`, `DRAFT_DB_PATH` and `PORT`
/// from `lookup`. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get("SLEEPER_BASE_URL") {
        config.sleeper.base_url = url;
    }
    if let Some(key) = get("ANTHROPIC_API_KEY") {
        config.credentials.anthropic_api_key = Some(key);
    }
    if let Some(path) = get("DRAFT_DB_PATH") {
        config.db_path = path;
    }
    if let Some(port) = get("PORT") {
        config.server.port = port.trim().parse().map_err(|_| ConfigError::ValidationError {
            field: "PORT".into(),
            message: format!("not a valid port number: {port}"),
        })?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

impl Config {
    /// The Anthropic key, when present and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.credentials
            .anthropic_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.port".into(),
            message: "must be greater than 0".into(),
        });
    }

    let timeouts: &[(&str, u64)] = &[
        ("sleeper.timeout_secs", config.sleeper.timeout_secs),
        ("sleeper.players_timeout_secs", config.sleeper.players_timeout_secs),
        ("llm.timeout_secs", config.strategy.llm.timeout_secs),
        ("rate_limit.window_secs", config.rate_limit.window_secs),
    ];
    for (name, val) in timeouts {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    if config.rate_limit.max_requests == 0 {
        return Err(ConfigError::ValidationError {
            field: "rate_limit.max_requests".into(),
            message: "must be > 0".into(),
        });
    }

    if config.persistence.queue_capacity == 0 {
        return Err(ConfigError::ValidationError {
            field: "persistence.queue_capacity".into(),
            message: "must be > 0".into(),
        });
    }

    // Weights must be finite and non-negative
    let table = &config.strategy.weights;
    for (strategy, weights) in [
        ("safe", &table.safe),
        ("balanced", &table.balanced),
        ("upside", &table.upside),
    ] {
        for (name, val) in weights.named() {
            if !val.is_finite() || val < 0.0 {
                return Err(ConfigError::ValidationError {
                    field: format!("weights.{strategy}.{name}"),
                    message: format!("must be a finite number >= 0, got {val}"),
                });
            }
        }
    }

    if config.strategy.roster.default_template.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "roster.default_template".into(),
            message: "must list at least one slot".into(),
        });
    }

    let limit = config.strategy.llm.candidate_limit;
    if !(1..=MAX_CANDIDATES).contains(&limit) {
        return Err(ConfigError::ValidationError {
            field: "llm.candidate_limit".into(),
            message: format!("must be between 1 and {MAX_CANDIDATES}, got {limit}"),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
