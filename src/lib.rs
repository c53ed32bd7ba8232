// Library root: re-exports all modules so integration tests and the binary
// can access the crate's public API.

pub mod cache;
pub mod config;
pub mod db;
pub mod draft;
pub mod error;
pub mod llm;
pub mod persist;
pub mod player_sync;
pub mod rate_limit;
pub mod recommend;
pub mod server;
pub mod sleeper;
pub mod valuation;
