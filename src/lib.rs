pub mod api;
pub mod config;
pub mod db;
pub mod preview;
pub mod uploads;
pub mod utils;

pub use db::DbPool;

use config::Config;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    /// Shared client for outbound preview fetches.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, http: reqwest::Client) -> Self {
        Self { config, db, http }
    }
}
