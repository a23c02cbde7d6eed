pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod notifications;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::notifications::SystemEmailService;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub rate_limiter: Arc<RateLimiter>,
    pub email: SystemEmailService,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let email = SystemEmailService::new(config.email.clone());
        Self {
            config,
            db,
            rate_limiter,
            email,
        }
    }
}
