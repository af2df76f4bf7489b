use std::{sync::Arc, time::Duration};

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{
    cache::sessions::SessionStore,
    config::Config,
    cryptography::generate_secret,
    database::error::QueryError,
    error::{Error, HtmlError},
};

pub struct State {
    pub pool: Pool<Postgres>,
    pub sessions: SessionStore,
    pub config: Config,
    pub jwt_secret: String,
}

pub type SharedState = Arc<State>;

impl State {
    /// Connects to the database, the session cache connects lazily.
    pub async fn new(config: Config) -> Result<SharedState, Error> {
        log::info!("Connecting to database");
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.database_url)
            .await
            .map_err(QueryError::from)?;

        Self::with_pool(config, pool)
    }

    /// Builds the state without touching the database or the cache.
    pub fn lazy(config: Config) -> Result<SharedState, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(&config.database_url)
            .map_err(QueryError::from)?;

        Self::with_pool(config, pool)
    }

    fn with_pool(config: Config, pool: Pool<Postgres>) -> Result<SharedState, Error> {
        let sessions = SessionStore::open(&config.redis_url)?;

        let jwt_secret = match &config.jwt_secret {
            Some(secret) if !secret.is_empty() => secret.to_owned(),
            _ => {
                log::warn!("JWT_SECRET not set, tokens will not survive a restart");
                generate_secret(64)
            }
        };

        if config.page_size < 1 {
            return Err(HtmlError::InternalServerError.new("PAGE_SIZE must be positive"));
        }

        Ok(Arc::new(Self {
            pool,
            sessions,
            config,
            jwt_secret,
        }))
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                log::error!("Migration failed: {e}");
                HtmlError::InternalServerError.new(&format!("Migration failed: {e}"))
            })?;

        log::info!("Database schema is up to date");
        Ok(())
    }

    pub fn token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.config.token_lifetime_hours)
    }
}
