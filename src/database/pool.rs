//! Database Connection Pool using sqlx

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::database::blacklist::BlacklistRepository;
use crate::database::clients::ClientRepository;
use crate::database::contributions::ContributionRepository;
use crate::database::moderation::ModerationRepository;
use crate::database::prices::PriceRepository;

pub struct DatabasePool {
    pool: PgPool,
    contributions: ContributionRepository,
    moderation: ModerationRepository,
    prices: PriceRepository,
    clients: ClientRepository,
    blacklist: BlacklistRepository,
}

impl DatabasePool {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, String> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| format!("Failed to connect to PostgreSQL: {}", e))?;

        info!("Connected to PostgreSQL");

        Ok(Self {
            contributions: ContributionRepository::new(pool.clone()),
            moderation: ModerationRepository::new(pool.clone()),
            prices: PriceRepository::new(pool.clone()),
            clients: ClientRepository::new(pool.clone()),
            blacklist: BlacklistRepository::new(pool.clone()),
            pool,
        })
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        info!("Initializing database schema...");

        sqlx::query("CREATE SCHEMA IF NOT EXISTS catalog")
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to create catalog schema: {}", e))?;

        // Clients first: contributions reference them only loosely (no FK),
        // because terminated clients are deleted while their audit trail stays.
        self.clients.init_schema().await?;
        self.contributions.init_schema().await?;
        self.prices.init_schema().await?;
        self.blacklist.init_schema().await?;

        info!("Database schema initialized");
        Ok(())
    }

    pub fn contributions(&self) -> &ContributionRepository {
        &self.contributions
    }

    pub fn moderation(&self) -> &ModerationRepository {
        &self.moderation
    }

    pub fn prices(&self) -> &PriceRepository {
        &self.prices
    }

    pub fn clients(&self) -> &ClientRepository {
        &self.clients
    }

    pub fn blacklist(&self) -> &BlacklistRepository {
        &self.blacklist
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
