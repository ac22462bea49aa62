//! Price Repository - PostgreSQL operations for the price table using sqlx

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Executor, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use crate::database::PriceStore;
use crate::error::CatalogResult;
use crate::pricing::PriceEntry;

#[derive(Clone)]
pub struct PriceRepository {
    pool: PgPool,
}

impl PriceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS catalog.prices (
                product_id UUID NOT NULL,
                market_id UUID NOT NULL,
                price DOUBLE PRECISION NOT NULL CHECK (price > 0),
                source VARCHAR(16) NOT NULL,
                author UUID NOT NULL,
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL,
                PRIMARY KEY (product_id, market_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create prices table: {}", e))?;

        info!("Prices table ready");
        Ok(())
    }
}

pub(crate) async fn upsert_price<'e, E>(executor: E, entry: &PriceEntry) -> CatalogResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO catalog.prices (product_id, market_id, price, source, author, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (product_id, market_id) DO UPDATE SET
            price = EXCLUDED.price,
            source = EXCLUDED.source,
            author = EXCLUDED.author,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(entry.product_id)
    .bind(entry.market_id)
    .bind(entry.price)
    .bind(entry.source.as_str())
    .bind(entry.author)
    .bind(entry.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl PriceStore for PriceRepository {
    async fn upsert(&self, entry: &PriceEntry) -> CatalogResult<()> {
        upsert_price(&self.pool, entry).await
    }

    async fn get(&self, product_id: Uuid, market_id: Uuid) -> CatalogResult<Option<PriceEntry>> {
        let row = sqlx::query(
            r#"
            SELECT product_id, market_id, price, source, author, updated_at
            FROM catalog.prices
            WHERE product_id = $1 AND market_id = $2
            "#,
        )
        .bind(product_id)
        .bind(market_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let source: String = row.try_get("source")?;
        Ok(Some(PriceEntry {
            product_id: row.try_get("product_id")?,
            market_id: row.try_get("market_id")?,
            price: row.try_get("price")?,
            source: source.parse()?,
            author: row.try_get("author")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }
}
