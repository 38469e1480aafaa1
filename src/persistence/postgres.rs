use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info, instrument};

use super::DataStorage;
use crate::domain::{MarketSnapshot, ProjectMetrics, TokenInfo};
use crate::error::{FluxError, Result};

/// PostgreSQL storage adapter.
///
/// Expects the `token_info`, `market_data` and `project_metrics` tables to
/// exist. Numeric columns are read back through `::float8` casts and
/// timestamps are stored as UTC.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Connect and verify the pool with a round trip
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn snapshot_from_row(r: &PgRow) -> MarketSnapshot {
    MarketSnapshot {
        symbol: r.get("symbol"),
        price: r.get("price"),
        volume_24h: r.get("volume_24h"),
        market_cap: r.get("market_cap"),
        price_change_1h: r.get("price_change_1h"),
        price_change_24h: r.get("price_change_24h"),
        timestamp: r.get("timestamp"),
    }
}

#[async_trait]
impl DataStorage for PostgresStorage {
    #[instrument(skip(self, info), fields(symbol = %info.symbol))]
    async fn save_token_info(&self, info: &TokenInfo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO token_info (
                symbol, name, contract_address, network, launch_type,
                initial_price, total_supply, circulating_supply,
                team_allocation, vesting_schedule, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            ON CONFLICT (symbol) DO UPDATE SET
                name = EXCLUDED.name,
                contract_address = EXCLUDED.contract_address,
                network = EXCLUDED.network,
                launch_type = EXCLUDED.launch_type,
                initial_price = EXCLUDED.initial_price,
                total_supply = EXCLUDED.total_supply,
                circulating_supply = EXCLUDED.circulating_supply,
                team_allocation = EXCLUDED.team_allocation,
                vesting_schedule = EXCLUDED.vesting_schedule,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&info.symbol)
        .bind(&info.name)
        .bind(&info.contract_address)
        .bind(&info.network)
        .bind(&info.launch_type)
        .bind(info.initial_price)
        .bind(info.total_supply)
        .bind(info.circulating_supply)
        .bind(info.team_allocation)
        .bind(&info.vesting_schedule)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!("token info saved");
        Ok(())
    }

    async fn save_market_snapshot(&self, snapshot: &MarketSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO market_data (
                symbol, price, volume_24h, market_cap,
                price_change_1h, price_change_24h, timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&snapshot.symbol)
        .bind(snapshot.price)
        .bind(snapshot.volume_24h)
        .bind(snapshot.market_cap)
        .bind(snapshot.price_change_1h)
        .bind(snapshot.price_change_24h)
        .bind(snapshot.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_historical_data(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MarketSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT symbol, price::float8 AS price, volume_24h::float8 AS volume_24h,
                   market_cap::float8 AS market_cap,
                   price_change_1h::float8 AS price_change_1h,
                   price_change_24h::float8 AS price_change_24h,
                   timestamp
            FROM market_data
            WHERE symbol = $1 AND timestamp BETWEEN $2 AND $3
            ORDER BY timestamp ASC
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(snapshot_from_row).collect())
    }

    #[instrument(skip(self, metrics), fields(symbol = %metrics.token_info.symbol))]
    async fn save_project_metrics(&self, metrics: &ProjectMetrics) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO project_metrics (
                token_info_id, social_score, development_score,
                community_growth, market_sentiment, risk_score, updated_at
            )
            SELECT id, $2, $3, $4, $5, $6, $7 FROM token_info WHERE symbol = $1
            "#,
        )
        .bind(&metrics.token_info.symbol)
        .bind(metrics.social_score)
        .bind(metrics.development_score)
        .bind(metrics.community_growth)
        .bind(metrics.market_sentiment)
        .bind(metrics.risk_score)
        .bind(metrics.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(FluxError::NotFound(format!(
                "token info for {} must be saved before its metrics",
                metrics.token_info.symbol
            )));
        }
        Ok(())
    }

    async fn get_project_metrics(&self, symbol: &str) -> Result<ProjectMetrics> {
        let row = sqlx::query(
            r#"
            SELECT m.social_score::float8 AS social_score,
                   m.development_score::float8 AS development_score,
                   m.community_growth::float8 AS community_growth,
                   m.market_sentiment::float8 AS market_sentiment,
                   m.risk_score::float8 AS risk_score,
                   m.updated_at,
                   t.symbol, t.name, t.contract_address, t.network, t.launch_type,
                   t.initial_price::float8 AS initial_price,
                   t.total_supply::float8 AS total_supply,
                   t.circulating_supply::float8 AS circulating_supply,
                   t.team_allocation::float8 AS team_allocation,
                   t.vesting_schedule
            FROM project_metrics m
            JOIN token_info t ON m.token_info_id = t.id
            WHERE t.symbol = $1
            ORDER BY m.updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| FluxError::NotFound(format!("no metrics found for symbol: {}", symbol)))?;

        let token_info = TokenInfo {
            symbol: row.get("symbol"),
            name: row.get::<Option<String>, _>("name").unwrap_or_default(),
            contract_address: row
                .get::<Option<String>, _>("contract_address")
                .unwrap_or_default(),
            network: row.get::<Option<String>, _>("network").unwrap_or_default(),
            launch_type: row.get::<Option<String>, _>("launch_type").unwrap_or_default(),
            launch_date: None,
            initial_price: row.get::<Option<f64>, _>("initial_price").unwrap_or_default(),
            total_supply: row.get::<Option<f64>, _>("total_supply").unwrap_or_default(),
            circulating_supply: row
                .get::<Option<f64>, _>("circulating_supply")
                .unwrap_or_default(),
            team_allocation: row
                .get::<Option<f64>, _>("team_allocation")
                .unwrap_or_default(),
            vesting_schedule: row
                .get::<Option<String>, _>("vesting_schedule")
                .unwrap_or_default(),
        };

        Ok(ProjectMetrics {
            token_info,
            social_score: row.get::<Option<f64>, _>("social_score").unwrap_or_default(),
            development_score: row
                .get::<Option<f64>, _>("development_score")
                .unwrap_or_default(),
            community_growth: row
                .get::<Option<f64>, _>("community_growth")
                .unwrap_or_default(),
            market_sentiment: row
                .get::<Option<f64>, _>("market_sentiment")
                .unwrap_or_default(),
            risk_score: row.get::<Option<f64>, _>("risk_score").unwrap_or_default(),
            updated_at: row.get("updated_at"),
        })
    }
}
