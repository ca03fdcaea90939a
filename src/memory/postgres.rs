//! Postgres-backed portfolio store

use super::PortfolioStore;
use crate::error::AssistantError;
use crate::models::Portfolio;
use crate::Result;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub struct PostgresPortfolioStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresPortfolioStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS user_portfolios (
                      user_id TEXT PRIMARY KEY,
                      holdings TEXT NOT NULL,
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AssistantError::PersistenceUnavailable(format!(
                    "Failed to initialize portfolio schema: {}",
                    e
                ))
            })?;

        Ok(())
    }

    async fn fetch_holdings(&self, user_id: &str) -> Result<Option<String>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT holdings FROM user_portfolios WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|r| r.try_get::<String, _>("holdings").ok()))
    }
}

#[async_trait]
impl PortfolioStore for PostgresPortfolioStore {
    async fn load(&self, user_id: &str) -> Portfolio {
        let holdings = match self.fetch_holdings(user_id).await {
            Ok(Some(holdings)) => holdings,
            Ok(None) => {
                debug!(user_id, "No saved portfolio");
                return Portfolio::new();
            }
            Err(e) => {
                warn!("Failed to load portfolio for {}: {}", user_id, e);
                return Portfolio::new();
            }
        };

        serde_json::from_str(&holdings).unwrap_or_else(|e| {
            warn!("Ignoring malformed portfolio row for {}: {}", user_id, e);
            Portfolio::new()
        })
    }

    async fn save(&self, user_id: &str, portfolio: &Portfolio) -> Result<()> {
        self.ensure_schema().await?;
        let holdings = serde_json::to_string(portfolio)?;

        sqlx::query(
            r#"
            INSERT INTO user_portfolios (user_id, holdings, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET holdings = EXCLUDED.holdings, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user_id)
        .bind(&holdings)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AssistantError::PersistenceUnavailable(format!("Failed to save portfolio: {}", e))
        })?;

        info!(user_id, coins = portfolio.len(), "Portfolio saved");
        Ok(())
    }
}
