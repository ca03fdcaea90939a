//! In-memory and file-backed portfolio stores

use super::{storage_key, PortfolioStore};
use crate::error::AssistantError;
use crate::models::Portfolio;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// In-memory store for development and tests
pub struct InMemoryPortfolioStore {
    portfolios: Arc<RwLock<HashMap<String, Portfolio>>>,
}

impl InMemoryPortfolioStore {
    pub fn new() -> Self {
        Self {
            portfolios: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryPortfolioStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortfolioStore for InMemoryPortfolioStore {
    async fn load(&self, user_id: &str) -> Portfolio {
        let portfolios = self.portfolios.read().await;
        portfolios.get(user_id).cloned().unwrap_or_default()
    }

    async fn save(&self, user_id: &str, portfolio: &Portfolio) -> Result<()> {
        let mut portfolios = self.portfolios.write().await;
        portfolios.insert(user_id.to_string(), portfolio.clone());
        Ok(())
    }
}

/// One JSON document per user: `user_portfolio_{key}.json`
pub struct FilePortfolioStore {
    dir: PathBuf,
}

impl FilePortfolioStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir
            .join(format!("user_portfolio_{}.json", storage_key(user_id)))
    }
}

#[async_trait]
impl PortfolioStore for FilePortfolioStore {
    async fn load(&self, user_id: &str) -> Portfolio {
        let path = self.path_for(user_id);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(user_id, "No saved portfolio");
                return Portfolio::new();
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return Portfolio::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring malformed portfolio file {}: {}", path.display(), e);
            Portfolio::new()
        })
    }

    async fn save(&self, user_id: &str, portfolio: &Portfolio) -> Result<()> {
        let path = self.path_for(user_id);
        let body = serde_json::to_string_pretty(portfolio)?;

        // Write beside the target, then rename over it
        let staging = path.with_extension("json.tmp");
        let write = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&staging, body).await?;
            tokio::fs::rename(&staging, &path).await
        };

        write.await.map_err(|e| {
            AssistantError::PersistenceUnavailable(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            ))
        })?;

        info!(user_id, coins = portfolio.len(), "Portfolio saved");
        Ok(())
    }
}
