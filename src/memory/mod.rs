//! Portfolio persistence
//!
//! One saved portfolio per user. Reads never fail: an absent or unreadable
//! record is an empty portfolio. Writes replace the whole record and report
//! failure to the caller.

pub mod postgres;
pub mod store;

pub use postgres::PostgresPortfolioStore;
pub use store::{FilePortfolioStore, InMemoryPortfolioStore};

use crate::models::Portfolio;
use crate::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Trait for portfolio persistence
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// Last saved portfolio, or empty
    async fn load(&self, user_id: &str) -> Portfolio;

    /// Replace the user's saved portfolio
    async fn save(&self, user_id: &str, portfolio: &Portfolio) -> Result<()>;
}

/// Key safe to use in a file name or as a primary key. Ids outside
/// `[A-Za-z0-9_-]` (or empty, or very long) are replaced by their SHA-256.
pub fn storage_key(user_id: &str) -> String {
    let plain = !user_id.is_empty()
        && user_id.len() <= 64
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if plain {
        user_id.to_string()
    } else {
        hex::encode(Sha256::digest(user_id.as_bytes()))
    }
}

/// Postgres when a database URL is configured and usable, else files under
/// `portfolio_dir`.
pub fn build_portfolio_store(database_url: Option<&str>, portfolio_dir: &Path) -> Arc<dyn PortfolioStore> {
    if let Some(url) = database_url {
        match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
        {
            Ok(pool) => {
                info!("Portfolio store backend: postgres");
                return Arc::new(PostgresPortfolioStore::new(pool));
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres portfolio store, falling back to files: {}",
                    error
                );
            }
        }
    }

    info!(dir = %portfolio_dir.display(), "Portfolio store backend: files");
    Arc::new(FilePortfolioStore::new(portfolio_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ids_kept() {
        assert_eq!(storage_key("default_user"), "default_user");
        assert_eq!(storage_key("user-42"), "user-42");
    }

    #[test]
    fn test_unsafe_ids_hashed() {
        let key = storage_key("../etc/passwd");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, storage_key("../etc/passwd"));
        assert_ne!(key, storage_key("../etc/shadow"));
    }

    #[test]
    fn test_empty_id_hashed() {
        assert_eq!(storage_key("").len(), 64);
    }
}
