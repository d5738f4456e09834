//! Content pool administration.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::application::repos::{ContentPoolRepo, PoolStat, RepoError};
use crate::domain::content::{IngestTier, Platform};

#[derive(Debug, Error)]
pub enum PoolAdminError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolEntry {
    pub platform: Platform,
    pub tier: IngestTier,
    pub available: u64,
}

impl From<PoolStat> for PoolEntry {
    fn from(stat: PoolStat) -> Self {
        Self {
            platform: stat.platform,
            tier: stat.tier,
            available: stat.available,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolOverview {
    pub entries: Vec<PoolEntry>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierChange {
    pub platform: Platform,
    pub tier: IngestTier,
    pub updated: u64,
}

#[derive(Clone)]
pub struct PoolAdminService {
    pool: Arc<dyn ContentPoolRepo>,
}

impl PoolAdminService {
    pub fn new(pool: Arc<dyn ContentPoolRepo>) -> Self {
        Self { pool }
    }

    pub async fn overview(&self) -> Result<PoolOverview, PoolAdminError> {
        let mut entries: Vec<PoolEntry> = self
            .pool
            .pool_stats()
            .await?
            .into_iter()
            .map(PoolEntry::from)
            .collect();
        entries.sort_by_key(|entry| (entry.platform, entry.tier));
        let total = entries.iter().map(|entry| entry.available).sum();
        Ok(PoolOverview { entries, total })
    }

    /// Move a platform's unposted candidates to `tier`. Reversible.
    pub async fn set_platform_tier(
        &self,
        platform: Platform,
        tier: IngestTier,
    ) -> Result<TierChange, PoolAdminError> {
        let updated = self.pool.set_platform_tier(platform, tier).await?;
        info!(
            target = "hotdog::pool",
            platform = %platform,
            tier = %tier,
            updated,
            "platform tier changed"
        );
        Ok(TierChange {
            platform,
            tier,
            updated,
        })
    }
}
