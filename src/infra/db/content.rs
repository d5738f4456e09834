use async_trait::async_trait;
use sqlx::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{ContentPoolRepo, EligibilityFilter, PoolStat, RepoError};
use crate::domain::content::{CandidateRecord, ContentType, IngestTier, Platform};

use super::{PostgresRepositories, map_sqlx_error};

const CANDIDATE_COLUMNS: &str = "c.id, c.platform, c.content_type, c.content_text, c.content_url, \
    c.confidence_score, c.is_approved, c.ingest_tier, c.is_posted, c.scraped_at, c.posted_at";

/// Candidate not yet held by a pending or posted slot.
pub(super) const UNCLAIMED_CLAUSE: &str = "NOT EXISTS (SELECT 1 FROM scheduled_slots s \
    WHERE s.candidate_id = c.id AND s.status IN ('scheduled'::slot_status, 'posted'::slot_status))";

#[derive(Debug, sqlx::FromRow)]
struct CandidateRow {
    id: Uuid,
    platform: Platform,
    content_type: ContentType,
    content_text: Option<String>,
    content_url: Option<String>,
    confidence_score: f64,
    is_approved: bool,
    ingest_tier: IngestTier,
    is_posted: bool,
    scraped_at: OffsetDateTime,
    posted_at: Option<OffsetDateTime>,
}

impl From<CandidateRow> for CandidateRecord {
    fn from(row: CandidateRow) -> Self {
        CandidateRecord {
            id: row.id,
            platform: row.platform,
            content_type: row.content_type,
            content_text: row.content_text,
            content_url: row.content_url,
            confidence_score: row.confidence_score,
            is_approved: row.is_approved,
            ingest_tier: row.ingest_tier,
            is_posted: row.is_posted,
            scraped_at: row.scraped_at,
            posted_at: row.posted_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PoolStatRow {
    platform: Platform,
    ingest_tier: IngestTier,
    available: i64,
}

#[async_trait]
impl ContentPoolRepo for PostgresRepositories {
    async fn list_eligible_candidates(
        &self,
        filter: &EligibilityFilter,
        limit: u32,
    ) -> Result<Vec<CandidateRecord>, RepoError> {
        if filter.tiers.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} FROM content_candidates c \
             WHERE c.is_approved AND NOT c.is_posted \
               AND c.ingest_tier = ANY($1) \
               AND (NOT $2 OR {UNCLAIMED_CLAUSE}) \
             ORDER BY array_position($1, c.ingest_tier), \
                      c.confidence_score DESC, c.scraped_at DESC, c.id \
             LIMIT $3"
        );
        let rows = query_as::<_, CandidateRow>(&sql)
            .bind(filter.tiers.as_slice())
            .bind(filter.exclude_scheduled)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CandidateRecord::from).collect())
    }

    async fn find_candidates(&self, ids: &[Uuid]) -> Result<Vec<CandidateRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM content_candidates c WHERE c.id = ANY($1)");
        let rows = query_as::<_, CandidateRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CandidateRecord::from).collect())
    }

    async fn pool_stats(&self) -> Result<Vec<PoolStat>, RepoError> {
        let sql = format!(
            "SELECT c.platform, c.ingest_tier, COUNT(*) AS available \
             FROM content_candidates c \
             WHERE c.is_approved AND NOT c.is_posted AND {UNCLAIMED_CLAUSE} \
             GROUP BY c.platform, c.ingest_tier \
             ORDER BY c.platform, c.ingest_tier"
        );
        let rows = query_as::<_, PoolStatRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(PoolStat {
                    platform: row.platform,
                    tier: row.ingest_tier,
                    available: Self::convert_count(row.available)?,
                })
            })
            .collect()
    }

    async fn set_platform_tier(
        &self,
        platform: Platform,
        tier: IngestTier,
    ) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE content_candidates SET ingest_tier = $2 \
             WHERE platform = $1 AND NOT is_posted AND ingest_tier <> $2",
        )
        .bind(platform)
        .bind(tier)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
