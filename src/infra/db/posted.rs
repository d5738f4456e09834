use async_trait::async_trait;
use sqlx::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{PostedContentRepo, RepoError};
use crate::domain::content::{Platform, PostedContentRecord};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
pub(super) struct PostedRow {
    id: Uuid,
    candidate_id: Uuid,
    slot_id: Option<Uuid>,
    platform: Platform,
    posted_at: OffsetDateTime,
    external_id: Option<String>,
}

impl From<PostedRow> for PostedContentRecord {
    fn from(row: PostedRow) -> Self {
        PostedContentRecord {
            id: row.id,
            candidate_id: row.candidate_id,
            slot_id: row.slot_id,
            platform: row.platform,
            posted_at: row.posted_at,
            external_id: row.external_id,
        }
    }
}

#[async_trait]
impl PostedContentRepo for PostgresRepositories {
    async fn list_posted_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<PostedContentRecord>, RepoError> {
        let rows = query_as::<_, PostedRow>(
            "SELECT id, candidate_id, slot_id, platform, posted_at, external_id \
             FROM posted_content \
             WHERE posted_at >= $1 AND posted_at < $2 \
             ORDER BY posted_at",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostedContentRecord::from).collect())
    }

    async fn list_posted_for_candidates(
        &self,
        candidate_ids: &[Uuid],
    ) -> Result<Vec<PostedContentRecord>, RepoError> {
        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = query_as::<_, PostedRow>(
            "SELECT id, candidate_id, slot_id, platform, posted_at, external_id \
             FROM posted_content \
             WHERE candidate_id = ANY($1) \
             ORDER BY posted_at",
        )
        .bind(candidate_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostedContentRecord::from).collect())
    }
}
