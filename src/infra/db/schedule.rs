use async_trait::async_trait;
use sqlx::{query, query_as};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::repos::{
    RecordPostedParams, RepoError, ScheduleRepo, SlotAssignment,
};
use crate::domain::content::{Platform, PostedContentRecord};
use crate::domain::schedule::{ScheduledSlotRecord, SlotIndex, SlotStatus};

use super::content::UNCLAIMED_CLAUSE;
use super::posted::PostedRow;
use super::{PostgresRepositories, map_sqlx_error};

const SLOT_COLUMNS: &str = "id, slot_date, slot_index, scheduled_at, candidate_id, platform, \
    status, posted_at, error, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct SlotRow {
    id: Uuid,
    slot_date: Date,
    slot_index: i16,
    scheduled_at: OffsetDateTime,
    candidate_id: Uuid,
    platform: Platform,
    status: SlotStatus,
    posted_at: Option<OffsetDateTime>,
    error: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<SlotRow> for ScheduledSlotRecord {
    type Error = RepoError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let slot_index = SlotIndex::try_from(row.slot_index).map_err(|err| RepoError::Integrity {
            message: err.to_string(),
        })?;
        Ok(ScheduledSlotRecord {
            id: row.id,
            slot_date: row.slot_date,
            slot_index,
            scheduled_at: row.scheduled_at,
            candidate_id: row.candidate_id,
            platform: row.platform,
            status: row.status,
            posted_at: row.posted_at,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_records(rows: Vec<SlotRow>) -> Result<Vec<ScheduledSlotRecord>, RepoError> {
    rows.into_iter().map(ScheduledSlotRecord::try_from).collect()
}

#[async_trait]
impl ScheduleRepo for PostgresRepositories {
    async fn list_slots_for_date(
        &self,
        date: Date,
    ) -> Result<Vec<ScheduledSlotRecord>, RepoError> {
        let sql = format!(
            "SELECT {SLOT_COLUMNS} FROM scheduled_slots WHERE slot_date = $1 ORDER BY slot_index"
        );
        let rows = query_as::<_, SlotRow>(&sql)
            .bind(date)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        into_records(rows)
    }

    async fn claim_slots(
        &self,
        date: Date,
        assignments: &[SlotAssignment],
    ) -> Result<Vec<ScheduledSlotRecord>, RepoError> {
        if assignments.is_empty() {
            return Ok(Vec::new());
        }

        let candidate_ids: Vec<Uuid> = assignments.iter().map(|a| a.candidate_id).collect();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        // Concurrent fills touching the same candidates serialize here.
        query("SELECT id FROM content_candidates WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(candidate_ids.as_slice())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let insert = format!(
            "INSERT INTO scheduled_slots \
                 (id, slot_date, slot_index, scheduled_at, candidate_id, platform, status, \
                  created_at, updated_at) \
             SELECT $1, $2, $3, $4, c.id, c.platform, 'scheduled'::slot_status, now(), now() \
             FROM content_candidates c \
             WHERE c.id = $5 AND c.is_approved AND NOT c.is_posted AND {UNCLAIMED_CLAUSE} \
             ON CONFLICT DO NOTHING \
             RETURNING {SLOT_COLUMNS}"
        );

        let mut claimed = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let row = query_as::<_, SlotRow>(&insert)
                .bind(Uuid::new_v4())
                .bind(date)
                .bind(i16::from(assignment.slot_index.get()))
                .bind(assignment.scheduled_at)
                .bind(assignment.candidate_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            if let Some(row) = row {
                claimed.push(ScheduledSlotRecord::try_from(row)?);
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(claimed)
    }

    async fn find_slot(&self, id: Uuid) -> Result<Option<ScheduledSlotRecord>, RepoError> {
        let sql = format!("SELECT {SLOT_COLUMNS} FROM scheduled_slots WHERE id = $1");
        query_as::<_, SlotRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(ScheduledSlotRecord::try_from)
            .transpose()
    }

    async fn list_duplicate_claims(&self) -> Result<Vec<ScheduledSlotRecord>, RepoError> {
        let sql = format!(
            "SELECT {SLOT_COLUMNS} FROM scheduled_slots \
             WHERE status = 'scheduled'::slot_status AND candidate_id IN ( \
                 SELECT candidate_id FROM scheduled_slots \
                 WHERE status = 'scheduled'::slot_status \
                 GROUP BY candidate_id HAVING COUNT(*) > 1) \
             ORDER BY candidate_id, scheduled_at, created_at"
        );
        let rows = query_as::<_, SlotRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        into_records(rows)
    }

    async fn update_slot_status(
        &self,
        id: Uuid,
        status: SlotStatus,
        error: Option<String>,
    ) -> Result<bool, RepoError> {
        let result = query(
            "UPDATE scheduled_slots \
             SET status = $2, \
                 error = COALESCE($3, error), \
                 posted_at = CASE WHEN $2 = 'posted'::slot_status \
                     THEN COALESCE(posted_at, now()) ELSE posted_at END, \
                 updated_at = now() \
             WHERE id = $1 AND status = 'scheduled'::slot_status",
        )
        .bind(id)
        .bind(status)
        .bind(error)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_slot(&self, id: Uuid) -> Result<(), RepoError> {
        let result = query(
            "DELETE FROM scheduled_slots WHERE id = $1 AND status = 'scheduled'::slot_status",
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn mark_stale_slots_missed(&self, cutoff: OffsetDateTime) -> Result<u64, RepoError> {
        let result = query(
            "UPDATE scheduled_slots \
             SET status = 'missed'::slot_status, updated_at = now() \
             WHERE status = 'scheduled'::slot_status AND scheduled_at < $1",
        )
        .bind(cutoff)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn record_posted(
        &self,
        params: RecordPostedParams,
    ) -> Result<PostedContentRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let sql = format!("SELECT {SLOT_COLUMNS} FROM scheduled_slots WHERE id = $1 FOR UPDATE");
        let slot = query_as::<_, SlotRow>(&sql)
            .bind(params.slot_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;
        if slot.status != SlotStatus::Scheduled {
            return Err(RepoError::Integrity {
                message: format!("slot {} is already {}", slot.id, slot.status),
            });
        }

        query(
            "UPDATE scheduled_slots \
             SET status = 'posted'::slot_status, posted_at = $2, error = NULL, updated_at = now() \
             WHERE id = $1",
        )
        .bind(params.slot_id)
        .bind(params.posted_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        query("UPDATE content_candidates SET is_posted = TRUE, posted_at = $2 WHERE id = $1")
            .bind(slot.candidate_id)
            .bind(params.posted_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let posted = query_as::<_, PostedRow>(
            "INSERT INTO posted_content (id, candidate_id, slot_id, platform, posted_at, external_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, candidate_id, slot_id, platform, posted_at, external_id",
        )
        .bind(Uuid::new_v4())
        .bind(slot.candidate_id)
        .bind(params.slot_id)
        .bind(slot.platform)
        .bind(params.posted_at)
        .bind(params.external_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(posted.into())
    }
}
