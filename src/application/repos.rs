//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::content::{CandidateRecord, IngestTier, Platform, PostedContentRecord};
use crate::domain::schedule::{ScheduledSlotRecord, SlotIndex, SlotStatus};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which pool rows a fill pass may consider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityFilter {
    /// Tiers in preference order; earlier tiers sort first.
    pub tiers: Vec<IngestTier>,
    /// Skip candidates already held by a scheduled or posted slot.
    pub exclude_scheduled: bool,
}

/// Eligible-candidate count for one platform/tier pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStat {
    pub platform: Platform,
    pub tier: IngestTier,
    pub available: u64,
}

#[async_trait]
pub trait ContentPoolRepo: Send + Sync {
    /// Approved, unposted candidates in the given tiers, ordered by tier
    /// preference, confidence descending, then newest first.
    async fn list_eligible_candidates(
        &self,
        filter: &EligibilityFilter,
        limit: u32,
    ) -> Result<Vec<CandidateRecord>, RepoError>;

    async fn find_candidates(&self, ids: &[Uuid]) -> Result<Vec<CandidateRecord>, RepoError>;

    /// Unclaimed, approved, unposted candidates grouped by platform and tier.
    async fn pool_stats(&self) -> Result<Vec<PoolStat>, RepoError>;

    /// Move every unposted candidate of `platform` to `tier`; returns rows changed.
    async fn set_platform_tier(&self, platform: Platform, tier: IngestTier)
    -> Result<u64, RepoError>;
}

/// One candidate bound to one empty slot.
#[derive(Debug, Clone)]
pub struct SlotAssignment {
    pub slot_index: SlotIndex,
    pub scheduled_at: OffsetDateTime,
    pub candidate_id: Uuid,
    pub platform: Platform,
}

#[derive(Debug, Clone)]
pub struct RecordPostedParams {
    pub slot_id: Uuid,
    pub posted_at: OffsetDateTime,
    pub external_id: Option<String>,
}

#[async_trait]
pub trait ScheduleRepo: Send + Sync {
    async fn list_slots_for_date(&self, date: Date)
    -> Result<Vec<ScheduledSlotRecord>, RepoError>;

    /// Atomically claim candidates for empty slots of `date`.
    ///
    /// Each assignment succeeds only if its slot position is still empty and
    /// its candidate is still unposted and not held by another scheduled or
    /// posted slot. Assignments that lose are skipped, not reported as errors.
    async fn claim_slots(
        &self,
        date: Date,
        assignments: &[SlotAssignment],
    ) -> Result<Vec<ScheduledSlotRecord>, RepoError>;

    async fn find_slot(&self, id: Uuid) -> Result<Option<ScheduledSlotRecord>, RepoError>;

    /// Scheduled slots whose candidate is held by more than one scheduled slot.
    async fn list_duplicate_claims(&self) -> Result<Vec<ScheduledSlotRecord>, RepoError>;

    /// Move a slot that is still scheduled to `status`.
    ///
    /// Returns `false` when no scheduled slot with `id` exists, either because
    /// it was never there or because it already settled.
    async fn update_slot_status(
        &self,
        id: Uuid,
        status: SlotStatus,
        error: Option<String>,
    ) -> Result<bool, RepoError>;

    /// Delete a scheduled slot so its position can be refilled.
    async fn release_slot(&self, id: Uuid) -> Result<(), RepoError>;

    /// Mark scheduled slots due before `cutoff` as missed; returns rows changed.
    async fn mark_stale_slots_missed(&self, cutoff: OffsetDateTime) -> Result<u64, RepoError>;

    /// Mark the slot and its candidate posted and write the posted record.
    async fn record_posted(
        &self,
        params: RecordPostedParams,
    ) -> Result<PostedContentRecord, RepoError>;
}

#[async_trait]
pub trait PostedContentRepo: Send + Sync {
    async fn list_posted_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<PostedContentRecord>, RepoError>;

    async fn list_posted_for_candidates(
        &self,
        candidate_ids: &[Uuid],
    ) -> Result<Vec<PostedContentRecord>, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
