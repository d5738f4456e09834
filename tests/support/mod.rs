//! In-memory repositories shared by the integration tests.
#![allow(dead_code)]

use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use time::{Date, OffsetDateTime, macros::datetime};
use tokio::sync::Mutex;
use uuid::Uuid;

use hotdog_diaries::application::repos::{
    ContentPoolRepo, EligibilityFilter, HealthRepo, PoolStat, PostedContentRepo,
    RecordPostedParams, RepoError, ScheduleRepo, SlotAssignment,
};
use hotdog_diaries::application::schedule::{
    DayFiller, FillerOptions, ForecastService, ReconcileService, RefillService, SlotCalendar,
    SlotOutcomeService,
};
use hotdog_diaries::domain::content::{
    CandidateRecord, ContentType, IngestTier, Platform, PostedContentRecord,
};
use hotdog_diaries::domain::schedule::{ScheduledSlotRecord, SlotIndex, SlotStatus};

#[derive(Default)]
struct StoreState {
    candidates: Vec<CandidateRecord>,
    slots: Vec<ScheduledSlotRecord>,
    posted: Vec<PostedContentRecord>,
    queried_dates: Vec<Date>,
    claim_calls: usize,
    healthy: bool,
    failing_claim_dates: Vec<Date>,
    miss_after_lookup: Vec<Uuid>,
}

/// Content pool, schedule and posted history held behind one lock so claims
/// see a consistent view, the way a database transaction would.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                healthy: true,
                ..StoreState::default()
            })),
        }
    }

    pub async fn add_candidate(&self, candidate: CandidateRecord) -> Uuid {
        let id = candidate.id;
        self.state.lock().await.candidates.push(candidate);
        id
    }

    pub async fn add_candidates(&self, candidates: Vec<CandidateRecord>) -> Vec<Uuid> {
        let ids = candidates.iter().map(|candidate| candidate.id).collect();
        self.state.lock().await.candidates.extend(candidates);
        ids
    }

    /// Insert a slot directly, bypassing claim checks.
    pub async fn insert_slot(&self, slot: ScheduledSlotRecord) {
        self.state.lock().await.slots.push(slot);
    }

    pub async fn insert_posted(&self, record: PostedContentRecord) {
        self.state.lock().await.posted.push(record);
    }

    pub async fn slots(&self) -> Vec<ScheduledSlotRecord> {
        self.state.lock().await.slots.clone()
    }

    pub async fn slots_for(&self, date: Date) -> Vec<ScheduledSlotRecord> {
        let mut slots: Vec<_> = self
            .state
            .lock()
            .await
            .slots
            .iter()
            .filter(|slot| slot.slot_date == date)
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.slot_index);
        slots
    }

    pub async fn candidate(&self, id: Uuid) -> Option<CandidateRecord> {
        self.state
            .lock()
            .await
            .candidates
            .iter()
            .find(|candidate| candidate.id == id)
            .cloned()
    }

    pub async fn posted(&self) -> Vec<PostedContentRecord> {
        self.state.lock().await.posted.clone()
    }

    pub async fn queried_dates(&self) -> Vec<Date> {
        self.state.lock().await.queried_dates.clone()
    }

    pub async fn claim_calls(&self) -> usize {
        self.state.lock().await.claim_calls
    }

    pub async fn set_healthy(&self, healthy: bool) {
        self.state.lock().await.healthy = healthy;
    }

    /// Make every claim for `date` fail with a persistence error.
    pub async fn fail_claims_on(&self, date: Date) {
        self.state.lock().await.failing_claim_dates.push(date);
    }

    /// Let the next lookup of `slot_id` see it scheduled, then mark it missed,
    /// as if the sweep ran right after the read.
    pub async fn miss_after_lookup(&self, slot_id: Uuid) {
        self.state.lock().await.miss_after_lookup.push(slot_id);
    }
}

fn is_held(slots: &[ScheduledSlotRecord], candidate_id: Uuid) -> bool {
    slots.iter().any(|slot| {
        slot.candidate_id == candidate_id
            && matches!(slot.status, SlotStatus::Scheduled | SlotStatus::Posted)
    })
}

#[async_trait]
impl ContentPoolRepo for MemoryStore {
    async fn list_eligible_candidates(
        &self,
        filter: &EligibilityFilter,
        limit: u32,
    ) -> Result<Vec<CandidateRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut eligible: Vec<CandidateRecord> = state
            .candidates
            .iter()
            .filter(|candidate| candidate.is_approved && !candidate.is_posted)
            .filter(|candidate| filter.tiers.contains(&candidate.ingest_tier))
            .filter(|candidate| !filter.exclude_scheduled || !is_held(&state.slots, candidate.id))
            .cloned()
            .collect();

        let tier_rank = |tier: IngestTier| filter.tiers.iter().position(|t| *t == tier);
        eligible.sort_by(|a, b| {
            tier_rank(a.ingest_tier)
                .cmp(&tier_rank(b.ingest_tier))
                .then(b.confidence_score.total_cmp(&a.confidence_score))
                .then(b.scraped_at.cmp(&a.scraped_at))
                .then(a.id.cmp(&b.id))
        });
        eligible.truncate(limit as usize);
        Ok(eligible)
    }

    async fn find_candidates(&self, ids: &[Uuid]) -> Result<Vec<CandidateRecord>, RepoError> {
        Ok(self
            .state
            .lock()
            .await
            .candidates
            .iter()
            .filter(|candidate| ids.contains(&candidate.id))
            .cloned()
            .collect())
    }

    async fn pool_stats(&self) -> Result<Vec<PoolStat>, RepoError> {
        let state = self.state.lock().await;
        let mut stats: Vec<PoolStat> = Vec::new();
        for candidate in state
            .candidates
            .iter()
            .filter(|candidate| candidate.is_approved && !candidate.is_posted)
            .filter(|candidate| !is_held(&state.slots, candidate.id))
        {
            match stats
                .iter_mut()
                .find(|stat| stat.platform == candidate.platform && stat.tier == candidate.ingest_tier)
            {
                Some(stat) => stat.available += 1,
                None => stats.push(PoolStat {
                    platform: candidate.platform,
                    tier: candidate.ingest_tier,
                    available: 1,
                }),
            }
        }
        Ok(stats)
    }

    async fn set_platform_tier(
        &self,
        platform: Platform,
        tier: IngestTier,
    ) -> Result<u64, RepoError> {
        let mut state = self.state.lock().await;
        let mut updated = 0;
        for candidate in state
            .candidates
            .iter_mut()
            .filter(|candidate| candidate.platform == platform && !candidate.is_posted)
            .filter(|candidate| candidate.ingest_tier != tier)
        {
            candidate.ingest_tier = tier;
            updated += 1;
        }
        Ok(updated)
    }
}

#[async_trait]
impl ScheduleRepo for MemoryStore {
    async fn list_slots_for_date(
        &self,
        date: Date,
    ) -> Result<Vec<ScheduledSlotRecord>, RepoError> {
        let mut state = self.state.lock().await;
        state.queried_dates.push(date);
        let mut slots: Vec<_> = state
            .slots
            .iter()
            .filter(|slot| slot.slot_date == date)
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.slot_index);
        Ok(slots)
    }

    async fn claim_slots(
        &self,
        date: Date,
        assignments: &[SlotAssignment],
    ) -> Result<Vec<ScheduledSlotRecord>, RepoError> {
        let mut state = self.state.lock().await;
        state.claim_calls += 1;
        if state.failing_claim_dates.contains(&date) {
            return Err(RepoError::from_persistence("connection reset by peer"));
        }

        let mut claimed = Vec::new();
        for assignment in assignments {
            let position_taken = state
                .slots
                .iter()
                .any(|slot| slot.slot_date == date && slot.slot_index == assignment.slot_index);
            let candidate_ok = state.candidates.iter().any(|candidate| {
                candidate.id == assignment.candidate_id
                    && candidate.is_approved
                    && !candidate.is_posted
            });
            if position_taken || !candidate_ok || is_held(&state.slots, assignment.candidate_id) {
                continue;
            }

            let now = OffsetDateTime::now_utc();
            let record = ScheduledSlotRecord {
                id: Uuid::new_v4(),
                slot_date: date,
                slot_index: assignment.slot_index,
                scheduled_at: assignment.scheduled_at,
                candidate_id: assignment.candidate_id,
                platform: assignment.platform,
                status: SlotStatus::Scheduled,
                posted_at: None,
                error: None,
                created_at: now,
                updated_at: now,
            };
            state.slots.push(record.clone());
            claimed.push(record);
        }
        Ok(claimed)
    }

    async fn find_slot(&self, id: Uuid) -> Result<Option<ScheduledSlotRecord>, RepoError> {
        let mut state = self.state.lock().await;
        let found = state.slots.iter().find(|slot| slot.id == id).cloned();
        if let Some(position) = state.miss_after_lookup.iter().position(|slot_id| *slot_id == id) {
            state.miss_after_lookup.remove(position);
            if let Some(slot) = state.slots.iter_mut().find(|slot| slot.id == id) {
                slot.status = SlotStatus::Missed;
            }
        }
        Ok(found)
    }

    async fn list_duplicate_claims(&self) -> Result<Vec<ScheduledSlotRecord>, RepoError> {
        let state = self.state.lock().await;
        let pending: Vec<&ScheduledSlotRecord> = state
            .slots
            .iter()
            .filter(|slot| slot.status == SlotStatus::Scheduled)
            .collect();
        Ok(pending
            .iter()
            .filter(|slot| {
                pending
                    .iter()
                    .filter(|other| other.candidate_id == slot.candidate_id)
                    .count()
                    > 1
            })
            .map(|slot| (*slot).clone())
            .collect())
    }

    async fn update_slot_status(
        &self,
        id: Uuid,
        status: SlotStatus,
        error: Option<String>,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        let Some(slot) = state
            .slots
            .iter_mut()
            .find(|slot| slot.id == id && slot.status == SlotStatus::Scheduled)
        else {
            return Ok(false);
        };
        slot.status = status;
        if error.is_some() {
            slot.error = error;
        }
        if status == SlotStatus::Posted && slot.posted_at.is_none() {
            slot.posted_at = Some(OffsetDateTime::now_utc());
        }
        slot.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn release_slot(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let before = state.slots.len();
        state
            .slots
            .retain(|slot| !(slot.id == id && slot.status == SlotStatus::Scheduled));
        if state.slots.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn mark_stale_slots_missed(&self, cutoff: OffsetDateTime) -> Result<u64, RepoError> {
        let mut state = self.state.lock().await;
        let mut missed = 0;
        for slot in state
            .slots
            .iter_mut()
            .filter(|slot| slot.status == SlotStatus::Scheduled && slot.scheduled_at < cutoff)
        {
            slot.status = SlotStatus::Missed;
            missed += 1;
        }
        Ok(missed)
    }

    async fn record_posted(
        &self,
        params: RecordPostedParams,
    ) -> Result<PostedContentRecord, RepoError> {
        let mut state = self.state.lock().await;
        let slot = state
            .slots
            .iter_mut()
            .find(|slot| slot.id == params.slot_id)
            .ok_or(RepoError::NotFound)?;
        if slot.status != SlotStatus::Scheduled {
            return Err(RepoError::Integrity {
                message: format!("slot {} is already {}", slot.id, slot.status),
            });
        }
        slot.status = SlotStatus::Posted;
        slot.posted_at = Some(params.posted_at);
        slot.error = None;
        let candidate_id = slot.candidate_id;
        let platform = slot.platform;

        if let Some(candidate) = state
            .candidates
            .iter_mut()
            .find(|candidate| candidate.id == candidate_id)
        {
            candidate.is_posted = true;
            candidate.posted_at = Some(params.posted_at);
        }

        let record = PostedContentRecord {
            id: Uuid::new_v4(),
            candidate_id,
            slot_id: Some(params.slot_id),
            platform,
            posted_at: params.posted_at,
            external_id: params.external_id,
        };
        state.posted.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl PostedContentRepo for MemoryStore {
    async fn list_posted_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<PostedContentRecord>, RepoError> {
        let mut posted: Vec<_> = self
            .state
            .lock()
            .await
            .posted
            .iter()
            .filter(|record| record.posted_at >= start && record.posted_at < end)
            .cloned()
            .collect();
        posted.sort_by_key(|record| record.posted_at);
        Ok(posted)
    }

    async fn list_posted_for_candidates(
        &self,
        candidate_ids: &[Uuid],
    ) -> Result<Vec<PostedContentRecord>, RepoError> {
        Ok(self
            .state
            .lock()
            .await
            .posted
            .iter()
            .filter(|record| candidate_ids.contains(&record.candidate_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.state.lock().await.healthy {
            Ok(())
        } else {
            Err(RepoError::Timeout)
        }
    }
}

/// Approved, unposted candidate scraped at a fixed instant.
pub fn candidate(platform: Platform, tier: IngestTier, confidence: f64) -> CandidateRecord {
    CandidateRecord {
        id: Uuid::new_v4(),
        platform,
        content_type: ContentType::Image,
        content_text: Some(format!("{platform} hotdog")),
        content_url: None,
        confidence_score: confidence,
        is_approved: true,
        ingest_tier: tier,
        is_posted: false,
        scraped_at: datetime!(2025-10-30 12:00 UTC),
        posted_at: None,
    }
}

/// `count` active candidates cycling through a few platforms.
pub fn diverse_pool(count: usize) -> Vec<CandidateRecord> {
    const PLATFORMS: [Platform; 4] = [
        Platform::Reddit,
        Platform::Giphy,
        Platform::Imgur,
        Platform::Tumblr,
    ];
    (0..count)
        .map(|i| {
            candidate(
                PLATFORMS[i % PLATFORMS.len()],
                IngestTier::Active,
                0.99 - i as f64 * 0.01,
            )
        })
        .collect()
}

pub fn slot_record(
    calendar: &SlotCalendar,
    date: Date,
    index: u8,
    candidate_id: Uuid,
    status: SlotStatus,
) -> ScheduledSlotRecord {
    let slot_index = SlotIndex::new(index).expect("valid slot index");
    let scheduled_at = calendar
        .slot_instant(date, slot_index)
        .expect("slot instant resolves");
    ScheduledSlotRecord {
        id: Uuid::new_v4(),
        slot_date: date,
        slot_index,
        scheduled_at,
        candidate_id,
        platform: Platform::Reddit,
        status,
        posted_at: None,
        error: None,
        created_at: scheduled_at - time::Duration::days(1),
        updated_at: scheduled_at - time::Duration::days(1),
    }
}

pub fn filler(store: &MemoryStore) -> DayFiller {
    DayFiller::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        SlotCalendar::default(),
        FillerOptions::default(),
    )
}

pub fn refill_service(store: &MemoryStore) -> RefillService {
    RefillService::new(filler(store))
}

pub fn forecast_service(store: &MemoryStore) -> ForecastService {
    ForecastService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        SlotCalendar::default(),
        FillerOptions::default().max_platform_share,
    )
}

pub fn reconcile_service(store: &MemoryStore) -> ReconcileService {
    ReconcileService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        SlotCalendar::default(),
        time::Duration::minutes(30),
    )
}

pub fn outcome_service(store: &MemoryStore) -> SlotOutcomeService {
    SlotOutcomeService::new(Arc::new(store.clone()), time::Duration::minutes(30))
}
