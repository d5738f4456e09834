use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::repos::{ContentPoolRepo, ScheduleRepo};
use crate::domain::content::{CandidateRecord, ContentType, IngestTier, Platform};
use crate::domain::schedule::{SLOTS_PER_DAY, ScheduledSlotRecord, SlotIndex, SlotStatus};

use super::ScheduleError;
use super::calendar::SlotCalendar;
use super::policy::platform_cap;
use super::types::PlatformCounts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastSlotState {
    Empty,
    Scheduled,
    Posted,
    Missed,
    Failed,
}

impl From<SlotStatus> for ForecastSlotState {
    fn from(status: SlotStatus) -> Self {
        match status {
            SlotStatus::Scheduled => Self::Scheduled,
            SlotStatus::Posted => Self::Posted,
            SlotStatus::Missed => Self::Missed,
            SlotStatus::Failed => Self::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastCandidate {
    pub id: Uuid,
    pub platform: Platform,
    pub content_type: ContentType,
    pub confidence_score: f64,
    pub content_url: Option<String>,
    pub content_text: Option<String>,
}

impl From<&CandidateRecord> for ForecastCandidate {
    fn from(record: &CandidateRecord) -> Self {
        Self {
            id: record.id,
            platform: record.platform,
            content_type: record.content_type,
            confidence_score: record.confidence_score,
            content_url: record.content_url.clone(),
            content_text: record.content_text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotForecast {
    pub index: SlotIndex,
    pub local_time: String,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
    pub status: ForecastSlotState,
    pub slot_id: Option<Uuid>,
    pub candidate: Option<ForecastCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    pub filled: u32,
    pub empty: u32,
    pub posted: u32,
    pub platforms: PlatformCounts,
    pub content_types: BTreeMap<ContentType, u32>,
    pub top_platform_share: f64,
    pub diverse: bool,
    /// Unclaimed eligible candidates per tier.
    pub pool_remaining: BTreeMap<IngestTier, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayForecast {
    #[serde(with = "crate::util::iso_date")]
    pub date: Date,
    pub timezone: String,
    pub slots: Vec<SlotForecast>,
    pub summary: ForecastSummary,
}

/// Read-only view of one day's slots.
#[derive(Clone)]
pub struct ForecastService {
    pool: Arc<dyn ContentPoolRepo>,
    schedule: Arc<dyn ScheduleRepo>,
    calendar: SlotCalendar,
    max_platform_share: f64,
}

impl ForecastService {
    pub fn new(
        pool: Arc<dyn ContentPoolRepo>,
        schedule: Arc<dyn ScheduleRepo>,
        calendar: SlotCalendar,
        max_platform_share: f64,
    ) -> Self {
        Self {
            pool,
            schedule,
            calendar,
            max_platform_share,
        }
    }

    pub async fn forecast(&self, date: Date) -> Result<DayForecast, ScheduleError> {
        let records = self.schedule.list_slots_for_date(date).await?;
        let by_index: HashMap<SlotIndex, &ScheduledSlotRecord> =
            records.iter().map(|slot| (slot.slot_index, slot)).collect();

        let candidate_ids: Vec<Uuid> = records.iter().map(|slot| slot.candidate_id).collect();
        let candidates: HashMap<Uuid, CandidateRecord> = if candidate_ids.is_empty() {
            HashMap::new()
        } else {
            self.pool
                .find_candidates(&candidate_ids)
                .await?
                .into_iter()
                .map(|candidate| (candidate.id, candidate))
                .collect()
        };

        let mut slots = Vec::with_capacity(SLOTS_PER_DAY);
        for index in SlotIndex::all() {
            let record = by_index.get(&index);
            let candidate = record
                .and_then(|slot| candidates.get(&slot.candidate_id))
                .map(ForecastCandidate::from);
            slots.push(SlotForecast {
                index,
                local_time: self.calendar.slot_label(index),
                scheduled_at: match record {
                    Some(slot) => slot.scheduled_at,
                    None => self.calendar.slot_instant(date, index)?,
                },
                status: record.map_or(ForecastSlotState::Empty, |slot| slot.status.into()),
                slot_id: record.map(|slot| slot.id),
                candidate,
            });
        }

        let mut pool_remaining: BTreeMap<IngestTier, u64> =
            IngestTier::all().iter().map(|tier| (*tier, 0)).collect();
        for stat in self.pool.pool_stats().await? {
            *pool_remaining.entry(stat.tier).or_insert(0) += stat.available;
        }

        let summary = summarize(&records, &candidates, pool_remaining, self.max_platform_share);
        Ok(DayForecast {
            date,
            timezone: self.calendar.timezone().name().to_string(),
            slots,
            summary,
        })
    }
}

fn summarize(
    records: &[ScheduledSlotRecord],
    candidates: &HashMap<Uuid, CandidateRecord>,
    pool_remaining: BTreeMap<IngestTier, u64>,
    max_platform_share: f64,
) -> ForecastSummary {
    let mut platforms = PlatformCounts::new();
    let mut content_types = BTreeMap::new();
    let mut posted = 0;
    for slot in records {
        *platforms.entry(slot.platform).or_insert(0) += 1;
        if let Some(candidate) = candidates.get(&slot.candidate_id) {
            *content_types.entry(candidate.content_type).or_insert(0) += 1;
        }
        if slot.status == SlotStatus::Posted {
            posted += 1;
        }
    }

    let filled = records.len() as u32;
    let top = platforms.values().copied().max().unwrap_or(0);
    let top_platform_share = if filled == 0 {
        0.0
    } else {
        f64::from(top) / f64::from(filled)
    };

    ForecastSummary {
        filled,
        empty: (SLOTS_PER_DAY as u32).saturating_sub(filled),
        posted,
        platforms,
        content_types,
        top_platform_share,
        diverse: top as usize <= platform_cap(max_platform_share),
        pool_remaining,
    }
}
