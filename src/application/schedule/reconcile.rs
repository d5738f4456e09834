use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use time::{Date, Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{PostedContentRepo, RepoError, ScheduleRepo};
use crate::domain::content::PostedContentRecord;
use crate::domain::schedule::{ScheduledSlotRecord, SlotIndex, SlotStatus};
use crate::util::format_iso_date;

use super::ScheduleError;
use super::calendar::SlotCalendar;

pub const DEFAULT_MISSED_GRACE: Duration = Duration::minutes(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRef {
    pub slot_id: Uuid,
    pub slot_index: SlotIndex,
    pub candidate_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
}

impl From<&ScheduledSlotRecord> for SlotRef {
    fn from(slot: &ScheduledSlotRecord) -> Self {
        Self {
            slot_id: slot.id,
            slot_index: slot.slot_index,
            candidate_id: slot.candidate_id,
            scheduled_at: slot.scheduled_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Slot still scheduled although its candidate was posted.
    PostedButScheduled,
    /// Slot marked posted without any posted record.
    PostedWithoutRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMismatch {
    pub slot: SlotRef,
    pub kind: MismatchKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateClaim {
    pub candidate_id: Uuid,
    pub kept_slot_id: Uuid,
    pub extra_slot_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairCounts {
    pub marked_missed: u32,
    pub marked_posted: u32,
    pub released: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    #[serde(with = "crate::util::iso_date")]
    pub date: Date,
    pub repair: bool,
    pub checked_slots: u32,
    pub scheduled_not_posted: Vec<SlotRef>,
    pub posted_unscheduled: Vec<PostedContentRecord>,
    pub status_mismatches: Vec<StatusMismatch>,
    pub duplicate_claims: Vec<DuplicateClaim>,
    pub repaired: RepairCounts,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.scheduled_not_posted.is_empty()
            && self.posted_unscheduled.is_empty()
            && self.status_mismatches.is_empty()
            && self.duplicate_claims.is_empty()
    }
}

/// Compares a day's slots with what was actually posted.
#[derive(Clone)]
pub struct ReconcileService {
    schedule: Arc<dyn ScheduleRepo>,
    posted: Arc<dyn PostedContentRepo>,
    calendar: SlotCalendar,
    grace: Duration,
}

impl ReconcileService {
    pub fn new(
        schedule: Arc<dyn ScheduleRepo>,
        posted: Arc<dyn PostedContentRepo>,
        calendar: SlotCalendar,
        grace: Duration,
    ) -> Self {
        Self {
            schedule,
            posted,
            calendar,
            grace,
        }
    }

    pub async fn reconcile(&self, date: Date, repair: bool) -> Result<ReconcileReport, ScheduleError> {
        self.reconcile_at(date, repair, OffsetDateTime::now_utc()).await
    }

    /// Reconcile `date` as observed at `now`.
    pub async fn reconcile_at(
        &self,
        date: Date,
        repair: bool,
        now: OffsetDateTime,
    ) -> Result<ReconcileReport, ScheduleError> {
        let slots = self.schedule.list_slots_for_date(date).await?;
        let (start, end) = self.calendar.day_bounds(date)?;
        let posted_in_day = self.posted.list_posted_between(start, end).await?;

        let slot_candidates: HashSet<Uuid> = slots.iter().map(|slot| slot.candidate_id).collect();
        let candidate_ids: Vec<Uuid> = slot_candidates.iter().copied().collect();
        let posted_for_slots: HashMap<Uuid, PostedContentRecord> = if candidate_ids.is_empty() {
            HashMap::new()
        } else {
            self.posted
                .list_posted_for_candidates(&candidate_ids)
                .await?
                .into_iter()
                .map(|record| (record.candidate_id, record))
                .collect()
        };

        let duplicate_claims = group_duplicates(self.schedule.list_duplicate_claims().await?, date);
        let extras: HashSet<Uuid> = duplicate_claims
            .iter()
            .flat_map(|claim| claim.extra_slot_ids.iter().copied())
            .collect();

        let mut scheduled_not_posted = Vec::new();
        let mut status_mismatches = Vec::new();
        // Extra duplicate claims are reported and repaired as duplicates only.
        for slot in slots.iter().filter(|slot| !extras.contains(&slot.id)) {
            match slot.status {
                SlotStatus::Scheduled if posted_for_slots.contains_key(&slot.candidate_id) => {
                    status_mismatches.push(StatusMismatch {
                        slot: slot.into(),
                        kind: MismatchKind::PostedButScheduled,
                    });
                }
                SlotStatus::Scheduled if slot.scheduled_at + self.grace < now => {
                    scheduled_not_posted.push(SlotRef::from(slot));
                }
                SlotStatus::Posted if !posted_for_slots.contains_key(&slot.candidate_id) => {
                    status_mismatches.push(StatusMismatch {
                        slot: slot.into(),
                        kind: MismatchKind::PostedWithoutRecord,
                    });
                }
                _ => {}
            }
        }

        let posted_unscheduled: Vec<PostedContentRecord> = posted_in_day
            .into_iter()
            .filter(|record| !slot_candidates.contains(&record.candidate_id))
            .collect();

        let mut repaired = RepairCounts::default();
        if repair {
            for claim in &duplicate_claims {
                for slot_id in &claim.extra_slot_ids {
                    match self.schedule.release_slot(*slot_id).await {
                        Ok(()) => repaired.released += 1,
                        Err(RepoError::NotFound) => {}
                        Err(err) => return Err(err.into()),
                    }
                }
            }
            // Slots settled by a concurrent outcome or sweep are left alone.
            for slot in &scheduled_not_posted {
                if self
                    .schedule
                    .update_slot_status(slot.slot_id, SlotStatus::Missed, None)
                    .await?
                {
                    repaired.marked_missed += 1;
                }
            }
            for mismatch in &status_mismatches {
                if mismatch.kind == MismatchKind::PostedButScheduled
                    && self
                        .schedule
                        .update_slot_status(mismatch.slot.slot_id, SlotStatus::Posted, None)
                        .await?
                {
                    repaired.marked_posted += 1;
                }
            }
            if repaired.marked_missed > 0 {
                counter!("hotdog_slots_missed_total").increment(u64::from(repaired.marked_missed));
            }
        }

        let report = ReconcileReport {
            date,
            repair,
            checked_slots: slots.len() as u32,
            scheduled_not_posted,
            posted_unscheduled,
            status_mismatches,
            duplicate_claims,
            repaired,
        };

        if report.is_clean() {
            info!(
                target = "hotdog::reconcile",
                date = %format_iso_date(date),
                checked = report.checked_slots,
                "schedule consistent"
            );
        } else {
            warn!(
                target = "hotdog::reconcile",
                date = %format_iso_date(date),
                scheduled_not_posted = report.scheduled_not_posted.len(),
                posted_unscheduled = report.posted_unscheduled.len(),
                mismatches = report.status_mismatches.len(),
                duplicates = report.duplicate_claims.len(),
                repair,
                "schedule drift detected"
            );
        }

        Ok(report)
    }
}

/// Group pending slots sharing a candidate, keeping the earliest slot of each
/// group. Only groups touching `date` are reported.
fn group_duplicates(slots: Vec<ScheduledSlotRecord>, date: Date) -> Vec<DuplicateClaim> {
    let mut groups: BTreeMap<Uuid, Vec<ScheduledSlotRecord>> = BTreeMap::new();
    for slot in slots.into_iter().filter(|slot| slot.status.is_pending()) {
        groups.entry(slot.candidate_id).or_default().push(slot);
    }

    groups
        .into_iter()
        .filter(|(_, group)| group.len() > 1 && group.iter().any(|slot| slot.slot_date == date))
        .map(|(candidate_id, mut group)| {
            group.sort_by_key(|slot| (slot.scheduled_at, slot.created_at));
            let kept = group.remove(0);
            DuplicateClaim {
                candidate_id,
                kept_slot_id: kept.id,
                extra_slot_ids: group.into_iter().map(|slot| slot.id).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content::Platform;
    use time::macros::{date, datetime};

    fn slot(candidate_id: Uuid, date: Date, index: u8, at: OffsetDateTime) -> ScheduledSlotRecord {
        ScheduledSlotRecord {
            id: Uuid::new_v4(),
            slot_date: date,
            slot_index: SlotIndex::new(index).expect("index"),
            scheduled_at: at,
            candidate_id,
            platform: Platform::Imgur,
            status: SlotStatus::Scheduled,
            posted_at: None,
            error: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn duplicate_groups_keep_earliest_slot() {
        let candidate = Uuid::new_v4();
        let later = slot(candidate, date!(2025 - 11 - 01), 0, datetime!(2025-11-01 12:00 UTC));
        let earlier = slot(candidate, date!(2025 - 10 - 31), 5, datetime!(2025-11-01 03:30 UTC));
        let (later_id, earlier_id) = (later.id, earlier.id);

        let claims = group_duplicates(vec![later, earlier], date!(2025 - 10 - 31));
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].kept_slot_id, earlier_id);
        assert_eq!(claims[0].extra_slot_ids, vec![later_id]);
    }

    #[test]
    fn duplicate_groups_outside_date_are_skipped() {
        let candidate = Uuid::new_v4();
        let a = slot(candidate, date!(2025 - 11 - 02), 0, datetime!(2025-11-02 13:00 UTC));
        let b = slot(candidate, date!(2025 - 11 - 03), 0, datetime!(2025-11-03 13:00 UTC));

        assert!(group_duplicates(vec![a, b], date!(2025 - 10 - 31)).is_empty());
    }
}
