use std::collections::BTreeSet;
use std::sync::Arc;

use metrics::counter;
use time::Date;
use tracing::{debug, info, warn};

use crate::application::repos::{ContentPoolRepo, EligibilityFilter, ScheduleRepo, SlotAssignment};
use crate::domain::schedule::{SLOTS_PER_DAY, SlotIndex};
use crate::util::format_iso_date;

use super::ScheduleError;
use super::calendar::SlotCalendar;
use super::policy::{FillPolicy, platform_cap, select_diverse};
use super::types::{DayFillResult, PlatformCounts};

pub const DEFAULT_MAX_PLATFORM_SHARE: f64 = 0.5;
pub const DEFAULT_CANDIDATE_WINDOW: u32 = 200;

#[derive(Debug, Clone, Copy)]
pub struct FillerOptions {
    /// Largest fraction of a day's slots one platform should hold.
    pub max_platform_share: f64,
    /// Candidates fetched per pass before the selection policy runs.
    pub candidate_window: u32,
}

impl Default for FillerOptions {
    fn default() -> Self {
        Self {
            max_platform_share: DEFAULT_MAX_PLATFORM_SHARE,
            candidate_window: DEFAULT_CANDIDATE_WINDOW,
        }
    }
}

/// Fills the empty slots of one civil day from the content pool.
#[derive(Clone)]
pub struct DayFiller {
    pool: Arc<dyn ContentPoolRepo>,
    schedule: Arc<dyn ScheduleRepo>,
    calendar: SlotCalendar,
    options: FillerOptions,
}

impl DayFiller {
    pub fn new(
        pool: Arc<dyn ContentPoolRepo>,
        schedule: Arc<dyn ScheduleRepo>,
        calendar: SlotCalendar,
        options: FillerOptions,
    ) -> Self {
        Self {
            pool,
            schedule,
            calendar,
            options,
        }
    }

    pub fn calendar(&self) -> &SlotCalendar {
        &self.calendar
    }

    /// Fill the remaining slots of `date`, trying each pass of `policy` in turn.
    ///
    /// Running out of candidates is not an error: the result simply reports
    /// `after < 6`.
    pub async fn ensure_day_filled(
        &self,
        date: Date,
        policy: &FillPolicy,
    ) -> Result<DayFillResult, ScheduleError> {
        let existing = self.schedule.list_slots_for_date(date).await?;
        let occupied: BTreeSet<SlotIndex> = existing.iter().map(|slot| slot.slot_index).collect();
        let before = occupied.len() as u32;

        if occupied.len() >= SLOTS_PER_DAY {
            debug!(
                target = "hotdog::filler",
                date = %format_iso_date(date),
                before,
                "day already full"
            );
            return Ok(DayFillResult {
                before,
                after: before,
                count_added: 0,
                platforms: PlatformCounts::new(),
            });
        }

        let mut empty: Vec<SlotIndex> = SlotIndex::all()
            .filter(|index| !occupied.contains(index))
            .collect();
        let mut day_counts = PlatformCounts::new();
        for slot in &existing {
            *day_counts.entry(slot.platform).or_insert(0) += 1;
        }
        let mut added = PlatformCounts::new();
        let cap = platform_cap(self.options.max_platform_share);

        for pass in policy.passes() {
            if empty.is_empty() {
                break;
            }

            let filter = EligibilityFilter {
                tiers: pass.tiers.clone(),
                exclude_scheduled: true,
            };
            let candidates = self
                .pool
                .list_eligible_candidates(&filter, self.options.candidate_window)
                .await?;
            if candidates.is_empty() {
                debug!(
                    target = "hotdog::filler",
                    date = %format_iso_date(date),
                    pass = pass.name,
                    "no eligible candidates"
                );
                continue;
            }

            let picks = select_diverse(candidates, empty.len(), &day_counts, cap);
            let assignments = empty
                .iter()
                .zip(&picks)
                .map(|(index, candidate)| {
                    Ok(SlotAssignment {
                        slot_index: *index,
                        scheduled_at: self.calendar.slot_instant(date, *index)?,
                        candidate_id: candidate.id,
                        platform: candidate.platform,
                    })
                })
                .collect::<Result<Vec<_>, ScheduleError>>()?;

            let claimed = self.schedule.claim_slots(date, &assignments).await?;
            let conflicts = assignments.len().saturating_sub(claimed.len());
            if conflicts > 0 {
                warn!(
                    target = "hotdog::filler",
                    date = %format_iso_date(date),
                    pass = pass.name,
                    conflicts,
                    "candidates or slots were claimed concurrently"
                );
                counter!("hotdog_claim_conflicts_total").increment(conflicts as u64);
            }

            for slot in &claimed {
                *added.entry(slot.platform).or_insert(0) += 1;
                *day_counts.entry(slot.platform).or_insert(0) += 1;
            }
            empty.retain(|index| !claimed.iter().any(|slot| slot.slot_index == *index));

            info!(
                target = "hotdog::filler",
                date = %format_iso_date(date),
                pass = pass.name,
                claimed = claimed.len(),
                remaining = empty.len(),
                "fill pass complete"
            );
        }

        let count_added: u32 = added.values().sum();
        Ok(DayFillResult {
            before,
            after: before + count_added,
            count_added,
            platforms: added,
        })
    }
}
