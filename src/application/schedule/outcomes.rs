use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{RecordPostedParams, ScheduleRepo};
use crate::domain::content::PostedContentRecord;
use crate::domain::schedule::{ScheduledSlotRecord, SlotStatus};

use super::ScheduleError;

/// Result reported by the posting job for one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    Posted {
        posted_at: OffsetDateTime,
        external_id: Option<String>,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotOutcomeReceipt {
    pub slot: ScheduledSlotRecord,
    pub posted: Option<PostedContentRecord>,
}

/// Applies posting results and expires slots nobody posted.
#[derive(Clone)]
pub struct SlotOutcomeService {
    schedule: Arc<dyn ScheduleRepo>,
    grace: Duration,
}

impl SlotOutcomeService {
    pub fn new(schedule: Arc<dyn ScheduleRepo>, grace: Duration) -> Self {
        Self { schedule, grace }
    }

    pub async fn record_outcome(
        &self,
        slot_id: Uuid,
        outcome: SlotOutcome,
    ) -> Result<SlotOutcomeReceipt, ScheduleError> {
        let slot = self
            .schedule
            .find_slot(slot_id)
            .await?
            .ok_or(ScheduleError::SlotNotFound)?;
        if !slot.status.is_pending() {
            return Err(ScheduleError::SlotNotPending(slot.status));
        }

        let posted = match outcome {
            SlotOutcome::Posted {
                posted_at,
                external_id,
            } => {
                let record = self
                    .schedule
                    .record_posted(RecordPostedParams {
                        slot_id,
                        posted_at,
                        external_id,
                    })
                    .await?;
                info!(
                    target = "hotdog::outcomes",
                    slot_id = %slot_id,
                    platform = %slot.platform,
                    "slot posted"
                );
                Some(record)
            }
            SlotOutcome::Failed { error } => {
                warn!(
                    target = "hotdog::outcomes",
                    slot_id = %slot_id,
                    platform = %slot.platform,
                    error = %error,
                    "slot failed to post"
                );
                let updated = self
                    .schedule
                    .update_slot_status(slot_id, SlotStatus::Failed, Some(error))
                    .await?;
                if !updated {
                    // Settled since the lookup above, most likely by the sweep.
                    let current = self
                        .schedule
                        .find_slot(slot_id)
                        .await?
                        .ok_or(ScheduleError::SlotNotFound)?;
                    return Err(ScheduleError::SlotNotPending(current.status));
                }
                None
            }
        };

        let slot = self
            .schedule
            .find_slot(slot_id)
            .await?
            .ok_or(ScheduleError::SlotNotFound)?;
        Ok(SlotOutcomeReceipt { slot, posted })
    }

    /// Mark scheduled slots older than the grace window as missed.
    pub async fn sweep_missed(&self, now: OffsetDateTime) -> Result<u64, ScheduleError> {
        let cutoff = now - self.grace;
        let missed = self.schedule.mark_stale_slots_missed(cutoff).await?;
        if missed > 0 {
            counter!("hotdog_slots_missed_total").increment(missed);
            info!(target = "hotdog::outcomes", missed, "marked stale slots missed");
        }
        Ok(missed)
    }
}
