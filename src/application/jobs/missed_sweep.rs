//! Cron job that expires scheduled slots nobody posted.

use apalis::prelude::*;
use time::OffsetDateTime;
use tracing::warn;

use super::context::{ScheduleJobContext, job_failed};

/// Every 15 minutes.
pub const DEFAULT_SWEEP_CRON: &str = "0 */15 * * * *";

#[derive(Default, Debug, Clone)]
pub struct MissedSweepJob;

impl From<chrono::DateTime<chrono::Utc>> for MissedSweepJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

pub async fn process_missed_sweep_job(
    _job: MissedSweepJob,
    ctx: Data<ScheduleJobContext>,
) -> Result<(), apalis::prelude::Error> {
    ctx.outcomes
        .sweep_missed(OffsetDateTime::now_utc())
        .await
        .map(|_| ())
        .map_err(|err| {
            warn!(target = "hotdog::outcomes", error = %err, "missed-slot sweep failed");
            job_failed(err)
        })
}
