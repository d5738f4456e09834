//! Cron job that keeps today and tomorrow filled.

use apalis::prelude::*;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::util::format_iso_date;

use super::context::{ScheduleJobContext, job_failed};

/// 10:00 and 22:00 UTC every day.
pub const DEFAULT_REFILL_CRON: &str = "0 0 10,22 * * *";

/// Marker struct for the cron-triggered refill.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct RefillJob;

impl From<chrono::DateTime<chrono::Utc>> for RefillJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

pub async fn process_refill_job(
    _job: RefillJob,
    ctx: Data<ScheduleJobContext>,
) -> Result<(), apalis::prelude::Error> {
    let today = ctx
        .calendar
        .today(OffsetDateTime::now_utc())
        .map_err(job_failed)?;

    match ctx.refill.refill_two_days(today).await {
        Ok(result) => {
            info!(
                target = "hotdog::refill",
                date = %format_iso_date(today),
                today_after = result.today.result.after,
                tomorrow_after = result.tomorrow.result.after,
                added = result.summary.total_added,
                "scheduled refill complete"
            );
            Ok(())
        }
        Err(err) => {
            error!(
                target = "hotdog::refill",
                date = %format_iso_date(today),
                error = %err,
                "scheduled refill failed"
            );
            Err(job_failed(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use apalis_cron::Schedule;
    use chrono::{TimeZone, Timelike, Utc};

    use super::*;

    #[test]
    fn default_schedule_runs_twice_daily() {
        let schedule = Schedule::from_str(DEFAULT_REFILL_CRON).expect("valid cron");
        let start = Utc.with_ymd_and_hms(2025, 10, 31, 0, 0, 0).unwrap();
        let hours: Vec<u32> = schedule.after(&start).take(4).map(|at| at.hour()).collect();
        assert_eq!(hours, vec![10, 22, 10, 22]);
    }
}
