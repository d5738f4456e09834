use std::time::Instant;

use metrics::{counter, histogram};
use time::Date;
use tracing::{info, warn};

use crate::domain::error::DomainError;
use crate::util::format_iso_date;

use super::ScheduleError;
use super::filler::DayFiller;
use super::policy::FillPolicy;
use super::types::{DatedFill, RefillReport, RefillSummary, TwoDayRefillResult};

/// Longest run of days a single refill may cover.
pub const MAX_REFILL_DAYS: u32 = 7;

/// Refills consecutive civil days, oldest first.
#[derive(Clone)]
pub struct RefillService {
    filler: DayFiller,
}

impl RefillService {
    pub fn new(filler: DayFiller) -> Self {
        Self { filler }
    }

    /// Fill `days` consecutive days starting at `start` with the aggressive
    /// fallback enabled.
    ///
    /// Days are filled one after another so a later day never competes with
    /// an earlier one for the same candidate. The first repository failure
    /// aborts the run.
    pub async fn refill_days(&self, start: Date, days: u32) -> Result<RefillReport, ScheduleError> {
        if !(1..=MAX_REFILL_DAYS).contains(&days) {
            return Err(ScheduleError::InvalidSpan {
                requested: days,
                max: MAX_REFILL_DAYS,
            });
        }

        info!(
            target = "hotdog::refill",
            start = %format_iso_date(start),
            days,
            timezone = %self.filler.calendar().timezone(),
            "refill started"
        );

        let started = Instant::now();
        let policy = FillPolicy::with_fallback();
        let mut fills = Vec::with_capacity(days as usize);
        let mut date = start;
        for offset in 0..days {
            if offset > 0 {
                date = self.filler.calendar().next_day(date)?;
            }

            let result = self.filler.ensure_day_filled(date, &policy).await?;
            info!(
                target = "hotdog::refill",
                date = %format_iso_date(date),
                before = result.before,
                after = result.after,
                added = result.count_added,
                "day refilled"
            );
            for (platform, count) in &result.platforms {
                counter!("hotdog_refill_slots_added_total", "platform" => platform.as_str())
                    .increment(u64::from(*count));
            }
            if !result.is_complete() {
                warn!(
                    target = "hotdog::refill",
                    date = %format_iso_date(date),
                    after = result.after,
                    "content pool exhausted before the day was full"
                );
                counter!("hotdog_refill_underfilled_days_total").increment(1);
            }

            fills.push(DatedFill { date, result });
        }

        let summary = RefillSummary::from_days(&fills);
        histogram!("hotdog_refill_duration_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        info!(
            target = "hotdog::refill",
            total_before = summary.total_before,
            total_after = summary.total_after,
            total_added = summary.total_added,
            days_complete = summary.days_complete,
            days_total = summary.days_total,
            "refill finished"
        );

        Ok(RefillReport {
            days: fills,
            summary,
        })
    }

    /// Fill `date` and the day after it.
    pub async fn refill_two_days(&self, date: Date) -> Result<TwoDayRefillResult, ScheduleError> {
        let report = self.refill_days(date, 2).await?;
        let mut days = report.days.into_iter();
        match (days.next(), days.next()) {
            (Some(today), Some(tomorrow)) => Ok(TwoDayRefillResult {
                today,
                tomorrow,
                summary: report.summary,
            }),
            _ => Err(DomainError::invariant("two-day refill did not produce two days").into()),
        }
    }
}
