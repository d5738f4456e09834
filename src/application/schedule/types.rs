use std::collections::BTreeMap;

use serde::Serialize;
use time::Date;

use crate::domain::content::Platform;
use crate::domain::schedule::SLOTS_PER_DAY;

pub type PlatformCounts = BTreeMap<Platform, u32>;

/// Outcome of one `ensure_day_filled` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DayFillResult {
    pub before: u32,
    pub after: u32,
    pub count_added: u32,
    /// Platforms of the candidates added by this call only.
    pub platforms: PlatformCounts,
}

impl DayFillResult {
    pub fn is_complete(&self) -> bool {
        self.after as usize >= SLOTS_PER_DAY
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatedFill {
    #[serde(with = "crate::util::iso_date")]
    pub date: Date,
    #[serde(flatten)]
    pub result: DayFillResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefillSummary {
    pub total_before: u32,
    pub total_after: u32,
    pub total_added: u32,
    pub combined_platforms: PlatformCounts,
    pub days_complete: u32,
    pub days_total: u32,
}

impl RefillSummary {
    pub fn from_days(days: &[DatedFill]) -> Self {
        days.iter().fold(Self::default(), |mut summary, day| {
            summary.total_before += day.result.before;
            summary.total_after += day.result.after;
            summary.total_added += day.result.count_added;
            for (platform, count) in &day.result.platforms {
                *summary.combined_platforms.entry(*platform).or_insert(0) += count;
            }
            if day.result.is_complete() {
                summary.days_complete += 1;
            }
            summary.days_total += 1;
            summary
        })
    }
}

/// Refill of a run of consecutive days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefillReport {
    pub days: Vec<DatedFill>,
    pub summary: RefillSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TwoDayRefillResult {
    pub today: DatedFill,
    pub tomorrow: DatedFill,
    pub summary: RefillSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn day(date: Date, before: u32, added: &[(Platform, u32)]) -> DatedFill {
        let platforms: PlatformCounts = added.iter().copied().collect();
        let count_added = platforms.values().sum();
        DatedFill {
            date,
            result: DayFillResult {
                before,
                after: before + count_added,
                count_added,
                platforms,
            },
        }
    }

    #[test]
    fn summary_sums_both_days() {
        let today = day(date!(2025 - 10 - 31), 2, &[(Platform::Reddit, 1), (Platform::Giphy, 3)]);
        let tomorrow = day(date!(2025 - 11 - 01), 0, &[(Platform::Reddit, 1), (Platform::Lemmy, 2)]);

        let summary = RefillSummary::from_days(&[today, tomorrow]);
        assert_eq!(summary.total_before, 2);
        assert_eq!(summary.total_added, 7);
        assert_eq!(summary.total_after, 9);
        assert_eq!(summary.combined_platforms[&Platform::Reddit], 2);
        assert_eq!(summary.combined_platforms[&Platform::Giphy], 3);
        assert_eq!(summary.combined_platforms[&Platform::Lemmy], 2);
        assert_eq!(summary.days_complete, 1);
        assert_eq!(summary.days_total, 2);
    }
}
