use chrono_tz::Tz;
use time::{Date, OffsetDateTime, Time, format_description::BorrowedFormatItem, macros::format_description};

use crate::domain::schedule::{SLOTS_PER_DAY, SlotIndex};
use crate::util::timezone::{self, TimezoneError};

const SLOT_LABEL_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]");

/// Wall-clock posting times for the six daily slots in the posting timezone.
#[derive(Debug, Clone)]
pub struct SlotCalendar {
    tz: Tz,
    times: [Time; SLOTS_PER_DAY],
}

impl SlotCalendar {
    pub fn new(tz: Tz, times: [Time; SLOTS_PER_DAY]) -> Self {
        Self { tz, times }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn slot_time(&self, index: SlotIndex) -> Time {
        self.times[index.as_usize()]
    }

    pub fn slot_label(&self, index: SlotIndex) -> String {
        self.slot_time(index)
            .format(SLOT_LABEL_FORMAT)
            .unwrap_or_else(|_| self.slot_time(index).to_string())
    }

    /// UTC instant at which slot `index` of civil day `date` posts.
    pub fn slot_instant(&self, date: Date, index: SlotIndex) -> Result<OffsetDateTime, TimezoneError> {
        timezone::local_instant(date, self.slot_time(index), self.tz)
    }

    pub fn day_bounds(&self, date: Date) -> Result<(OffsetDateTime, OffsetDateTime), TimezoneError> {
        timezone::day_bounds(date, self.tz)
    }

    /// Civil date in the posting timezone at `now`.
    pub fn today(&self, now: OffsetDateTime) -> Result<Date, TimezoneError> {
        timezone::civil_date(now, self.tz)
    }

    /// The civil day after `date`; calendar arithmetic only, independent of offsets.
    pub fn next_day(&self, date: Date) -> Result<Date, TimezoneError> {
        date.next_day().ok_or(TimezoneError::DateOutOfRange(date))
    }
}

impl Default for SlotCalendar {
    fn default() -> Self {
        Self::new(chrono_tz::America::New_York, DEFAULT_SLOT_TIMES)
    }
}

pub const DEFAULT_SLOT_TIMES: [Time; SLOTS_PER_DAY] = [
    time::macros::time!(08:00),
    time::macros::time!(12:00),
    time::macros::time!(15:00),
    time::macros::time!(18:00),
    time::macros::time!(21:00),
    time::macros::time!(23:30),
];

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn index(value: u8) -> SlotIndex {
        SlotIndex::new(value).expect("valid index")
    }

    #[test]
    fn next_day_crosses_month_and_year() {
        let calendar = SlotCalendar::default();
        assert_eq!(calendar.next_day(date!(2025 - 10 - 31)), Ok(date!(2025 - 11 - 01)));
        assert_eq!(calendar.next_day(date!(2025 - 12 - 31)), Ok(date!(2026 - 01 - 01)));
    }

    #[test]
    fn last_slot_lands_after_utc_midnight() {
        let calendar = SlotCalendar::default();
        let instant = calendar
            .slot_instant(date!(2025 - 10 - 31), index(5))
            .expect("instant");
        assert_eq!(instant, datetime!(2025-11-01 03:30 UTC));
        assert_eq!(calendar.today(instant), Ok(date!(2025 - 10 - 31)));
    }

    #[test]
    fn labels_use_local_clock() {
        let calendar = SlotCalendar::default();
        assert_eq!(calendar.slot_label(index(0)), "08:00");
        assert_eq!(calendar.slot_label(index(5)), "23:30");
    }
}
