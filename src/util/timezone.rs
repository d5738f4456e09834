//! Civil-date arithmetic for the posting timezone.
//!
//! Slots are defined in local wall-clock time, while storage and the job
//! runtime work in UTC. Every conversion between the two goes through here so
//! daylight-saving transitions are handled in one place.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use time::{Date, Month, OffsetDateTime, Time};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimezoneError {
    #[error("date `{0}` is outside the supported calendar range")]
    DateOutOfRange(Date),
    #[error("local time {time} on {date} does not exist in {tz}")]
    Unresolvable { date: Date, time: Time, tz: Tz },
    #[error("instant is outside the supported calendar range")]
    InstantOutOfRange,
}

/// The civil date `instant` falls on in `tz`.
pub fn civil_date(instant: OffsetDateTime, tz: Tz) -> Result<Date, TimezoneError> {
    let utc = DateTime::<Utc>::from_timestamp(instant.unix_timestamp(), 0)
        .ok_or(TimezoneError::InstantOutOfRange)?;
    let local = tz.from_utc_datetime(&utc.naive_utc()).date_naive();
    let month = Month::try_from(local.month() as u8).map_err(|_| TimezoneError::InstantOutOfRange)?;
    Date::from_calendar_date(local.year(), month, local.day() as u8)
        .map_err(|_| TimezoneError::InstantOutOfRange)
}

/// The UTC instant of wall-clock `time` on `date` in `tz`.
///
/// Ambiguous fall-back times resolve to the first occurrence. Times inside a
/// spring-forward gap move forward by the length of the gap (one hour for
/// every zone this service is configured with).
pub fn local_instant(date: Date, time: Time, tz: Tz) -> Result<OffsetDateTime, TimezoneError> {
    let naive = naive_datetime(date, time)?;
    let resolved = tz
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            naive
                .checked_add_signed(TimeDelta::hours(1))
                .and_then(|shifted| tz.from_local_datetime(&shifted).earliest())
        })
        .ok_or(TimezoneError::Unresolvable { date, time, tz })?;

    OffsetDateTime::from_unix_timestamp(resolved.timestamp())
        .map_err(|_| TimezoneError::InstantOutOfRange)
}

/// Half-open UTC range `[start, end)` covering the civil day `date` in `tz`.
///
/// The range is 23 or 25 hours long on transition days.
pub fn day_bounds(
    date: Date,
    tz: Tz,
) -> Result<(OffsetDateTime, OffsetDateTime), TimezoneError> {
    let next = date.next_day().ok_or(TimezoneError::DateOutOfRange(date))?;
    let start = local_instant(date, Time::MIDNIGHT, tz)?;
    let end = local_instant(next, Time::MIDNIGHT, tz)?;
    Ok((start, end))
}

fn naive_datetime(date: Date, time: Time) -> Result<NaiveDateTime, TimezoneError> {
    NaiveDate::from_ymd_opt(date.year(), u8::from(date.month()).into(), date.day().into())
        .and_then(|day| {
            day.and_hms_opt(
                time.hour().into(),
                time.minute().into(),
                time.second().into(),
            )
        })
        .ok_or(TimezoneError::DateOutOfRange(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, time};

    const EASTERN: Tz = chrono_tz::America::New_York;

    #[test]
    fn spring_forward_day_is_23_hours() {
        let (start, end) = day_bounds(date!(2025 - 03 - 09), EASTERN).expect("bounds");
        assert_eq!(start, datetime!(2025-03-09 05:00 UTC));
        assert_eq!(end, datetime!(2025-03-10 04:00 UTC));
        assert_eq!((end - start).whole_hours(), 23);
    }

    #[test]
    fn fall_back_day_is_25_hours() {
        let (start, end) = day_bounds(date!(2025 - 11 - 02), EASTERN).expect("bounds");
        assert_eq!(start, datetime!(2025-11-02 04:00 UTC));
        assert_eq!(end, datetime!(2025-11-03 05:00 UTC));
        assert_eq!((end - start).whole_hours(), 25);
    }

    #[test]
    fn morning_slot_tracks_offset_change() {
        let before = local_instant(date!(2025 - 11 - 01), time!(08:00), EASTERN).expect("edt");
        let after = local_instant(date!(2025 - 11 - 02), time!(08:00), EASTERN).expect("est");
        assert_eq!(before, datetime!(2025-11-01 12:00 UTC));
        assert_eq!(after, datetime!(2025-11-02 13:00 UTC));
    }

    #[test]
    fn gap_time_moves_forward() {
        let instant = local_instant(date!(2025 - 03 - 09), time!(02:30), EASTERN).expect("gap");
        assert_eq!(instant, datetime!(2025-03-09 07:30 UTC));
    }

    #[test]
    fn late_evening_utc_belongs_to_previous_eastern_day() {
        let instant = datetime!(2025-11-01 03:30 UTC);
        assert_eq!(civil_date(instant, EASTERN), Ok(date!(2025 - 10 - 31)));
        let later = datetime!(2025-11-01 04:30 UTC);
        assert_eq!(civil_date(later, EASTERN), Ok(date!(2025 - 11 - 01)));
    }
}
