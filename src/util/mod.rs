pub mod timezone;

use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

time::serde::format_description!(pub iso_date, Date, "[year]-[month]-[day]");

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_iso_date(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw.trim(), ISO_DATE)
}

/// Render a calendar date as `YYYY-MM-DD`.
pub fn format_iso_date(date: Date) -> String {
    date.format(ISO_DATE)
        .unwrap_or_else(|_| date.to_string())
}
