//! Daily posting slots.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::content::Platform;
use super::error::DomainError;

/// Every civil day has exactly this many posting positions.
pub const SLOTS_PER_DAY: usize = 6;

/// Position of a slot within its day, always in `0..SLOTS_PER_DAY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub fn new(value: u8) -> Result<Self, DomainError> {
        if usize::from(value) < SLOTS_PER_DAY {
            Ok(Self(value))
        } else {
            Err(DomainError::validation(format!(
                "slot index {value} is outside 0..{SLOTS_PER_DAY}"
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        usize::from(self.0)
    }

    /// All slot positions of a day in posting order.
    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..SLOTS_PER_DAY as u8).map(SlotIndex)
    }
}

impl TryFrom<i16> for SlotIndex {
    type Error = DomainError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| DomainError::validation(format!("slot index {value} is negative")))
            .and_then(SlotIndex::new)
    }
}

impl Display for SlotIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "slot_status", rename_all = "snake_case")]
pub enum SlotStatus {
    Scheduled,
    Posted,
    Missed,
    Failed,
}

impl SlotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Posted => "posted",
            Self::Missed => "missed",
            Self::Failed => "failed",
        }
    }

    /// A pending slot still holds its candidate for a future post.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Scheduled)
    }
}

impl Display for SlotStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filled slot. Empty slots have no row.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledSlotRecord {
    pub id: Uuid,
    #[serde(with = "crate::util::iso_date")]
    pub slot_date: Date,
    pub slot_index: SlotIndex,
    #[serde(with = "time::serde::rfc3339")]
    pub scheduled_at: OffsetDateTime,
    pub candidate_id: Uuid,
    pub platform: Platform,
    pub status: SlotStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub posted_at: Option<OffsetDateTime>,
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
