//! Daily slot scheduling: filling, forecasting, reconciling, and outcomes.

pub mod calendar;
pub mod filler;
pub mod forecast;
pub mod outcomes;
pub mod policy;
pub mod reconcile;
pub mod refill;
pub mod types;

use thiserror::Error;

use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::domain::schedule::SlotStatus;
use crate::util::timezone::TimezoneError;

pub use calendar::SlotCalendar;
pub use filler::{DayFiller, FillerOptions};
pub use forecast::{DayForecast, ForecastService};
pub use outcomes::{SlotOutcome, SlotOutcomeReceipt, SlotOutcomeService};
pub use policy::FillPolicy;
pub use reconcile::{ReconcileReport, ReconcileService};
pub use refill::{MAX_REFILL_DAYS, RefillService};
pub use types::{DatedFill, DayFillResult, PlatformCounts, RefillReport, RefillSummary, TwoDayRefillResult};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Timezone(#[from] TimezoneError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("refill span must be between 1 and {max} days, got {requested}")]
    InvalidSpan { requested: u32, max: u32 },
    #[error("slot not found")]
    SlotNotFound,
    #[error("slot is `{0}`, only scheduled slots accept an outcome")]
    SlotNotPending(SlotStatus),
}
