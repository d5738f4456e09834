use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::application::schedule::{RefillReport, TwoDayRefillResult};
use crate::domain::content::{IngestTier, Platform};

#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefillRequest {
    pub date: Option<String>,
    pub days: Option<u32>,
}

/// Two-day refills keep their `today`/`tomorrow` shape; other spans list days.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RefillResponse {
    TwoDay(TwoDayRefillResult),
    Span(RefillReport),
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileRequest {
    pub date: Option<String>,
    #[serde(default)]
    pub repair: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Posted,
    Failed,
}

#[derive(Debug, Deserialize)]
pub struct SlotOutcomeRequest {
    pub status: OutcomeStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub posted_at: Option<OffsetDateTime>,
    pub external_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TierChangeRequest {
    pub platform: Platform,
    pub tier: IngestTier,
}
