//! Content pool entities: scraped candidates and what was actually posted.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::Type;
use time::OffsetDateTime;
use uuid::Uuid;

/// Source platform a candidate was scraped from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "content_platform", rename_all = "snake_case")]
pub enum Platform {
    Reddit,
    Twitter,
    Tiktok,
    Imgur,
    Pixabay,
    Flickr,
    Giphy,
    Lemmy,
    Tumblr,
    Youtube,
    Bluesky,
    Unsplash,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reddit => "reddit",
            Self::Twitter => "twitter",
            Self::Tiktok => "tiktok",
            Self::Imgur => "imgur",
            Self::Pixabay => "pixabay",
            Self::Flickr => "flickr",
            Self::Giphy => "giphy",
            Self::Lemmy => "lemmy",
            Self::Tumblr => "tumblr",
            Self::Youtube => "youtube",
            Self::Bluesky => "bluesky",
            Self::Unsplash => "unsplash",
        }
    }

    pub fn all() -> &'static [Platform] {
        &[
            Self::Reddit,
            Self::Twitter,
            Self::Tiktok,
            Self::Imgur,
            Self::Pixabay,
            Self::Flickr,
            Self::Giphy,
            Self::Lemmy,
            Self::Tumblr,
            Self::Youtube,
            Self::Bluesky,
            Self::Unsplash,
        ]
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|platform| platform.as_str() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "content_kind", rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Image,
    Video,
    Gif,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Gif => "gif",
        }
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Soft, reversible ingestion standing of a candidate.
///
/// `Deprioritized` candidates are only considered by relaxed fill passes;
/// `Excluded` candidates are never scheduled but are kept in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "ingest_tier", rename_all = "snake_case")]
pub enum IngestTier {
    Active,
    Deprioritized,
    Excluded,
}

impl IngestTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deprioritized => "deprioritized",
            Self::Excluded => "excluded",
        }
    }

    /// Maps the legacy integer `ingest_priority` column onto a tier.
    pub fn from_legacy_priority(priority: i32) -> Self {
        match priority {
            p if p >= 0 => Self::Active,
            -1 => Self::Deprioritized,
            _ => Self::Excluded,
        }
    }

    pub fn all() -> &'static [IngestTier] {
        &[Self::Active, Self::Deprioritized, Self::Excluded]
    }
}

impl Display for IngestTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngestTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "deprioritized" => Ok(Self::Deprioritized),
            "excluded" => Ok(Self::Excluded),
            _ => Err(()),
        }
    }
}

/// A scraped item waiting in the content pool.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateRecord {
    pub id: Uuid,
    pub platform: Platform,
    pub content_type: ContentType,
    pub content_text: Option<String>,
    pub content_url: Option<String>,
    pub confidence_score: f64,
    pub is_approved: bool,
    pub ingest_tier: IngestTier,
    pub is_posted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub scraped_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub posted_at: Option<OffsetDateTime>,
}

/// A record of content that actually went out on a platform account.
#[derive(Debug, Clone, Serialize)]
pub struct PostedContentRecord {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub platform: Platform,
    #[serde(with = "time::serde::rfc3339")]
    pub posted_at: OffsetDateTime,
    pub external_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_priorities_map_to_tiers() {
        assert_eq!(IngestTier::from_legacy_priority(0), IngestTier::Active);
        assert_eq!(IngestTier::from_legacy_priority(5), IngestTier::Active);
        assert_eq!(
            IngestTier::from_legacy_priority(-1),
            IngestTier::Deprioritized
        );
        assert_eq!(IngestTier::from_legacy_priority(-3), IngestTier::Excluded);
    }

    #[test]
    fn platform_round_trips_through_str() {
        for platform in Platform::all() {
            assert_eq!(platform.as_str().parse::<Platform>(), Ok(*platform));
        }
        assert!("myspace".parse::<Platform>().is_err());
    }
}
