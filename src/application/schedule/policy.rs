use std::collections::{BTreeMap, VecDeque};

use crate::domain::content::{CandidateRecord, IngestTier, Platform};
use crate::domain::schedule::SLOTS_PER_DAY;

use super::types::PlatformCounts;

/// One step of a fill: the tiers a candidate must belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityPass {
    pub name: &'static str,
    pub tiers: Vec<IngestTier>,
}

/// Passes tried in order until the day is full or the passes run out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillPolicy {
    passes: Vec<EligibilityPass>,
}

impl FillPolicy {
    pub fn new(passes: Vec<EligibilityPass>) -> Self {
        Self { passes }
    }

    /// Only candidates in normal standing.
    pub fn strict() -> Self {
        Self::new(vec![EligibilityPass {
            name: "normal",
            tiers: vec![IngestTier::Active],
        }])
    }

    /// Normal standing first, then widen to deprioritized candidates.
    pub fn with_fallback() -> Self {
        Self::new(vec![
            EligibilityPass {
                name: "normal",
                tiers: vec![IngestTier::Active],
            },
            EligibilityPass {
                name: "aggressive",
                tiers: vec![IngestTier::Active, IngestTier::Deprioritized],
            },
        ])
    }

    pub fn from_aggressive(aggressive_fallback: bool) -> Self {
        if aggressive_fallback {
            Self::with_fallback()
        } else {
            Self::strict()
        }
    }

    pub fn passes(&self) -> &[EligibilityPass] {
        &self.passes
    }
}

/// Most slots a single platform may take in one day at the given share.
pub fn platform_cap(max_share: f64) -> usize {
    let cap = (SLOTS_PER_DAY as f64 * max_share).ceil();
    (cap as usize).clamp(1, SLOTS_PER_DAY)
}

/// Pick up to `needed` candidates, interleaving platforms.
///
/// `candidates` must already be in preference order. Platforms take turns in
/// the order of their best candidate, and a platform stops taking turns once it
/// holds `cap` slots for the day (counting `day_counts`). When the pool is not
/// diverse enough to fill under the cap, the remainder comes from the leftover
/// candidates in preference order.
pub fn select_diverse(
    candidates: Vec<CandidateRecord>,
    needed: usize,
    day_counts: &PlatformCounts,
    cap: usize,
) -> Vec<CandidateRecord> {
    if needed == 0 {
        return Vec::new();
    }

    let mut order: Vec<Platform> = Vec::new();
    let mut queues: BTreeMap<Platform, VecDeque<(usize, CandidateRecord)>> = BTreeMap::new();
    for (position, candidate) in candidates.into_iter().enumerate() {
        let queue = queues.entry(candidate.platform).or_insert_with(|| {
            order.push(candidate.platform);
            VecDeque::new()
        });
        queue.push_back((position, candidate));
    }

    let mut counts = day_counts.clone();
    let mut picks = Vec::with_capacity(needed);

    'rounds: loop {
        let mut progressed = false;
        for platform in &order {
            if picks.len() >= needed {
                break 'rounds;
            }
            let used = counts.get(platform).copied().unwrap_or(0) as usize;
            if used >= cap {
                continue;
            }
            if let Some((_, candidate)) = queues.get_mut(platform).and_then(VecDeque::pop_front) {
                *counts.entry(*platform).or_insert(0) += 1;
                picks.push(candidate);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    if picks.len() < needed {
        let mut leftovers: Vec<(usize, CandidateRecord)> =
            queues.into_values().flatten().collect();
        leftovers.sort_by_key(|(position, _)| *position);
        let missing = needed - picks.len();
        picks.extend(leftovers.into_iter().take(missing).map(|(_, candidate)| candidate));
    }

    picks
}
