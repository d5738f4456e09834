mod support;

use std::collections::HashSet;

use time::macros::date;

use hotdog_diaries::application::schedule::FillPolicy;
use hotdog_diaries::domain::content::{IngestTier, Platform};
use hotdog_diaries::domain::schedule::{SLOTS_PER_DAY, SlotStatus};

use support::{MemoryStore, candidate, diverse_pool, filler, slot_record};

#[tokio::test]
async fn fills_an_empty_day_with_six_distinct_candidates() {
    let store = MemoryStore::new();
    store.add_candidates(diverse_pool(10)).await;

    let day = date!(2025 - 10 - 31);
    let result = filler(&store)
        .ensure_day_filled(day, &FillPolicy::strict())
        .await
        .expect("fill succeeds");

    assert_eq!(result.before, 0);
    assert_eq!(result.after, SLOTS_PER_DAY as u32);
    assert_eq!(result.count_added, 6);
    assert_eq!(result.platforms.values().sum::<u32>(), 6);

    let slots = store.slots_for(day).await;
    assert_eq!(slots.len(), SLOTS_PER_DAY);
    let candidates: HashSet<_> = slots.iter().map(|slot| slot.candidate_id).collect();
    assert_eq!(candidates.len(), SLOTS_PER_DAY);
    let indices: Vec<u8> = slots.iter().map(|slot| slot.slot_index.get()).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    assert!(slots.iter().all(|slot| slot.status == SlotStatus::Scheduled));
}

#[tokio::test]
async fn partially_filled_day_only_adds_missing_slots() {
    let store = MemoryStore::new();
    let ids = store.add_candidates(diverse_pool(10)).await;
    let filler = filler(&store);
    let day = date!(2025 - 11 - 01);

    store
        .insert_slot(slot_record(filler.calendar(), day, 0, ids[0], SlotStatus::Scheduled))
        .await;
    store
        .insert_slot(slot_record(filler.calendar(), day, 3, ids[1], SlotStatus::Posted))
        .await;

    let result = filler
        .ensure_day_filled(day, &FillPolicy::strict())
        .await
        .expect("fill succeeds");

    assert_eq!(result.before, 2);
    assert_eq!(result.count_added, 4);
    assert_eq!(result.after, result.before + result.count_added);

    let slots = store.slots_for(day).await;
    assert_eq!(slots.len(), SLOTS_PER_DAY);
    let held: Vec<_> = slots
        .iter()
        .filter(|slot| slot.candidate_id == ids[0] || slot.candidate_id == ids[1])
        .collect();
    assert_eq!(held.len(), 2, "existing claims are never re-used");
}

#[tokio::test]
async fn second_fill_is_a_no_op() {
    let store = MemoryStore::new();
    store.add_candidates(diverse_pool(12)).await;
    let filler = filler(&store);
    let day = date!(2025 - 10 - 31);

    filler
        .ensure_day_filled(day, &FillPolicy::with_fallback())
        .await
        .expect("first fill");
    let before_slots = store.slots_for(day).await;
    let calls = store.claim_calls().await;

    let again = filler
        .ensure_day_filled(day, &FillPolicy::with_fallback())
        .await
        .expect("second fill");

    assert_eq!(again.before, 6);
    assert_eq!(again.after, 6);
    assert_eq!(again.count_added, 0);
    assert!(again.platforms.is_empty());
    assert_eq!(store.claim_calls().await, calls, "full day skips the claim");

    let after_slots = store.slots_for(day).await;
    let ids = |slots: &[hotdog_diaries::domain::schedule::ScheduledSlotRecord]| {
        slots.iter().map(|slot| slot.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&before_slots), ids(&after_slots));
}

#[tokio::test]
async fn aggressive_fallback_reaches_deprioritized_candidates() {
    let store = MemoryStore::new();
    let active = store
        .add_candidates(vec![
            candidate(Platform::Reddit, IngestTier::Active, 0.9),
            candidate(Platform::Pixabay, IngestTier::Active, 0.8),
            candidate(Platform::Youtube, IngestTier::Active, 0.7),
            candidate(Platform::Tumblr, IngestTier::Active, 0.6),
        ])
        .await;
    let deprioritized = store
        .add_candidates(vec![
            candidate(Platform::Lemmy, IngestTier::Deprioritized, 0.95),
            candidate(Platform::Lemmy, IngestTier::Deprioritized, 0.94),
            candidate(Platform::Bluesky, IngestTier::Deprioritized, 0.93),
            candidate(Platform::Bluesky, IngestTier::Deprioritized, 0.92),
        ])
        .await;
    store
        .add_candidate(candidate(Platform::Unsplash, IngestTier::Excluded, 0.99))
        .await;

    let day = date!(2025 - 10 - 31);
    let result = filler(&store)
        .ensure_day_filled(day, &FillPolicy::with_fallback())
        .await
        .expect("fill succeeds");

    assert_eq!(result.after, 6);
    let slots = store.slots_for(day).await;
    let claimed: HashSet<_> = slots.iter().map(|slot| slot.candidate_id).collect();
    assert!(active.iter().all(|id| claimed.contains(id)), "active tier fills first");
    let used_deprioritized = deprioritized
        .iter()
        .filter(|id| claimed.contains(id))
        .count();
    assert_eq!(used_deprioritized, 2);
    assert!(slots.iter().all(|slot| slot.platform != Platform::Unsplash));
}

#[tokio::test]
async fn strict_policy_leaves_deprioritized_content_alone() {
    let store = MemoryStore::new();
    store
        .add_candidates(vec![
            candidate(Platform::Reddit, IngestTier::Active, 0.9),
            candidate(Platform::Pixabay, IngestTier::Deprioritized, 0.95),
        ])
        .await;

    let result = filler(&store)
        .ensure_day_filled(date!(2025 - 10 - 31), &FillPolicy::strict())
        .await
        .expect("fill succeeds");

    assert_eq!(result.count_added, 1);
    assert_eq!(result.platforms.get(&Platform::Reddit), Some(&1));
}

#[tokio::test]
async fn exhausted_pool_reports_underfilled_day() {
    let store = MemoryStore::new();
    store.add_candidates(diverse_pool(3)).await;

    let result = filler(&store)
        .ensure_day_filled(date!(2025 - 10 - 31), &FillPolicy::with_fallback())
        .await
        .expect("exhaustion is not an error");

    assert_eq!(result.after, 3);
    assert!(!result.is_complete());
}

#[tokio::test]
async fn posted_and_unapproved_candidates_are_skipped() {
    let store = MemoryStore::new();
    let mut posted = candidate(Platform::Reddit, IngestTier::Active, 0.99);
    posted.is_posted = true;
    let mut unapproved = candidate(Platform::Giphy, IngestTier::Active, 0.98);
    unapproved.is_approved = false;
    store.add_candidates(vec![posted, unapproved]).await;
    let usable = store
        .add_candidate(candidate(Platform::Imgur, IngestTier::Active, 0.5))
        .await;

    let day = date!(2025 - 10 - 31);
    let result = filler(&store)
        .ensure_day_filled(day, &FillPolicy::with_fallback())
        .await
        .expect("fill succeeds");

    assert_eq!(result.count_added, 1);
    assert_eq!(store.slots_for(day).await[0].candidate_id, usable);
}

#[tokio::test]
async fn single_platform_share_is_capped_when_pool_is_diverse() {
    let store = MemoryStore::new();
    let mut pool: Vec<_> = (0..6)
        .map(|i| candidate(Platform::Reddit, IngestTier::Active, 0.99 - i as f64 * 0.01))
        .collect();
    pool.push(candidate(Platform::Bluesky, IngestTier::Active, 0.4));
    pool.push(candidate(Platform::Lemmy, IngestTier::Active, 0.3));
    pool.push(candidate(Platform::Flickr, IngestTier::Active, 0.2));
    store.add_candidates(pool).await;

    let result = filler(&store)
        .ensure_day_filled(date!(2025 - 10 - 31), &FillPolicy::strict())
        .await
        .expect("fill succeeds");

    assert_eq!(result.after, 6);
    assert_eq!(result.platforms.get(&Platform::Reddit), Some(&3));
}
