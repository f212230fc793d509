//! Review selection: length/playtime filtering, quality ranking, and
//! sentiment-balanced picking.
//!
//! Ranking combines two band scores. Length bands reward the interior:
//! very short reviews carry no substance and walls of text don't translate
//! well, so mid-length reviews score highest. Playtime bands reward invested
//! authors, saturating so a 2000-hour account doesn't dominate.

use crate::steam::SteamReview;

fn length_score(chars: usize) -> u32 {
    match chars {
        0..=99 => 1,
        100..=299 => 3,
        300..=799 => 4,
        800..=1999 => 2,
        _ => 1,
    }
}

fn playtime_score(hours: u32) -> u32 {
    match hours {
        0 => 0,
        1..=4 => 1,
        5..=19 => 2,
        20..=99 => 3,
        _ => 4,
    }
}

pub fn quality_score(review: &SteamReview) -> u32 {
    length_score(review.text.chars().count()) + playtime_score(review.playtime_hours)
}

/// Drops reviews below the length/playtime floors and sorts the rest by
/// quality score, best first. The sort is stable so upstream "toprated"
/// order breaks ties.
pub fn filter_and_rank(
    reviews: Vec<SteamReview>,
    min_chars: usize,
    min_playtime_hours: u32,
) -> Vec<SteamReview> {
    let mut kept: Vec<SteamReview> = reviews
        .into_iter()
        .filter(|r| {
            r.text.chars().count() > min_chars && r.playtime_hours >= min_playtime_hours
        })
        .collect();
    kept.sort_by_key(|r| std::cmp::Reverse(quality_score(r)));
    kept
}

/// Picks up to `target` reviews from a ranked list, preferring top positives
/// but reserving one slot for the best-ranked negative when any qualify, so
/// articles are never one-sided. Output preserves rank order.
pub fn select_balanced(ranked: Vec<SteamReview>, target: usize) -> Vec<SteamReview> {
    if ranked.len() <= target {
        return ranked;
    }

    let best_negative = ranked.iter().position(|r| !r.voted_up);
    let mut picked = vec![false; ranked.len()];
    let mut remaining = target;

    if let Some(idx) = best_negative {
        picked[idx] = true;
        remaining -= 1;
    }
    for (i, review) in ranked.iter().enumerate() {
        if remaining == 0 {
            break;
        }
        if review.voted_up && !picked[i] {
            picked[i] = true;
            remaining -= 1;
        }
    }
    // Not enough positives: top up with further negatives in rank order.
    for i in 0..ranked.len() {
        if remaining == 0 {
            break;
        }
        if !picked[i] {
            picked[i] = true;
            remaining -= 1;
        }
    }

    ranked
        .into_iter()
        .zip(picked)
        .filter_map(|(r, keep)| keep.then_some(r))
        .collect()
}
