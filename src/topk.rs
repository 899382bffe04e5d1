//! Bounded min-heap top-K selection.
//!
//! Keeps at most `limit` items on a heap whose root is the weakest survivor.
//! A candidate replaces the root only when it scores strictly higher, so the
//! cost is O(n log k) instead of the O(n log n) of sorting everything.
//!
//! Scores compare with `f32::total_cmp`. A NaN score never takes a slot.
//! Results agree with a full sort as a multiset of scores; which of several
//! equal-scored items survives is unspecified.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct MinEntry<T> {
    score: f32,
    value: T,
}

impl<T> PartialEq for MinEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.score.total_cmp(&other.score).is_eq()
    }
}

impl<T> Eq for MinEntry<T> {}

impl<T> PartialOrd for MinEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for MinEntry<T> {
    // Reversed so the std max-heap keeps the lowest score at the root.
    fn cmp(&self, other: &Self) -> Ordering {
        other.score.total_cmp(&self.score)
    }
}

/// Items with the `limit` highest scores, best first.
pub fn select_top_k<T, I, F>(items: I, limit: usize, score: F) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> f32,
{
    select_top_k_by_mapped_score(items, limit, |item| (score(&item), item))
        .into_iter()
        .map(|(_, value)| value)
        .collect()
}

/// Like [`select_top_k`], but `map` produces the score and the retained value
/// in one pass, so no intermediate scored array is built.
pub fn select_top_k_by_mapped_score<S, T, I, F>(items: I, limit: usize, mut map: F) -> Vec<(f32, T)>
where
    I: IntoIterator<Item = S>,
    F: FnMut(S) -> (f32, T),
{
    if limit == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<MinEntry<T>> = BinaryHeap::with_capacity(limit);
    for item in items {
        let (score, value) = map(item);
        if score.is_nan() {
            continue;
        }
        if heap.len() < limit {
            heap.push(MinEntry { score, value });
        } else if let Some(mut weakest) = heap.peek_mut() {
            if score.total_cmp(&weakest.score).is_gt() {
                *weakest = MinEntry { score, value };
            }
        }
    }

    let mut selected: Vec<(f32, T)> = heap
        .into_vec()
        .into_iter()
        .map(|entry| (entry.score, entry.value))
        .collect();
    selected.sort_by(|a, b| b.0.total_cmp(&a.0));
    selected
}

/// Reference implementation: score everything, sort, slice.
pub fn full_sort_top_k<T, I, F>(items: I, limit: usize, score: F) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> f32,
{
    let mut scored: Vec<(f32, T)> = items
        .into_iter()
        .map(|item| (score(&item), item))
        .filter(|(score, _)| !score.is_nan())
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(limit);
    scored.into_iter().map(|(_, value)| value).collect()
}
