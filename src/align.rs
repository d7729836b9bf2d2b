//! Line alignment between a committed baseline and the current content.
//!
//! [`longest_common_subsequence`] is a textbook dynamic program over an
//! `(|B| + 1) x (|C| + 1)` table. Both time and memory are `O(|B| * |C|)`,
//! which is fine for source-sized files but grows quadratically: two
//! 10 000-line files need a 10^8-cell table.
//!
//! The LCS alone cannot follow lines that moved past each other, so
//! [`align_lines`] adds a second pass, [`relocate_moved_lines`], which pairs
//! leftover lines with identical content.

use std::collections::{HashMap, VecDeque};

use crate::lines::is_blank;

/// Index pairs `(baseline, candidate)` of a maximum common subsequence.
///
/// Pairs are strictly increasing in both components. When reconstructing,
/// a matching diagonal is always taken; otherwise ties step back in the
/// baseline, so identical inputs always align the same way.
pub fn longest_common_subsequence<T: PartialEq>(
    baseline: &[T],
    candidate: &[T],
) -> Vec<(usize, usize)> {
    let m = baseline.len();
    let n = candidate.len();
    let width = n + 1;
    let mut table = vec![0usize; (m + 1) * width];

    for i in 1..=m {
        for j in 1..=n {
            table[i * width + j] = if baseline[i - 1] == candidate[j - 1] {
                table[(i - 1) * width + (j - 1)] + 1
            } else {
                table[(i - 1) * width + j].max(table[i * width + (j - 1)])
            };
        }
    }

    let mut pairs = Vec::with_capacity(table[m * width + n]);
    let (mut i, mut j) = (m, n);
    while i > 0 && j > 0 {
        if baseline[i - 1] == candidate[j - 1] {
            pairs.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if table[(i - 1) * width + j] >= table[i * width + (j - 1)] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    pairs.reverse();
    pairs
}

/// Pair candidate lines left out of `aligned` with unused baseline lines of
/// identical, non-blank content.
///
/// Candidates are visited in order and take the earliest free baseline
/// line. Each baseline index is used at most once. The returned pairs are
/// only the new ones, ordered by candidate index.
pub fn relocate_moved_lines<S: AsRef<str>>(
    baseline: &[S],
    candidate: &[S],
    aligned: &[(usize, usize)],
) -> Vec<(usize, usize)> {
    let mut baseline_used = vec![false; baseline.len()];
    let mut candidate_used = vec![false; candidate.len()];
    for &(i, j) in aligned {
        baseline_used[i] = true;
        candidate_used[j] = true;
    }

    let mut free: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for (i, line) in baseline.iter().enumerate() {
        let line = line.as_ref();
        if !baseline_used[i] && !is_blank(line) {
            free.entry(line).or_default().push_back(i);
        }
    }

    let mut moved = Vec::new();
    for (j, line) in candidate.iter().enumerate() {
        if candidate_used[j] {
            continue;
        }
        if let Some(i) = free.get_mut(line.as_ref()).and_then(VecDeque::pop_front) {
            moved.push((i, j));
        }
    }
    moved
}

/// Full alignment used by the context builder: the LCS plus relocated
/// moved lines, ordered by candidate index.
pub fn align_lines<S: AsRef<str> + PartialEq>(
    baseline: &[S],
    candidate: &[S],
) -> Vec<(usize, usize)> {
    let mut pairs = longest_common_subsequence(baseline, candidate);
    let moved = relocate_moved_lines(baseline, candidate, &pairs);
    pairs.extend(moved);
    pairs.sort_unstable_by_key(|&(_, j)| j);
    pairs
}
