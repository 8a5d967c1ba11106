// ── Snapshot differ ──
//
// Identity-based set difference between two observations. Pure and
// stateless; the controller feeds it the cached and the freshly fetched
// notice lists.

use std::collections::HashSet;
use std::hash::Hash;

/// Elements that appeared and disappeared between two observations.
#[derive(Debug, PartialEq, Eq)]
pub struct Diff<'a, T> {
    /// Elements of `new` whose id is absent from `old`, in `new` order.
    pub added: Vec<&'a T>,
    /// Elements of `old` whose id is absent from `new`, in `old` order.
    pub removed: Vec<&'a T>,
}

impl<T> Diff<'_, T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Diff two sequences by identifier.
///
/// An id present on both sides is never reported, even if the rest of
/// the element changed. Runs in O(n + m).
pub fn diff_by_id<'a, T, K, F>(old: &'a [T], new: &'a [T], id: F) -> Diff<'a, T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let old_ids: HashSet<K> = old.iter().map(&id).collect();
    let new_ids: HashSet<K> = new.iter().map(&id).collect();

    Diff {
        added: new.iter().filter(|e| !old_ids.contains(&id(*e))).collect(),
        removed: old.iter().filter(|e| !new_ids.contains(&id(*e))).collect(),
    }
}
