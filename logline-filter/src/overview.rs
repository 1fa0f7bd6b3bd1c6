//! The "used value" overview (spec §3, §4.6, §9 "Observable collections"):
//! a `HashMap<V, usize>` refcount map so a value's 0↔1 transitions — and
//! only those — emit add/remove events, with a sorted index for stable
//! iteration order.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::signal::Signal;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OverviewEvent<V> {
    Added(V),
    Removed(V),
}

pub struct Overview<V: Eq + Hash + Clone + Ord> {
    counts: HashMap<V, usize>,
    sorted: Vec<V>,
    pub changed: Signal<OverviewEvent<V>>,
}

impl<V: Eq + Hash + Clone + Ord> Default for Overview<V> {
    fn default() -> Self {
        Self {
            counts: HashMap::new(),
            sorted: Vec::new(),
            changed: Signal::new(),
        }
    }
}

impl<V: Eq + Hash + Clone + Ord + Debug> Debug for Overview<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overview").field("values", &self.sorted).finish()
    }
}

impl<V: Eq + Hash + Clone + Ord> Overview<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, value: &V) -> bool {
        self.counts.contains_key(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.sorted.iter()
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Increments `value`'s refcount, emitting `Added` on the 0→1 transition.
    pub fn add(&mut self, value: V) {
        let count = self.counts.entry(value.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            let idx = self.sorted.binary_search(&value).unwrap_or_else(|i| i);
            self.sorted.insert(idx, value.clone());
            self.changed.emit(&OverviewEvent::Added(value));
        }
    }

    /// Decrements `value`'s refcount, emitting `Removed` on the 1→0
    /// transition. A no-op if `value` was never tracked.
    pub fn remove(&mut self, value: &V) {
        let Some(count) = self.counts.get_mut(value) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(value);
            if let Ok(idx) = self.sorted.binary_search(value) {
                self.sorted.remove(idx);
            }
            self.changed.emit(&OverviewEvent::Removed(value.clone()));
        }
    }

    pub fn clear(&mut self) {
        let values = std::mem::take(&mut self.sorted);
        self.counts.clear();
        for value in values {
            self.changed.emit(&OverviewEvent::Removed(value));
        }
    }

    /// Empties the overview without emitting per-value `Removed` events;
    /// used when the owning collection emits a single coalesced `Reset`
    /// instead (spec §4.6).
    pub fn reset_silent(&mut self) {
        self.sorted.clear();
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refcounts_shared_values() {
        let mut overview: Overview<String> = Overview::new();
        overview.add("a".to_owned());
        overview.add("a".to_owned());
        assert!(overview.contains(&"a".to_owned()));
        overview.remove(&"a".to_owned());
        assert!(overview.contains(&"a".to_owned()));
        overview.remove(&"a".to_owned());
        assert!(!overview.contains(&"a".to_owned()));
    }

    #[test]
    fn iteration_is_sorted() {
        let mut overview: Overview<String> = Overview::new();
        overview.add("b".to_owned());
        overview.add("a".to_owned());
        overview.add("c".to_owned());
        assert_eq!(
            overview.iter().cloned().collect::<Vec<_>>(),
            vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]
        );
    }

    #[test]
    fn removing_untracked_value_is_a_no_op() {
        let mut overview: Overview<String> = Overview::new();
        overview.remove(&"ghost".to_owned());
        assert!(overview.is_empty());
    }
}
