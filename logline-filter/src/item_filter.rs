//! A selectable item sub-filter (spec §3 `SelectableItem`, §4.7 item
//! filters): tracks distinct values seen for one field, lets the caller
//! select a subset, and matches membership in that subset.

use std::collections::HashSet;
use std::hash::Hash;

/// Values this sub-filter can be keyed on need an ordinal ordering for
/// stable item iteration (spec §4.7: "dynamic items sorted by value using
/// an ordinal (case-insensitive for strings) comparator").
pub trait Ordinal {
    fn ordinal_cmp(&self, other: &Self) -> std::cmp::Ordering;
}

impl Ordinal for String {
    fn ordinal_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_ascii_lowercase().cmp(&other.to_ascii_lowercase())
    }
}

impl Ordinal for i64 {
    fn ordinal_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.cmp(other)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectableItem<V> {
    pub value: V,
    pub group: Option<String>,
    pub selected: bool,
    pub value_used: bool,
    pub is_static: bool,
}

/// A sub-filter over a single field whose values form a selectable item
/// list: log writer, log level, tag, application name, process name,
/// process id (spec §4.7).
#[derive(Debug)]
pub struct ItemSubFilter<V: Clone + Eq + Hash + Ordinal> {
    pub enabled: bool,
    /// When false, an item is removed once its underlying value disappears;
    /// when true, items are retained with `value_used = false` (spec §3).
    pub accumulate_items: bool,
    pub disable_filter_on_reset: bool,
    pub unselect_items_on_reset: bool,
    items: Vec<SelectableItem<V>>,
    selected: HashSet<V>,
}

impl<V: Clone + Eq + Hash + Ordinal> Default for ItemSubFilter<V> {
    fn default() -> Self {
        Self {
            enabled: false,
            accumulate_items: false,
            disable_filter_on_reset: false,
            unselect_items_on_reset: false,
            items: Vec::new(),
            selected: HashSet::new(),
        }
    }
}

impl<V: Clone + Eq + Hash + Ordinal> ItemSubFilter<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `group` of statically-present items (e.g. predefined log
    /// levels); they are never removed regardless of `accumulate_items`.
    /// Call before any dynamic item is observed — static items are kept in
    /// a leading run that `insert_sorted` relies on to place new dynamic
    /// items after them.
    pub fn seed_static(&mut self, values: impl IntoIterator<Item = V>, group: Option<&str>) {
        for value in values {
            if self.items.iter().any(|item| item.value == value) {
                continue;
            }
            self.items.push(SelectableItem {
                value,
                group: group.map(str::to_owned),
                selected: false,
                value_used: false,
                is_static: true,
            });
        }
    }

    pub fn items(&self) -> &[SelectableItem<V>] {
        &self.items
    }

    /// Inserts `value` as a dynamic, currently-used item if it is not
    /// already present; marks it used if it already is.
    pub fn observe_used(&mut self, value: &V) {
        if let Some(item) = self.items.iter_mut().find(|item| &item.value == value) {
            item.value_used = true;
            return;
        }
        self.insert_sorted(SelectableItem {
            value: value.clone(),
            group: None,
            selected: false,
            value_used: true,
            is_static: false,
        });
    }

    /// Re-evaluates `value_used` for every non-static item against the
    /// current set of live values; drops dynamic items no longer backed by
    /// any message when `accumulate_items` is false (spec §4.7 step 3).
    pub fn resync(&mut self, live_values: impl Fn(&V) -> bool) {
        for item in &mut self.items {
            if item.is_static {
                item.value_used = live_values(&item.value);
            } else {
                item.value_used = live_values(&item.value);
            }
        }
        if !self.accumulate_items {
            self.items.retain(|item| item.is_static || item.value_used);
        }
    }

    /// Drops dynamic items with `value_used == false`, keeping selections
    /// for survivors; used when toggling `accumulate_items` from true to
    /// false (spec §4.7).
    pub fn drop_unused_dynamic(&mut self) {
        self.items.retain(|item| item.is_static || item.value_used);
    }

    pub fn set_selected(&mut self, value: &V, selected: bool) -> bool {
        let Some(item) = self.items.iter_mut().find(|item| &item.value == value) else {
            return false;
        };
        if item.selected == selected {
            return false;
        }
        item.selected = selected;
        if selected {
            self.selected.insert(value.clone());
        } else {
            self.selected.remove(value);
        }
        true
    }

    pub fn matches(&self, value: &V) -> bool {
        if !self.enabled {
            return true;
        }
        self.selected.contains(value)
    }

    /// Matches if any of `values` (e.g. a message's tag set) is selected;
    /// used for the multi-valued tag sub-filter where `V = String` and
    /// `values` yields borrowed `&str`s without allocating.
    pub fn matches_any<'a>(&self, values: impl Iterator<Item = &'a str>) -> bool
    where
        V: std::borrow::Borrow<str>,
    {
        if !self.enabled {
            return true;
        }
        values.into_iter().any(|v| self.selected.contains(v))
    }

    /// Returns this sub-filter to its initial state, honoring
    /// `disable_filter_on_reset`/`unselect_items_on_reset` (spec §4.7).
    pub fn reset(&mut self) {
        self.items.clear();
        self.selected.clear();
        if self.disable_filter_on_reset {
            self.enabled = false;
        }
        if self.unselect_items_on_reset {
            // Already cleared above; flag kept for symmetry with the spec's
            // description of independent reset knobs.
        }
    }

    fn insert_sorted(&mut self, item: SelectableItem<V>) {
        let static_count = self.items.iter().take_while(|i| i.is_static).count();
        let dynamic = &self.items[static_count..];
        let offset = dynamic
            .binary_search_by(|existing| existing.value.ordinal_cmp(&item.value))
            .unwrap_or_else(|i| i);
        self.items.insert(static_count + offset, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_requires_existing_item() {
        let mut f: ItemSubFilter<String> = ItemSubFilter::new();
        f.enabled = true;
        assert!(!f.set_selected(&"ghost".to_owned(), true));
        f.observe_used(&"a".to_owned());
        assert!(f.set_selected(&"a".to_owned(), true));
        assert!(f.matches(&"a".to_owned()));
        assert!(!f.matches(&"b".to_owned()));
    }

    #[test]
    fn disabled_filter_matches_everything() {
        let f: ItemSubFilter<String> = ItemSubFilter::new();
        assert!(f.matches(&"anything".to_owned()));
    }

    #[test]
    fn enabled_with_empty_selection_matches_nothing() {
        let mut f: ItemSubFilter<String> = ItemSubFilter::new();
        f.enabled = true;
        f.observe_used(&"a".to_owned());
        assert!(!f.matches(&"a".to_owned()));
    }

    #[test]
    fn dynamic_items_sort_case_insensitively() {
        let mut f: ItemSubFilter<String> = ItemSubFilter::new();
        f.observe_used(&"banana".to_owned());
        f.observe_used(&"Apple".to_owned());
        f.observe_used(&"cherry".to_owned());
        let values: Vec<_> = f.items().iter().map(|i| i.value.clone()).collect();
        assert_eq!(values, vec!["Apple", "banana", "cherry"]);
    }

    #[test]
    fn static_items_survive_resync_without_accumulate() {
        let mut f: ItemSubFilter<String> = ItemSubFilter::new();
        f.seed_static(["Error".to_owned(), "Note".to_owned()], None);
        f.observe_used(&"Custom".to_owned());
        f.resync(|v| v == "Error");
        let values: Vec<_> = f.items().iter().map(|i| i.value.clone()).collect();
        assert_eq!(values, vec!["Error", "Note"]);
    }

    #[test]
    fn accumulate_items_retains_unused_dynamic_until_toggled_off() {
        let mut f: ItemSubFilter<String> = ItemSubFilter::new();
        f.accumulate_items = true;
        f.observe_used(&"W1".to_owned());
        f.resync(|_| false);
        assert_eq!(f.items().len(), 1);
        assert!(!f.items()[0].value_used);

        f.accumulate_items = false;
        f.drop_unused_dynamic();
        assert!(f.items().is_empty());
    }
}
