//! The filtered view (spec §4.8): a read-only projection of a
//! [`Collection`] restricted to messages a [`FilterEngine`] currently
//! matches, plus a non-materializing accessor for scanning matches
//! directly without holding a projected index.
//!
//! Neither type owns the collection or engine it projects — both are
//! borrowed per call, the same explicit-wiring pattern `FilterEngine`
//! itself uses for collection change notifications. The caller (whatever
//! wires `collection.changed` and `engine.filter_changed` together) drives
//! `FilteredView`'s update methods from those two signals.

use logline_types::message::LogMessage;

use crate::collection::Collection;
use crate::engine::FilterEngine;
use crate::signal::Signal;

#[derive(Clone, Debug)]
pub enum ViewChangeEvent {
    Reset,
    Added { start: usize, count: usize },
}

/// A projected, materialized index into a collection's matching messages.
pub struct FilteredView {
    indices: Vec<usize>,
    pub changed: Signal<ViewChangeEvent>,
}

impl std::fmt::Debug for FilteredView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredView")
            .field("len", &self.indices.len())
            .finish()
    }
}

impl Default for FilteredView {
    fn default() -> Self {
        Self::new()
    }
}

impl FilteredView {
    pub fn new() -> Self {
        Self {
            indices: Vec::new(),
            changed: Signal::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn get<'c>(&self, collection: &'c Collection, index: usize) -> Option<&'c LogMessage> {
        let absolute = *self.indices.get(index)?;
        collection.get(absolute)
    }

    pub fn iter<'a, 'c>(
        &'a self,
        collection: &'c Collection,
    ) -> impl Iterator<Item = &'c LogMessage> + 'a
    where
        'c: 'a,
    {
        self.indices.iter().filter_map(move |&i| collection.get(i))
    }

    pub fn contains(&self, collection: &Collection, engine: &FilterEngine, absolute: usize) -> bool {
        collection
            .get(absolute)
            .map(|msg| engine.matches(msg))
            .unwrap_or(false)
    }

    pub fn index_of(&self, absolute: usize) -> Option<usize> {
        self.indices.binary_search(&absolute).ok()
    }

    pub fn copy_to(&self, collection: &Collection, out: &mut Vec<LogMessage>) {
        out.extend(self.iter(collection).cloned());
    }

    /// Full O(n) rescan, emitting a single `Reset` (spec §4.8: rebuild path
    /// taken after a filter change or a collection removal/reset).
    pub fn rebuild(&mut self, collection: &Collection, engine: &FilterEngine) {
        self.indices = collection
            .iter()
            .enumerate()
            .filter(|(_, msg)| engine.matches(msg))
            .map(|(i, _)| i)
            .collect();
        self.changed.emit(&ViewChangeEvent::Reset);
    }

    /// Incrementally appends newly-added collection messages in
    /// `added_start..added_start + added_len` that the engine currently
    /// matches, without rescanning earlier entries (spec §4.8: appends get
    /// the cheap path; only a filter change forces a full rebuild).
    pub fn append_matching(
        &mut self,
        collection: &Collection,
        engine: &FilterEngine,
        added_start: usize,
        added_len: usize,
    ) {
        let view_start = self.indices.len();
        let mut appended = 0;
        for absolute in added_start..added_start + added_len {
            if let Some(msg) = collection.get(absolute) {
                if engine.matches(msg) {
                    self.indices.push(absolute);
                    appended += 1;
                }
            }
        }
        if appended > 0 {
            self.changed.emit(&ViewChangeEvent::Added {
                start: view_start,
                count: appended,
            });
        }
    }

    pub fn reset(&mut self) {
        self.indices.clear();
        self.changed.emit(&ViewChangeEvent::Reset);
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum CursorError {
    #[error("index out of bounds")]
    OutOfBounds,
}

/// A non-materializing scan over a collection's matches: does not hold a
/// projected index, so it stays correct across arbitrary collection
/// mutations between calls at the cost of an O(n) scan per call (spec
/// §4.8, companion filtering accessor).
pub struct FilterCursor<'a> {
    collection: &'a Collection,
    engine: &'a FilterEngine,
}

impl<'a> FilterCursor<'a> {
    pub fn new(collection: &'a Collection, engine: &'a FilterEngine) -> Self {
        Self { collection, engine }
    }

    pub fn next_matching_from(&self, start: usize) -> Result<Option<usize>, CursorError> {
        if start > self.collection.len() {
            return Err(CursorError::OutOfBounds);
        }
        Ok((start..self.collection.len()).find(|&i| self.matches_at(i)))
    }

    pub fn previous_matching_from(&self, start: usize) -> Result<Option<usize>, CursorError> {
        if start >= self.collection.len() {
            return Err(CursorError::OutOfBounds);
        }
        Ok((0..=start).rev().find(|&i| self.matches_at(i)))
    }

    /// Matching indices in `[from, to]`, inclusive, scanned without
    /// materializing the full filtered view.
    pub fn range_between(&self, from: usize, to: usize) -> Result<Vec<usize>, CursorError> {
        if from > to || to >= self.collection.len() {
            return Err(CursorError::OutOfBounds);
        }
        Ok((from..=to).filter(|&i| self.matches_at(i)).collect())
    }

    fn matches_at(&self, index: usize) -> bool {
        self.collection
            .get(index)
            .map(|msg| self.engine.matches(msg))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logline_types::message::TagSet;

    fn msg(writer: &str) -> LogMessage {
        LogMessage {
            timestamp: chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap(),
            high_precision_timestamp: 0,
            lost_message_count: 0,
            log_writer_name: writer.to_owned(),
            log_level_name: "Note".to_owned(),
            application_name: String::new(),
            process_name: String::new(),
            process_id: 0,
            tags: TagSet::default(),
            text: String::new(),
        }
    }

    #[test]
    fn rebuild_projects_only_matching_indices() {
        let mut collection = Collection::new();
        collection.append_range(vec![msg("W1"), msg("W2"), msg("W1")]);
        let mut engine = FilterEngine::new();
        engine.apply(|e| {
            e.writer.observe_used(&"W1".to_owned());
            e.writer.enabled = true;
            e.writer.set_selected(&"W1".to_owned(), true);
        });
        let mut view = FilteredView::new();
        view.rebuild(&collection, &engine);
        assert_eq!(view.len(), 2);
        assert_eq!(view.get(&collection, 0).unwrap().log_writer_name, "W1");
        assert_eq!(view.get(&collection, 1).unwrap().log_writer_name, "W1");
    }

    #[test]
    fn append_matching_only_adds_matches() {
        let mut collection = Collection::new();
        collection.append(msg("W1"));
        let mut engine = FilterEngine::new();
        engine.apply(|e| {
            e.writer.observe_used(&"W1".to_owned());
            e.writer.enabled = true;
            e.writer.set_selected(&"W1".to_owned(), true);
        });
        let mut view = FilteredView::new();
        view.rebuild(&collection, &engine);

        collection.append_range(vec![msg("W2"), msg("W1")]);
        view.append_matching(&collection, &engine, 1, 2);
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn cursor_finds_next_and_previous_matches() {
        let mut collection = Collection::new();
        collection.append_range(vec![msg("W1"), msg("W2"), msg("W1")]);
        let mut engine = FilterEngine::new();
        engine.apply(|e| {
            e.writer.observe_used(&"W1".to_owned());
            e.writer.enabled = true;
            e.writer.set_selected(&"W1".to_owned(), true);
        });
        let cursor = FilterCursor::new(&collection, &engine);
        assert_eq!(cursor.next_matching_from(1).unwrap(), Some(2));
        assert_eq!(cursor.previous_matching_from(1).unwrap(), Some(0));
        assert_eq!(cursor.range_between(0, 2).unwrap(), vec![0, 2]);
    }

    #[test]
    fn cursor_rejects_out_of_bounds() {
        let collection = Collection::new();
        let engine = FilterEngine::new();
        let cursor = FilterCursor::new(&collection, &engine);
        assert_eq!(
            cursor.previous_matching_from(0).unwrap_err(),
            CursorError::OutOfBounds
        );
    }
}
