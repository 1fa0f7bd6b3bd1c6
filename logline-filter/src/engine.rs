//! The selectable filter engine (spec §4.7): composes the per-field item
//! sub-filters, the timestamp interval, and the full-text filter into a
//! single AND predicate, and seeds/tracks its item sub-filters from a
//! [`Collection`] it is attached to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use logline_types::message::LogMessage;

use crate::attach_guard::{AttachGuard, AttachSlot};
use crate::collection::Collection;
use crate::interval_filter::IntervalFilter;
use crate::item_filter::ItemSubFilter;
use crate::signal::Signal;
use crate::text_filter::TextFilter;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FilterChanged {
    /// Best-effort hint: whether this mutation could plausibly change which
    /// messages match. Always `true` for now — no sub-filter mutation is
    /// currently classified as a guaranteed no-op.
    pub affects_result: bool,
}

/// Composes every sub-filter named in spec §3 behind a single AND
/// predicate; attaches to exactly one [`Collection`] at a time (spec §7:
/// double-attaching without detaching first is a programming error).
pub struct FilterEngine {
    pub writer: ItemSubFilter<String>,
    pub level: ItemSubFilter<String>,
    pub tag: ItemSubFilter<String>,
    pub application: ItemSubFilter<String>,
    pub process: ItemSubFilter<String>,
    pub process_id: ItemSubFilter<i64>,
    pub interval: IntervalFilter,
    pub text: TextFilter,
    pub filter_changed: Signal<FilterChanged>,
    attach_slot: AttachSlot,
    attached: Arc<AtomicBool>,
}

impl std::fmt::Debug for FilterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterEngine")
            .field("attached", &self.attached.load(Ordering::SeqCst))
            .finish()
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterEngine {
    pub fn new() -> Self {
        Self {
            writer: ItemSubFilter::new(),
            level: ItemSubFilter::new(),
            tag: ItemSubFilter::new(),
            application: ItemSubFilter::new(),
            process: ItemSubFilter::new(),
            process_id: ItemSubFilter::new(),
            interval: IntervalFilter::new(),
            text: TextFilter::new(),
            filter_changed: Signal::new(),
            attach_slot: AttachSlot::new(),
            attached: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mutates sub-filter state via `f`, then emits `filter_changed` once —
    /// the coalesced notification spec §4.7 requires for a single logical
    /// selection change (e.g. toggling several items in one click-drag).
    pub fn apply(&mut self, f: impl FnOnce(&mut Self)) {
        f(self);
        self.filter_changed
            .emit(&FilterChanged { affects_result: true });
    }

    /// Seeds every item sub-filter's dynamic values and the interval's
    /// live range from `collection`'s current contents, then returns a
    /// guard that must be dropped (or explicitly detached) before this
    /// engine can be attached to another collection (spec §4.7 attachment
    /// protocol, step 1; spec §7 double-attach invariant).
    pub fn attach(&mut self, collection: &Collection) -> AttachGuard {
        if self.attached.swap(true, Ordering::SeqCst) {
            panic!("filter engine is already attached to a collection; detach it first");
        }
        self.seed_from(collection);
        log::debug!("filter engine attached to collection with {} messages", collection.len());
        let attached = self.attached.clone();
        self.attach_slot.attach(move || {
            attached.store(false, Ordering::SeqCst);
            log::debug!("filter engine detached");
        })
    }

    fn seed_from(&mut self, collection: &Collection) {
        for value in collection.writer_overview().iter() {
            self.writer.observe_used(value);
        }
        for value in collection.level_overview().iter() {
            self.level.observe_used(value);
        }
        for value in collection.tag_overview().iter() {
            self.tag.observe_used(value);
        }
        for value in collection.application_overview().iter() {
            self.application.observe_used(value);
        }
        for value in collection.process_overview().iter() {
            self.process.observe_used(value);
        }
        for value in collection.process_id_overview().iter() {
            self.process_id.observe_used(value);
        }
        for msg in collection.iter() {
            self.interval.observe(msg.timestamp);
        }
    }

    /// Incrementally folds a newly-added message into every item
    /// sub-filter and the interval range (spec §4.7 attachment protocol,
    /// step 2).
    pub fn on_message_added(&mut self, msg: &LogMessage) {
        self.writer.observe_used(&msg.log_writer_name);
        self.level.observe_used(&msg.log_level_name);
        for tag in msg.tags.iter() {
            self.tag.observe_used(&tag.to_owned());
        }
        self.application.observe_used(&msg.application_name);
        self.process.observe_used(&msg.process_name);
        self.process_id.observe_used(&msg.process_id);
        self.interval.observe(msg.timestamp);
    }

    /// Re-evaluates every item sub-filter's `value_used` flags (and drops
    /// unaccumulated dynamic values) against what remains live in
    /// `collection` after a removal (spec §4.7 attachment protocol, step 3).
    pub fn on_messages_removed(&mut self, collection: &Collection) {
        self.writer
            .resync(|v| collection.writer_overview().contains(v));
        self.level
            .resync(|v| collection.level_overview().contains(v));
        self.tag.resync(|v| collection.tag_overview().contains(v));
        self.application
            .resync(|v| collection.application_overview().contains(v));
        self.process
            .resync(|v| collection.process_overview().contains(v));
        self.process_id
            .resync(|v| collection.process_id_overview().contains(v));
    }

    /// Returns every item sub-filter to its seed state, honoring each
    /// one's own `disable_filter_on_reset`/`unselect_items_on_reset` flags,
    /// in response to the collection being fully reset.
    pub fn on_reset(&mut self) {
        self.writer.reset();
        self.level.reset();
        self.tag.reset();
        self.application.reset();
        self.process.reset();
        self.process_id.reset();
    }

    pub fn matches(&self, msg: &LogMessage) -> bool {
        self.writer.matches(&msg.log_writer_name)
            && self.level.matches(&msg.log_level_name)
            && self.tag.matches_any(msg.tags.iter())
            && self.application.matches(&msg.application_name)
            && self.process.matches(&msg.process_name)
            && self.process_id.matches(&msg.process_id)
            && self.interval.matches(msg.timestamp)
            && self.text.matches(&msg.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logline_types::message::TagSet;

    fn msg(writer: &str, level: &str) -> LogMessage {
        LogMessage {
            timestamp: chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap(),
            high_precision_timestamp: 0,
            lost_message_count: 0,
            log_writer_name: writer.to_owned(),
            log_level_name: level.to_owned(),
            application_name: String::new(),
            process_name: String::new(),
            process_id: 0,
            tags: TagSet::default(),
            text: "boot sequence complete".to_owned(),
        }
    }

    #[test]
    fn no_enabled_subfilters_matches_everything() {
        let engine = FilterEngine::new();
        assert!(engine.matches(&msg("W1", "Error")));
    }

    #[test]
    fn level_filter_restricts_matches() {
        let mut engine = FilterEngine::new();
        engine.apply(|e| {
            e.level.observe_used(&"Error".to_owned());
            e.level.enabled = true;
            e.level.set_selected(&"Error".to_owned(), true);
        });
        assert!(engine.matches(&msg("W1", "Error")));
        assert!(!engine.matches(&msg("W1", "Note")));
    }

    #[test]
    fn double_attach_without_detach_panics() {
        let mut engine = FilterEngine::new();
        let collection = Collection::new();
        let _guard = engine.attach(&collection);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.attach(&collection)
        }));
        assert!(result.is_err());
    }

    #[test]
    fn detaching_allows_reattachment() {
        let mut engine = FilterEngine::new();
        let collection = Collection::new();
        let guard = engine.attach(&collection);
        guard.detach();
        let _guard2 = engine.attach(&collection);
    }

    #[test]
    fn filter_changed_emits_once_per_apply() {
        let mut engine = FilterEngine::new();
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let count2 = count.clone();
        engine.filter_changed.connect(move |_| {
            count2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        engine.apply(|e| {
            e.text.enabled = true;
            e.text.set_needle("boot");
        });
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
