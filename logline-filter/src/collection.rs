//! The message collection (spec §4.6): an append-only ordered sequence of
//! [`LogMessage`] plus the per-field "used value" overviews the filter
//! engine seeds and tracks itself from.

use chrono::{DateTime, FixedOffset};
use logline_types::message::LogMessage;

use crate::overview::Overview;
use crate::signal::Signal;

#[derive(Clone, Debug)]
pub enum ChangeEvent {
    Added {
        start: usize,
        items: Vec<LogMessage>,
    },
    Removed {
        start: usize,
        items: Vec<LogMessage>,
    },
    Reset,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum PruneError {
    #[error("max_count must be -1 (disabled) or a positive count")]
    InvalidMaxCount,
}

/// Holds an ordered sequence of [`LogMessage`] plus the six "used value"
/// overviews named in spec §3. Notifications for additions precede
/// notifications for prune removals performed in the same call (spec §4.6);
/// a single call only ever does one or the other, so that ordering falls
/// out of `append`/`append_range` and `prune` never being the same call.
pub struct Collection {
    messages: Vec<LogMessage>,
    writer_overview: Overview<String>,
    level_overview: Overview<String>,
    tag_overview: Overview<String>,
    application_overview: Overview<String>,
    process_overview: Overview<String>,
    process_id_overview: Overview<i64>,
    pub changed: Signal<ChangeEvent>,
    /// When true, a batch operation (`append_range`, `prune`) emits one
    /// aggregated notification; when false, one notification per item
    /// (spec §4.6).
    pub multi_item_notifications: bool,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("len", &self.messages.len())
            .finish()
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl Collection {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            writer_overview: Overview::new(),
            level_overview: Overview::new(),
            tag_overview: Overview::new(),
            application_overview: Overview::new(),
            process_overview: Overview::new(),
            process_id_overview: Overview::new(),
            changed: Signal::new(),
            multi_item_notifications: true,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LogMessage> {
        self.messages.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogMessage> {
        self.messages.iter()
    }

    pub fn writer_overview(&self) -> &Overview<String> {
        &self.writer_overview
    }

    pub fn level_overview(&self) -> &Overview<String> {
        &self.level_overview
    }

    pub fn tag_overview(&self) -> &Overview<String> {
        &self.tag_overview
    }

    pub fn application_overview(&self) -> &Overview<String> {
        &self.application_overview
    }

    pub fn process_overview(&self) -> &Overview<String> {
        &self.process_overview
    }

    pub fn process_id_overview(&self) -> &Overview<i64> {
        &self.process_id_overview
    }

    pub fn append(&mut self, msg: LogMessage) {
        self.append_range(std::iter::once(msg));
    }

    pub fn append_range(&mut self, msgs: impl IntoIterator<Item = LogMessage>) {
        let start = self.messages.len();
        let items: Vec<LogMessage> = msgs.into_iter().collect();
        if items.is_empty() {
            return;
        }
        for msg in &items {
            self.add_to_overviews(msg);
        }
        self.messages.extend(items.iter().cloned());
        self.emit_batch(true, start, items);
    }

    /// Removes messages from the head, bounded by `max_count` (`-1`
    /// disables the count bound) and `min_timestamp` (messages with an
    /// earlier timestamp than this, read as a prefix from the head, are
    /// dropped). `max_count == 0` or `< -1` is invalid (spec §4.6).
    pub fn prune(
        &mut self,
        max_count: i64,
        min_timestamp: DateTime<FixedOffset>,
    ) -> Result<(), PruneError> {
        if max_count == 0 || max_count < -1 {
            return Err(PruneError::InvalidMaxCount);
        }

        let mut cutoff = 0;
        if max_count != -1 {
            let max_count = max_count as usize;
            if self.messages.len() > max_count {
                cutoff = self.messages.len() - max_count;
            }
        }
        while cutoff < self.messages.len() && self.messages[cutoff].timestamp < min_timestamp {
            cutoff += 1;
        }

        if cutoff == 0 {
            return Ok(());
        }

        let removed: Vec<LogMessage> = self.messages.drain(..cutoff).collect();
        log::debug!("pruned {} messages from collection head", removed.len());
        for msg in &removed {
            self.remove_from_overviews(msg);
        }
        self.emit_batch(false, 0, removed);
        Ok(())
    }

    /// Empties the collection and every overview, emitting a single
    /// `ChangeEvent::Reset` rather than per-item `Removed` notifications
    /// (spec §4.6: a full reset, e.g. after a "clear log viewer" command,
    /// is one event, not a removal batch).
    pub fn clear(&mut self) {
        if self.messages.is_empty() {
            return;
        }
        self.messages.clear();
        self.writer_overview.reset_silent();
        self.level_overview.reset_silent();
        self.tag_overview.reset_silent();
        self.application_overview.reset_silent();
        self.process_overview.reset_silent();
        self.process_id_overview.reset_silent();
        self.changed.emit(&ChangeEvent::Reset);
    }

    fn emit_batch(&self, added: bool, start: usize, items: Vec<LogMessage>) {
        if self.multi_item_notifications {
            let event = if added {
                ChangeEvent::Added { start, items }
            } else {
                ChangeEvent::Removed { start, items }
            };
            self.changed.emit(&event);
        } else {
            for (offset, item) in items.into_iter().enumerate() {
                let event = if added {
                    ChangeEvent::Added {
                        start: start + offset,
                        items: vec![item],
                    }
                } else {
                    ChangeEvent::Removed {
                        start: start + offset,
                        items: vec![item],
                    }
                };
                self.changed.emit(&event);
            }
        }
    }

    fn add_to_overviews(&mut self, msg: &LogMessage) {
        self.writer_overview.add(msg.log_writer_name.clone());
        self.level_overview.add(msg.log_level_name.clone());
        self.application_overview.add(msg.application_name.clone());
        self.process_overview.add(msg.process_name.clone());
        self.process_id_overview.add(msg.process_id);
        for tag in msg.tags.iter() {
            self.tag_overview.add(tag.to_owned());
        }
    }

    fn remove_from_overviews(&mut self, msg: &LogMessage) {
        self.writer_overview.remove(&msg.log_writer_name);
        self.level_overview.remove(&msg.log_level_name);
        self.application_overview.remove(&msg.application_name);
        self.process_overview.remove(&msg.process_name);
        self.process_id_overview.remove(&msg.process_id);
        for tag in msg.tags.iter() {
            self.tag_overview.remove(&tag.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logline_types::message::TagSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn msg(writer: &str, tags: &[&str]) -> LogMessage {
        LogMessage {
            timestamp: DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap(),
            high_precision_timestamp: 0,
            lost_message_count: 0,
            log_writer_name: writer.to_owned(),
            log_level_name: "Note".to_owned(),
            application_name: String::new(),
            process_name: String::new(),
            process_id: 0,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            text: "hi".to_owned(),
        }
    }

    #[test]
    fn overview_tracks_live_values() {
        let mut c = Collection::new();
        c.append(msg("W1", &["a"]));
        c.append(msg("W2", &["a", "b"]));
        assert!(c.writer_overview().contains(&"W1".to_owned()));
        assert_eq!(c.tag_overview().len(), 2);

        c.prune(1, DateTime::parse_from_rfc3339("1970-01-01T00:00:00+00:00").unwrap())
            .unwrap();
        assert_eq!(c.len(), 1);
        assert!(!c.writer_overview().contains(&"W1".to_owned()));
        assert!(c.tag_overview().contains(&"a".to_owned()));
    }

    #[test]
    fn prune_rejects_invalid_max_count() {
        let mut c = Collection::new();
        assert_eq!(
            c.prune(0, DateTime::parse_from_rfc3339("1970-01-01T00:00:00+00:00").unwrap())
                .unwrap_err(),
            PruneError::InvalidMaxCount
        );
        assert_eq!(
            c.prune(-2, DateTime::parse_from_rfc3339("1970-01-01T00:00:00+00:00").unwrap())
                .unwrap_err(),
            PruneError::InvalidMaxCount
        );
    }

    #[test]
    fn prune_with_disabled_count_and_min_is_a_no_op() {
        let mut c = Collection::new();
        c.append(msg("W1", &[]));
        c.prune(-1, DateTime::parse_from_rfc3339("0001-01-01T00:00:00+00:00").unwrap())
            .unwrap();
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn single_item_notifications_when_batching_disabled() {
        let mut c = Collection::new();
        c.multi_item_notifications = false;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        c.changed.connect(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        c.append_range(vec![msg("W1", &[]), msg("W2", &[])]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn batched_notification_when_enabled() {
        let mut c = Collection::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        c.changed.connect(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        c.append_range(vec![msg("W1", &[]), msg("W2", &[])]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_emits_a_single_reset_and_empties_overviews() {
        let mut c = Collection::new();
        c.append_range(vec![msg("W1", &["a"]), msg("W2", &["b"])]);
        let events = Arc::new(std::sync::Mutex::new(Vec::new()));
        let events2 = events.clone();
        c.changed.connect(move |event: &ChangeEvent| {
            events2.lock().unwrap().push(format!("{event:?}"));
        });
        c.clear();
        assert_eq!(c.len(), 0);
        assert!(c.writer_overview().is_empty());
        assert!(c.tag_overview().is_empty());
        let log = events.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].contains("Reset"));
    }
}
