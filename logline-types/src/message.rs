//! The [`LogMessage`] data model (spec §3).

use chrono::{DateTime, FixedOffset};

/// An ordered set of non-empty tag strings with no duplicates.
///
/// Insertion order is preserved (matching the "deterministic per source"
/// invariant in §3); membership, not position, carries the set semantics.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `tag` if it is not already present. No-op on an empty string.
    pub fn insert(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if tag.is_empty() {
            return;
        }
        if !self.0.iter().any(|existing| existing == &tag) {
            self.0.push(tag);
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|existing| existing == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<String> for TagSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let mut set = Self::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

/// An immutable snapshot of one logged event (spec §3).
///
/// `log_writer_name`, `log_level_name`, `application_name`, `process_name`
/// are intentionally plain `String`: the log-writer registry, level
/// definitions, and tag-set semantics beyond membership are out of scope
/// (spec §1) and are consumed here as opaque value types.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogMessage {
    pub timestamp: DateTime<FixedOffset>,
    pub high_precision_timestamp: u64,
    pub lost_message_count: u32,
    pub log_writer_name: String,
    pub log_level_name: String,
    pub application_name: String,
    pub process_name: String,
    pub process_id: i64,
    pub tags: TagSet,
    pub text: String,
}

impl LogMessage {
    /// Field accessor used generically by the overview/filter machinery
    /// (spec §4.7) to read scalar string fields by name without matching
    /// on every call site.
    pub fn scalar_field(&self, field: ScalarField) -> &str {
        match field {
            ScalarField::LogWriter => &self.log_writer_name,
            ScalarField::LogLevel => &self.log_level_name,
            ScalarField::ApplicationName => &self.application_name,
            ScalarField::ProcessName => &self.process_name,
        }
    }
}

/// The scalar (single-valued) fields that the selectable-item sub-filters
/// and the collection's overview sets key off of. `process_id` is numeric
/// and `tags` is multi-valued, so both are handled by their own accessors
/// rather than through this enum.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ScalarField {
    LogWriter,
    LogLevel,
    ApplicationName,
    ProcessName,
}
