//! JSON field-name mapping shared by the formatter/reader collaborator
//! described at the interface level only (spec §6). The core crates never
//! serialize to JSON themselves; this module exists so any JSON codec built
//! against this workspace agrees on key names without redefining them.

/// Default logical-field-to-JSON-key mapping (spec §6).
pub const DEFAULT_FIELD_KEYS: &[(&str, &str)] = &[
    ("timestamp", "Timestamp"),
    ("high_precision_timestamp", "HighPrecisionTimestamp"),
    ("log_writer_name", "LogWriter"),
    ("log_level_name", "LogLevel"),
    ("tags", "Tags"),
    ("application_name", "ApplicationName"),
    ("process_name", "ProcessName"),
    ("process_id", "ProcessId"),
    ("text", "Text"),
];

/// Looks up the default JSON key for a logical field name.
pub fn default_json_key(logical_field: &str) -> Option<&'static str> {
    DEFAULT_FIELD_KEYS
        .iter()
        .find(|(field, _)| *field == logical_field)
        .map(|(_, key)| *key)
}
