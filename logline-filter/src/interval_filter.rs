//! Timestamp interval sub-filter (spec §4.7 point 2): matches messages
//! whose timestamp falls within an optional `[from, to]` bound, each end
//! independently pinnable or left open.

use chrono::{DateTime, FixedOffset};

#[derive(Clone, Debug, Default)]
pub struct IntervalFilter {
    pub enabled: bool,
    from: Option<DateTime<FixedOffset>>,
    to: Option<DateTime<FixedOffset>>,
    /// A pinned bound is not pushed outward as new messages arrive; an
    /// unpinned bound tracks the live minimum/maximum seen so far.
    from_pinned: bool,
    to_pinned: bool,
}

impl IntervalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(&self) -> Option<DateTime<FixedOffset>> {
        self.from
    }

    pub fn to(&self) -> Option<DateTime<FixedOffset>> {
        self.to
    }

    pub fn set_from(&mut self, from: Option<DateTime<FixedOffset>>) {
        self.from = from;
        self.from_pinned = from.is_some();
    }

    pub fn set_to(&mut self, to: Option<DateTime<FixedOffset>>) {
        self.to = to;
        self.to_pinned = to.is_some();
    }

    /// Widens the unpinned bound(s) to cover `timestamp`, called once per
    /// observed message so an open interval tracks the live data range.
    pub fn observe(&mut self, timestamp: DateTime<FixedOffset>) {
        if !self.from_pinned {
            self.from = Some(match self.from {
                Some(existing) if existing <= timestamp => existing,
                _ => timestamp,
            });
        }
        if !self.to_pinned {
            self.to = Some(match self.to {
                Some(existing) if existing >= timestamp => existing,
                _ => timestamp,
            });
        }
    }

    pub fn matches(&self, timestamp: DateTime<FixedOffset>) -> bool {
        if !self.enabled {
            return true;
        }
        if let Some(from) = self.from {
            if timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if timestamp > to {
                return false;
            }
        }
        true
    }

    pub fn reset(&mut self) {
        self.from = None;
        self.to = None;
        self.from_pinned = false;
        self.to_pinned = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn disabled_matches_everything() {
        let f = IntervalFilter::new();
        assert!(f.matches(at("2024-01-01T00:00:00+00:00")));
    }

    #[test]
    fn pinned_bound_excludes_outside_values() {
        let mut f = IntervalFilter::new();
        f.enabled = true;
        f.set_from(Some(at("2024-01-02T00:00:00+00:00")));
        assert!(!f.matches(at("2024-01-01T00:00:00+00:00")));
        assert!(f.matches(at("2024-01-03T00:00:00+00:00")));
    }

    #[test]
    fn unpinned_bound_tracks_observed_range() {
        let mut f = IntervalFilter::new();
        f.enabled = true;
        f.observe(at("2024-01-05T00:00:00+00:00"));
        f.observe(at("2024-01-01T00:00:00+00:00"));
        f.observe(at("2024-01-10T00:00:00+00:00"));
        assert_eq!(f.from(), Some(at("2024-01-01T00:00:00+00:00")));
        assert_eq!(f.to(), Some(at("2024-01-10T00:00:00+00:00")));
    }

    #[test]
    fn pinned_from_is_not_widened_by_observe() {
        let mut f = IntervalFilter::new();
        f.set_from(Some(at("2024-01-05T00:00:00+00:00")));
        f.observe(at("2024-01-01T00:00:00+00:00"));
        assert_eq!(f.from(), Some(at("2024-01-05T00:00:00+00:00")));
    }
}
