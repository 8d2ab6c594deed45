//! Clipboard history ring.
//!
//! Holds the texts displaced by recent exchange pastes, newest first.
//! When the ring is full the oldest entry is evicted.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Entries kept by default.
pub const HISTORY_CAPACITY: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    /// Unix epoch milliseconds when the entry was added.
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct HistoryRing {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryRing {
    /// A ring holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuild from a newest-first list, dropping anything past capacity.
    pub fn from_entries(entries: Vec<HistoryEntry>, capacity: usize) -> Self {
        let mut ring = Self::new(capacity);
        ring.entries.extend(entries.into_iter().take(ring.capacity));
        ring
    }

    /// Push `text` as the newest entry. Empty text is ignored and
    /// returns false.
    pub fn push(&mut self, text: String, timestamp: u64) -> bool {
        if text.is_empty() {
            return false;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(HistoryEntry { text, timestamp });
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries newest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

/// Current wall-clock time as Unix epoch milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Human-readable age of `timestamp` relative to `now` (both epoch ms).
pub fn relative_time(timestamp: u64, now: u64) -> String {
    const MINUTE: u64 = 60_000;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;

    let diff = now.saturating_sub(timestamp);
    let (n, unit) = if diff < MINUTE {
        return "Just now".into();
    } else if diff < HOUR {
        (diff / MINUTE, "min")
    } else if diff < DAY {
        (diff / HOUR, "hour")
    } else {
        (diff / DAY, "day")
    };
    let plural = if n > 1 { "s" } else { "" };
    format!("{n} {unit}{plural} ago")
}

/// Truncate `text` to at most `max` chars, ending in "..." when cut.
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_evicts_oldest() {
        let mut ring = HistoryRing::default();
        for (i, t) in ["a", "b", "c", "d"].into_iter().enumerate() {
            assert!(ring.push(t.into(), i as u64));
        }
        let texts: Vec<_> = ring.entries().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, ["d", "c", "b"]);
    }

    #[test]
    fn empty_text_ignored() {
        let mut ring = HistoryRing::default();
        assert!(!ring.push(String::new(), 1));
        assert!(ring.is_empty());
    }

    #[test]
    fn from_entries_truncates() {
        let entries = (0..5)
            .map(|i| HistoryEntry {
                text: i.to_string(),
                timestamp: i,
            })
            .collect();
        let ring = HistoryRing::from_entries(entries, 3);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.entries()[0].text, "0");
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut ring = HistoryRing::new(0);
        ring.push("x".into(), 0);
        ring.push("y".into(), 0);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn relative_time_buckets() {
        let now = 10 * 24 * 3_600_000;
        assert_eq!(relative_time(now - 30_000, now), "Just now");
        assert_eq!(relative_time(now - 60_000, now), "1 min ago");
        assert_eq!(relative_time(now - 5 * 60_000, now), "5 mins ago");
        assert_eq!(relative_time(now - 3_600_000, now), "1 hour ago");
        assert_eq!(relative_time(now - 7 * 3_600_000, now), "7 hours ago");
        assert_eq!(relative_time(now - 3 * 24 * 3_600_000, now), "3 days ago");
        // Clock skew.
        assert_eq!(relative_time(now + 5, now), "Just now");
    }

    #[test]
    fn preview_truncates_on_chars() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdefghij", 10), "abcdefghij");
        assert_eq!(preview("abcdefghijk", 10), "abcdefg...");
        assert_eq!(preview("ééééé", 4), "é...");
    }
}
