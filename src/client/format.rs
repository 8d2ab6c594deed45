//! Popup output: settings lines and the history list.

use crate::history::{HistoryEntry, preview, relative_time};
use crate::settings::Settings;

/// History previews are cut to this many chars.
const PREVIEW_CHARS: usize = 100;

pub fn print_settings(settings: &Settings) {
    print!("{}", render_settings(settings));
}

pub fn print_history(entries: &[HistoryEntry], now: u64) {
    print!("{}", render_history(entries, now));
}

pub fn print_cleared() {
    println!("History cleared");
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

fn render_settings(settings: &Settings) -> String {
    format!(
        "Exchange paste: {}\nSwap mode:      {}\n",
        on_off(settings.enabled),
        on_off(settings.swap_mode_enabled)
    )
}

fn render_history(entries: &[HistoryEntry], now: u64) -> String {
    if entries.is_empty() {
        return "No clipboard history yet\n".into();
    }
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        // Keep one entry per line.
        let text = preview(&entry.text, PREVIEW_CHARS).replace('\n', "⏎");
        out.push_str(&format!(
            "{:>2}. {:<14} {text}\n",
            i + 1,
            relative_time(entry.timestamp, now)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_lines() {
        let s = render_settings(&Settings {
            enabled: true,
            swap_mode_enabled: false,
        });
        assert_eq!(s, "Exchange paste: on\nSwap mode:      off\n");
    }

    #[test]
    fn empty_history() {
        assert_eq!(render_history(&[], 0), "No clipboard history yet\n");
    }

    #[test]
    fn history_lines_use_age_and_preview() {
        let now = 10 * 60_000;
        let entries = [
            HistoryEntry {
                text: "line one\nline two".into(),
                timestamp: now - 1_000,
            },
            HistoryEntry {
                text: "x".repeat(150),
                timestamp: now - 2 * 60_000,
            },
        ];
        let out = render_history(&entries, now);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(" 1. Just now"));
        assert!(lines[0].ends_with("line one⏎line two"));
        assert!(lines[1].contains("2 mins ago"));
        assert!(lines[1].ends_with(&format!("{}...", "x".repeat(97))));
    }
}
