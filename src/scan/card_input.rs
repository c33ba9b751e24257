use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// A pause longer than this ends the current card read.
pub const IDLE_FLUSH_MS: u64 = 1_000;

const MIN_CARD_DIGITS: usize = 4;
const MAX_CARD_DIGITS: usize = 10;

// At least two back-to-back copies of the shortest card number
static REPEATED_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{8,}$").expect("valid card digit pattern"));

/// One key event forwarded by a kiosk listening to a keyboard-wedge reader.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEvent {
    pub key: String,
    pub at_ms: u64,
}

/// Turns a stream of keyboard events from an HID reader into card reads.
///
/// Printable single characters accumulate. `Enter` ends a read, and so does
/// an idle gap over [`IDLE_FLUSH_MS`] before the next key.
#[derive(Debug, Default)]
pub struct KeystrokeBuffer {
    buffer: String,
    last_at: Option<u64>,
}

impl KeystrokeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one event, returning a completed read if this event ended one.
    pub fn push(&mut self, event: &KeyEvent) -> Option<String> {
        let mut completed = None;
        if let Some(last) = self.last_at {
            if event.at_ms.saturating_sub(last) > IDLE_FLUSH_MS {
                completed = self.flush();
            }
        }
        self.last_at = Some(event.at_ms);

        if event.key == "Enter" {
            return completed.or_else(|| self.flush());
        }

        let mut chars = event.key.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if !c.is_control() {
                self.buffer.push(c);
            }
        }
        completed
    }

    /// Ends the current read, if any.
    pub fn flush(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        let value = strip_repeated(raw.trim());
        if value.is_empty() { None } else { Some(value) }
    }
}

/// Replays recorded events and returns every completed read in order.
pub fn replay(events: &[KeyEvent]) -> Vec<String> {
    let mut buffer = KeystrokeBuffer::new();
    let mut reads: Vec<String> = events.iter().filter_map(|e| buffer.push(e)).collect();
    reads.extend(buffer.flush());
    reads
}

/// Some readers emit the card number several times in one burst
/// (`12345678123456781234567812345678`). Collapses such a burst to one copy.
pub fn strip_repeated(raw: &str) -> String {
    // ASCII only, so byte slicing below stays on char boundaries
    if !raw.is_ascii() || !REPEATED_DIGITS.is_match(raw) {
        return raw.to_string();
    }
    for len in MIN_CARD_DIGITS..=MAX_CARD_DIGITS {
        if raw.len() % len != 0 || raw.len() / len < 2 {
            continue;
        }
        let unit = &raw[..len];
        if unit.repeat(raw.len() / len) == raw {
            return unit.to_string();
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str, start_ms: u64, step_ms: u64) -> Vec<KeyEvent> {
        text.chars()
            .enumerate()
            .map(|(i, c)| KeyEvent {
                key: c.to_string(),
                at_ms: start_ms + i as u64 * step_ms,
            })
            .collect()
    }

    fn enter(at_ms: u64) -> KeyEvent {
        KeyEvent {
            key: "Enter".into(),
            at_ms,
        }
    }

    #[test]
    fn enter_ends_a_read() {
        let mut events = typed("0012345678", 0, 10);
        events.push(enter(100));
        assert_eq!(replay(&events), vec!["0012345678".to_string()]);
    }

    #[test]
    fn idle_gap_ends_a_read() {
        let mut events = typed("1111", 0, 10);
        events.extend(typed("2222", 5_000, 10));
        assert_eq!(replay(&events), vec!["1111".to_string(), "2222".to_string()]);
    }

    #[test]
    fn modifier_keys_are_ignored() {
        let events = vec![
            KeyEvent { key: "Shift".into(), at_ms: 0 },
            KeyEvent { key: "A".into(), at_ms: 5 },
            KeyEvent { key: "1".into(), at_ms: 10 },
            enter(15),
        ];
        assert_eq!(replay(&events), vec!["A1".to_string()]);
    }

    #[test]
    fn empty_reads_are_dropped() {
        assert!(replay(&[enter(0), enter(2_000)]).is_empty());
    }

    #[test]
    fn repeated_card_numbers_collapse() {
        assert_eq!(strip_repeated("12345678123456781234567812345678"), "12345678");
        assert_eq!(strip_repeated("98769876"), "9876");
        assert_eq!(strip_repeated("0123456789"), "0123456789");
        assert_eq!(strip_repeated("ABCDABCD"), "ABCDABCD");
        assert_eq!(strip_repeated("123"), "123");
    }

    #[test]
    fn non_ascii_digits_are_left_alone() {
        assert_eq!(strip_repeated("०१२३०१२३"), "०१२३०१२३");
        assert_eq!(strip_repeated("１２３４１２３４"), "１２３４１２３４");

        let mut events = typed("०१२३०१२३", 0, 5);
        events.push(enter(100));
        assert_eq!(replay(&events), vec!["०१२३०१२३".to_string()]);
    }

    #[test]
    fn repeated_burst_through_the_buffer() {
        let mut events = typed("45674567", 0, 5);
        events.push(enter(50));
        assert_eq!(replay(&events), vec!["4567".to_string()]);
    }
}
