//! Rewrites live-streaming logical URLs (`…/EDGE`, `…/OLD_S=N`) to concrete
//! numeric sequence IDs recorded as objects are created.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

#[derive(Clone, Copy)]
struct Entry {
    received_at_ms: i64,
}

/// Per-base-path map from sequence ID to the millisecond epoch it was
/// recorded at, guarded by a single RW lock.
#[derive(Default)]
pub struct Translator {
    streams: RwLock<HashMap<String, HashMap<i64, Entry>>>,
}

/// Splits `<base>/<id>` into its base and trailing integer id, if the last
/// path segment parses as one.
fn split_base_id(url: &str) -> Option<(&str, i64)> {
    let idx = url.rfind('/')?;
    let (base, tail) = url.split_at(idx);
    let id: i64 = tail[1..].parse().ok()?;
    Some((base, id))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `url`'s trailing segment as a sequence id for its base path,
    /// if it parses as a non-negative integer. `received_at_ms` is normally
    /// derived from the `Joc-First-Frame-Clk` header, defaulting to now.
    pub fn add_new_entry(&self, url: &str, received_at_ms: Option<i64>) {
        let Some((base, id)) = split_base_id(url) else {
            return;
        };
        if id < 0 {
            return;
        }

        let received_at_ms = received_at_ms.unwrap_or_else(now_millis);
        self.streams
            .write()
            .entry(base.to_string())
            .or_default()
            .insert(id, Entry { received_at_ms });
    }

    /// Removes `url`'s entry, dropping the per-base map once it is empty.
    pub fn remove_entry(&self, url: &str) {
        let Some((base, id)) = split_base_id(url) else {
            return;
        };

        let mut streams = self.streams.write();
        if let Some(entries) = streams.get_mut(base) {
            entries.remove(&id);
            if entries.is_empty() {
                streams.remove(base);
            }
        }
    }

    /// Resolves `EDGE` and `OLD_S=<secs>` pseudo-commands on the trailing
    /// path segment. Anything else, or a base with no recorded entries,
    /// passes through unchanged with `isTranslated = false`.
    pub fn get_translated(&self, url: &str) -> (String, bool) {
        let Some(idx) = url.rfind('/') else {
            return (url.to_string(), false);
        };
        let (base, command) = url.split_at(idx);
        let command = &command[1..];

        let streams = self.streams.read();
        let Some(entries) = streams.get(base) else {
            return (url.to_string(), false);
        };

        if command == "EDGE" {
            return match entries.iter().max_by_key(|(id, _)| **id) {
                Some((id, _)) => (format!("{base}/{id}"), true),
                None => (url.to_string(), false),
            };
        }

        if let Some(secs) = command.strip_prefix("OLD_S=").and_then(|s| s.parse::<i64>().ok()) {
            let cutoff = now_millis() - secs * 1000;
            let earliest = entries
                .iter()
                .filter(|(_, entry)| entry.received_at_ms > cutoff)
                .min_by_key(|(_, entry)| entry.received_at_ms);

            return match earliest {
                Some((id, _)) => (format!("{base}/{id}"), true),
                None => (url.to_string(), false),
            };
        }

        (url.to_string(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_resolves_to_the_highest_sequence_id() {
        let translator = Translator::new();
        translator.add_new_entry("/live/stream/1", Some(1_000));
        translator.add_new_entry("/live/stream/2", Some(2_000));
        translator.add_new_entry("/live/stream/5", Some(3_000));

        let (resolved, translated) = translator.get_translated("/live/stream/EDGE");
        assert!(translated);
        assert_eq!(resolved, "/live/stream/5");
    }

    #[test]
    fn old_s_picks_the_earliest_entry_within_the_window() {
        let translator = Translator::new();
        let now = now_millis();
        translator.add_new_entry("/live/stream/1", Some(now - 9_000));
        translator.add_new_entry("/live/stream/2", Some(now - 4_000));
        translator.add_new_entry("/live/stream/3", Some(now - 1_000));

        let (resolved, translated) = translator.get_translated("/live/stream/OLD_S=5");
        assert!(translated);
        assert_eq!(resolved, "/live/stream/2");
    }

    #[test]
    fn unknown_base_or_command_passes_through() {
        let translator = Translator::new();
        let (resolved, translated) = translator.get_translated("/live/unknown/EDGE");
        assert!(!translated);
        assert_eq!(resolved, "/live/unknown/EDGE");

        translator.add_new_entry("/live/stream/1", Some(1));
        let (resolved, translated) = translator.get_translated("/live/stream/whatever");
        assert!(!translated);
        assert_eq!(resolved, "/live/stream/whatever");
    }

    #[test]
    fn remove_entry_drops_the_base_once_empty() {
        let translator = Translator::new();
        translator.add_new_entry("/live/stream/1", Some(1));
        translator.remove_entry("/live/stream/1");

        let (resolved, translated) = translator.get_translated("/live/stream/EDGE");
        assert!(!translated);
        assert_eq!(resolved, "/live/stream/EDGE");
    }
}
