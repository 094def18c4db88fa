use expert_core::event::Event;
use serde_json::{json, Value};

/// A relay subscription filter: kind set, lower-bound timestamp, and
/// `#<letter>` tag-value predicates. Notably `#e` (referenced event id),
/// `#t` (topic), and `#p` (addressed pubkey).
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub kinds: Vec<u32>,
    pub since: Option<i64>,
    pub tags: Vec<(char, Vec<String>)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: u32) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn tag(mut self, letter: char, values: impl IntoIterator<Item = String>) -> Self {
        self.tags.push((letter, values.into_iter().collect()));
        self
    }

    /// Whether `event` satisfies this filter. Relays are expected to apply
    /// filters server-side; `MockRelayMultiplexer` uses this to simulate
    /// that server-side behaviour in tests.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if let Some(since) = self.since {
            if event.created_at < since {
                return false;
            }
        }
        for (letter, values) in &self.tags {
            let letter = letter.to_string();
            let has_match = event
                .tags
                .iter()
                .any(|t| t.first().map(String::as_str) == Some(letter.as_str())
                    && t.get(1).is_some_and(|v| values.contains(v)));
            if !has_match {
                return false;
            }
        }
        true
    }

    /// Render as a NIP-01 `REQ` filter object.
    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        if !self.kinds.is_empty() {
            obj.insert("kinds".to_string(), json!(self.kinds));
        }
        if let Some(since) = self.since {
            obj.insert("since".to_string(), json!(since));
        }
        for (letter, values) in &self.tags {
            obj.insert(format!("#{letter}"), json!(values));
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expert_core::event::tag;

    fn sample_event(kind: u32, tags: Vec<Vec<String>>) -> Event {
        Event {
            id: "abc".to_string(),
            pubkey: "def".to_string(),
            created_at: 1000,
            kind,
            tags,
            content: "x".to_string(),
            sig: "sig".to_string(),
        }
    }

    #[test]
    fn kind_filter_matches_exact_kind_only() {
        let f = Filter::new().kind(20174);
        assert!(f.matches(&sample_event(20174, vec![])));
        assert!(!f.matches(&sample_event(20175, vec![])));
    }

    #[test]
    fn since_filter_excludes_older_events() {
        let f = Filter::new().since(500);
        assert!(f.matches(&sample_event(1, vec![])));
        let mut old = sample_event(1, vec![]);
        old.created_at = 100;
        assert!(!f.matches(&old));
    }

    #[test]
    fn tag_filter_requires_matching_value() {
        let f = Filter::new().tag('t', vec!["rust".to_string()]);
        assert!(f.matches(&sample_event(1, vec![tag("t", "rust")])));
        assert!(!f.matches(&sample_event(1, vec![tag("t", "go")])));
        assert!(!f.matches(&sample_event(1, vec![])));
    }
}
