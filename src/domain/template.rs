use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Longest summary the ticket API accepts.
pub const SUMMARY_LIMIT: usize = 250;

const ELLIPSIS: &str = "...";

/// Placeholders left over once every known key has been substituted.
static LEFTOVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[\w\s]+\]").unwrap_or_else(|err| panic!("invalid placeholder pattern: {err}"))
});

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketTemplate {
    #[serde(skip)]
    pub id: &'static str,
    pub name: &'static str,
    pub issue_type: &'static str,
    pub priority: &'static str,
    pub summary: &'static str,
    pub description: &'static str,
    pub labels: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedTicket {
    pub summary: String,
    pub description: String,
}

/// Caller supplied placeholder values. Keys are stored uppercased and only
/// match a placeholder spelled exactly `[KEY]`.
#[derive(Debug, Clone, Default)]
pub struct ReplacementSet {
    values: BTreeMap<String, String>,
}

impl ReplacementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value. Blank values are kept out so their placeholder gets removed.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let key = key.as_ref().trim().to_uppercase();
        let value = value.into();
        if key.is_empty() {
            return;
        }
        if value.trim().is_empty() {
            self.values.remove(&key);
        } else {
            self.values.insert(key, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for ReplacementSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}

impl TicketTemplate {
    pub fn render(&self, replacements: &ReplacementSet) -> RenderedTicket {
        RenderedTicket {
            summary: truncate_summary(&fill(self.summary, replacements)),
            description: fill(self.description, replacements),
        }
    }
}

/// Replaces every `[KEY]` with its value, then deletes whatever placeholder is
/// still left, including ones that arrived inside a value.
pub fn fill(text: &str, replacements: &ReplacementSet) -> String {
    let mut filled = text.to_string();
    for (key, value) in replacements.iter() {
        filled = filled.replace(&format!("[{key}]"), value);
    }
    LEFTOVER.replace_all(&filled, "").into_owned()
}

pub fn truncate_summary(summary: &str) -> String {
    if summary.chars().count() <= SUMMARY_LIMIT {
        return summary.to_string();
    }
    let keep = SUMMARY_LIMIT - ELLIPSIS.len();
    let mut truncated: String = summary.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
