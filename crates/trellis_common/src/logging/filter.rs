//! Level and category filter applied when reading the log buffer.
//!
//! Categories match by equality, except patterns ending in `.*` which
//! match any category starting with the text before `.*`. That is a
//! plain string prefix: `system.*` also matches `systemx`.

use crate::base::property::split_list;
use crate::logging::{LogEntry, LogLevel};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
    /// Lowercase level names; empty means all
    pub levels: Vec<String>,
    /// Category patterns; empty means all
    pub categories: Vec<String>,
    /// Category patterns to exclude
    pub except: Vec<String>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Levels from a comma/space separated list
    pub fn levels(mut self, spec: &str) -> Self {
        self.levels = normalize_levels(split_list(spec));
        self
    }

    pub fn categories(mut self, spec: &str) -> Self {
        self.categories = split_list(spec);
        self
    }

    pub fn except(mut self, spec: &str) -> Self {
        self.except = split_list(spec);
        self
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if !self.levels.is_empty() && !self.levels.iter().any(|l| l == entry.level.as_str()) {
            return false;
        }

        let category = entry.category.to_lowercase();
        if !self.categories.is_empty()
            && !self
                .categories
                .iter()
                .any(|pattern| category_matches(pattern, &category))
        {
            return false;
        }

        !self
            .except
            .iter()
            .any(|pattern| category_matches(pattern, &category))
    }

    pub fn apply<'a>(&self, entries: &'a [LogEntry]) -> Vec<&'a LogEntry> {
        entries.iter().filter(|entry| self.matches(entry)).collect()
    }
}

/// Canonical level names (`warn` becomes `warning`); unknown names are
/// kept lowercased and match nothing.
pub fn normalize_levels(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|name| match LogLevel::parse(&name) {
            Some(level) => level.as_str().to_string(),
            None => name.to_lowercase(),
        })
        .collect()
}

pub fn category_matches(pattern: &str, category: &str) -> bool {
    match pattern.strip_suffix(".*") {
        Some(prefix) => category.starts_with(prefix),
        None => pattern == category,
    }
}
