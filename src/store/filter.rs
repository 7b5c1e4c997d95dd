//! File-name filters for config selection.

use regex::{Regex, RegexBuilder};

/// A parsed selection filter.
#[derive(Debug, Clone)]
pub enum SelectionFilter {
    /// Exact file names (pattern contained `|`).
    Names(Vec<String>),
    /// Case-insensitive regex, matched anywhere in the file name.
    Regex(Regex),
    /// Case-insensitive substring (pattern was not a valid regex).
    Substring(String),
}

impl SelectionFilter {
    /// Parse a filter pattern.
    ///
    /// Returns `None` for an empty pattern, which means "no filtering".
    pub fn parse(pattern: &str) -> Option<Self> {
        if pattern.is_empty() {
            return None;
        }

        if pattern.contains('|') {
            let names = pattern.split('|').map(str::to_string).collect();
            return Some(Self::Names(names));
        }

        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => Some(Self::Regex(regex)),
            Err(_) => Some(Self::Substring(pattern.to_lowercase())),
        }
    }

    /// Filter matching exactly one file name.
    pub fn exact(name: impl Into<String>) -> Self {
        Self::Names(vec![name.into()])
    }

    /// Check whether a file name passes the filter.
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            Self::Names(names) => names.iter().any(|n| n == file_name),
            Self::Regex(regex) => regex.is_match(file_name),
            Self::Substring(needle) => file_name.to_lowercase().contains(needle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_is_no_filter() {
        assert!(SelectionFilter::parse("").is_none());
    }

    #[test]
    fn test_pipe_means_exact_names() {
        let filter = SelectionFilter::parse("hk.json|jp.json").unwrap();
        assert!(matches!(filter, SelectionFilter::Names(_)));
        assert!(filter.matches("hk.json"));
        assert!(filter.matches("jp.json"));
        assert!(!filter.matches("hk2.json"));
        assert!(!filter.matches("HK.json"));
    }

    #[test]
    fn test_pipe_takes_precedence_over_regex() {
        // "hk|jp" is also a valid regex, but the pipe makes it a name set.
        let filter = SelectionFilter::parse("hk|jp").unwrap();
        assert!(!filter.matches("hk.json"));
        assert!(filter.matches("hk"));
    }

    #[test]
    fn test_regex_is_case_insensitive_search() {
        let filter = SelectionFilter::parse(r"^hk\d").unwrap();
        assert!(matches!(filter, SelectionFilter::Regex(_)));
        assert!(filter.matches("HK1.json"));
        assert!(filter.matches("hk22.json"));
        assert!(!filter.matches("xhk1.json"));
    }

    #[test]
    fn test_invalid_regex_falls_back_to_substring() {
        let filter = SelectionFilter::parse("HK[").unwrap();
        assert!(matches!(filter, SelectionFilter::Substring(_)));
        assert!(filter.matches("my-hk[1].json"));
        assert!(!filter.matches("hk1.json"));
    }

    #[test]
    fn test_exact() {
        let filter = SelectionFilter::exact("1hk.json");
        assert!(filter.matches("1hk.json"));
        assert!(!filter.matches("11hk.json"));
    }
}
