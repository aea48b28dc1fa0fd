//! Entry-name filters for patmod comparisons.
//!
//! Each pattern is one of:
//! - a glob containing `*` or `?`, searched anywhere in the name;
//! - a `^`-anchored regex, matched from the start of the name;
//! - anything else, searched as a regex, or as a plain substring when it
//!   is not a valid regex.
//!
//! All matching is case-insensitive. An empty pattern list matches every name.

use regex::{Regex, RegexBuilder};
use tracing::debug;

#[derive(Clone, Debug)]
enum Matcher {
    Regex(Regex),
    Substring(String),
}

impl Matcher {
    fn compile(pattern: &str) -> Self {
        let source = if pattern.contains('*') || pattern.contains('?') {
            glob_to_regex(pattern)
        } else if pattern.starts_with('^') {
            format!("^(?:{})", &pattern[1..])
        } else {
            pattern.to_string()
        };

        match RegexBuilder::new(&source).case_insensitive(true).build() {
            Ok(regex) => Self::Regex(regex),
            Err(e) => {
                debug!(pattern, error = %e, "pattern is not a regex; using substring match");
                Self::Substring(pattern.to_lowercase())
            }
        }
    }

    fn is_match(&self, name: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(name),
            Self::Substring(needle) => name.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// A compiled set of name patterns; a name passes if any pattern matches.
#[derive(Clone, Debug, Default)]
pub struct NamePatterns {
    matchers: Vec<Matcher>,
}

impl NamePatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            matchers: patterns
                .iter()
                .map(|p| Matcher::compile(p.as_ref()))
                .collect(),
        }
    }

    /// Returns `true` if no patterns were given.
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.matchers.is_empty() || self.matchers.iter().any(|m| m.is_match(name))
    }
}

/// `*` becomes `.*`, `?` becomes `.`, everything else is literal.
fn glob_to_regex(glob: &str) -> String {
    regex::escape(glob).replace(r"\*", ".*").replace(r"\?", ".")
}
