//! Wildcard name patterns
//!
//! Patterns are plain string globs: `*` matches any run of characters (including
//! none) and every other character matches itself. Matching is anchored over the
//! whole name and case sensitive. There is no escaping and no character class
//! syntax, so every string is a valid pattern.

use serde::{Serialize, Serializer};
use std::fmt;

/// Compiled form of a wildcard pattern.
///
/// The source text is split on `*` once at construction so repeated matching
/// does no allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    /// Literal runs between wildcards, empty runs removed
    segments: Vec<String>,
    leading_wildcard: bool,
    trailing_wildcard: bool,
}

impl Pattern {
    /// Compile a pattern. Never fails.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let leading_wildcard = source.starts_with('*');
        let trailing_wildcard = source.ends_with('*');
        let segments = source
            .split('*')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            source,
            segments,
            leading_wildcard,
            trailing_wildcard,
        }
    }

    /// The pattern text as supplied
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True if the pattern contains no wildcard
    pub fn is_literal(&self) -> bool {
        !self.source.contains('*')
    }

    /// Check whether `name` matches this pattern over its full length.
    pub fn matches(&self, name: &str) -> bool {
        if self.is_literal() {
            return name == self.source;
        }

        let mut rest = name;
        let mut segments = self.segments.as_slice();

        if !self.leading_wildcard {
            let Some((first, tail)) = segments.split_first() else {
                return rest.is_empty();
            };
            match rest.strip_prefix(first.as_str()) {
                Some(remaining) => rest = remaining,
                None => return false,
            }
            segments = tail;
        }

        let mut last_anchored = None;
        if !self.trailing_wildcard {
            match segments.split_last() {
                Some((last, head)) => {
                    last_anchored = Some(last.as_str());
                    segments = head;
                }
                None => return rest.is_empty(),
            }
        }

        // Leftmost placement of each floating segment leaves the most room for
        // the ones after it.
        for segment in segments {
            match rest.find(segment.as_str()) {
                Some(index) => rest = &rest[index + segment.len()..],
                None => return false,
            }
        }

        match last_anchored {
            Some(last) => rest.ends_with(last),
            None => true,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl From<&str> for Pattern {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for Pattern {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

/// Match a name against a wildcard pattern without keeping the compiled form.
pub fn matches(name: &str, pattern: &str) -> bool {
    Pattern::new(pattern).matches(name)
}
