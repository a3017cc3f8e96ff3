//! Thread-name normalization: collapses per-instance noise (ids, counters,
//! hex suffixes) so per-thread metrics group instead of exploding into one
//! metric identity per thread instance.

#![allow(missing_docs)]

use regex::Regex;

use crate::core::errors::{HarvestError, Result};

const REPLACEMENT: &str = "#";

/// Default pattern: hex runs of 4+ characters bounded by word breaks, or any
/// digit run.
pub const DEFAULT_PATTERN: &str = r"\b[0-9a-fA-F]{4,}\b|\d+";

/// Thread-name prefixes collapsed to `<prefix>#` before the generic pass.
const PREFIX_GROUPS: &[&str] = &[
    "ActiveMQ",
    "C3P0PooledConnectionPoolManager",
    "QuartzScheduler",
    "elasticsearch",
    "hystrix",
    "JobHandler",
];

/// Markers after which everything is per-request noise.
const TRUNCATE_AFTER: &[&str] = &["http:", "https:", "uri:", "@"];

/// Normalizes thread names into low-cardinality groups.
pub struct ThreadNameNormalizer {
    replacement_pattern: Regex,
    web_request: Regex,
    pool_thread: Regex,
}

impl ThreadNameNormalizer {
    /// Build with the default replacement pattern.
    pub fn new() -> Self {
        Self::with_pattern(DEFAULT_PATTERN).expect("default pattern is valid")
    }

    /// Build with a configured replacement pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let replacement_pattern =
            Regex::new(pattern).map_err(|e| HarvestError::InvalidConfig {
                details: format!("thread name pattern: {e}"),
            })?;
        Ok(Self {
            replacement_pattern,
            web_request: Regex::new(r"^.* (GET|PUT|POST|DELETE|HEAD) .*$")
                .expect("static regex"),
            pool_thread: Regex::new(r"^pool-.*thread.*$").expect("static regex"),
        })
    }

    /// Normalize one thread name.
    pub fn normalize(&self, name: &str) -> String {
        if self.web_request.is_match(name) {
            return format!("WebRequest{REPLACEMENT}");
        }
        if self.pool_thread.is_match(name) {
            return format!("pool{REPLACEMENT}thread{REPLACEMENT}");
        }
        for prefix in PREFIX_GROUPS {
            if name.starts_with(prefix) {
                return format!("{prefix}{REPLACEMENT}");
            }
        }

        let mut name = name.to_string();
        for marker in TRUNCATE_AFTER {
            if let Some(index) = name.find(marker) {
                name.truncate(index + marker.len());
                name.push_str(REPLACEMENT);
                break;
            }
        }
        name = collapse_enclosed(&name, '{', '}');
        name = collapse_enclosed(&name, '(', ')');
        name = collapse_enclosed(&name, '[', ']');

        // '#' rather than '*' so downstream metric selectors stay usable,
        // and '/' stripped for metric-path interpretation.
        self.replacement_pattern
            .replace_all(&name, REPLACEMENT)
            .replace('/', "-")
    }
}

impl Default for ThreadNameNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace every (possibly nested) `start..end` enclosed region with
/// `start#end`. Not expressible as a regex because of nesting, e.g.
/// `[[thing] [more stuff]]`.
fn collapse_enclosed(name: &str, start_char: char, end_char: char) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == start_char {
            let mut depth = 1;
            let mut j = i + 1;
            while j < chars.len() && depth > 0 {
                if chars[j] == start_char {
                    depth += 1;
                } else if chars[j] == end_char {
                    depth -= 1;
                }
                j += 1;
            }
            out.push(start_char);
            out.push_str(REPLACEMENT);
            out.push(end_char);
            i = j;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}
