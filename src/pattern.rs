//! The key pattern language used by pattern deletion: `*` matches any run of characters, everything else matches
//! itself. There are no character classes, no `?`, no escapes.
use regex::Regex;

use crate::error::CacheError;

#[derive(Clone, Debug)]
pub struct KeyPattern {
    source: String,
    regex:  Regex,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Result<Self, CacheError> {
        let body = pattern.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
        let regex = Regex::new(&format!("^{body}$")).map_err(|source| CacheError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The same pattern for Redis `SCAN MATCH`, with Redis' own glob metacharacters other than `*` escaped.
    pub fn to_redis_glob(&self) -> String {
        let mut glob = String::with_capacity(self.source.len());
        for c in self.source.chars() {
            if matches!(c, '?' | '[' | ']' | '\\' | '^') {
                glob.push('\\');
            }
            glob.push(c);
        }
        glob
    }

    pub fn is_literal(&self) -> bool {
        !self.source.contains('*')
    }
}
