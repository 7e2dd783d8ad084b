//! Compiled regular expressions, cached per context.

use std::collections::HashMap;

use regex::Regex;

/// Patterns compiled at most once per context. Invalid patterns are cached
/// too, so a bad pattern in a loop reports its error without recompiling.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: HashMap<String, Result<Regex, String>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, pattern: &str) -> Result<&Regex, String> {
        self.compiled
            .entry(pattern.to_string())
            .or_insert_with(|| Regex::new(pattern).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_once_and_caches_errors() {
        let mut cache = PatternCache::new();
        assert!(cache.get("^a+$").unwrap().is_match("aaa"));
        assert!(cache.get("^a+$").is_ok());
        assert!(cache.get("(").is_err());
        assert!(cache.get("(").is_err());
        assert_eq!(cache.len(), 2);
    }
}
