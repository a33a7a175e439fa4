use std::collections::HashMap;
use std::sync::Mutex;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ConfigError;

lazy_static! {
    static ref GLOBAL_CACHE: GlobCache = GlobCache::default();
}

/// Segment-based wildcard matcher used by remote patterns.
///
/// Patterns are split on a separator (`.` for hostnames, `/` for pathnames).
/// A `*` segment matches exactly one non-empty segment, a `**` segment matches
/// zero or more segments. A `*` embedded in a literal segment matches any run
/// of characters inside that segment.
#[derive(Clone, Debug)]
pub struct GlobMatcher {
    pattern: String,
    regex: Regex,
}

impl GlobMatcher {
    pub fn compile(pattern: &str, separator: char) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        let sep = regex::escape(&separator.to_string());
        let segment = format!("[^{sep}]");
        let segments: Vec<&str> = pattern.split(separator).collect();
        let last = segments.len() - 1;

        let mut source = String::from("^");
        // Whether the next literal segment must be preceded by a separator.
        let mut pending_sep = false;

        for (i, seg) in segments.iter().enumerate() {
            match *seg {
                "**" if i == last => {
                    if pending_sep {
                        source.push_str(&format!("(?:{sep}.*)?"));
                    } else {
                        source.push_str(".*");
                    }
                }
                "**" => {
                    if pending_sep {
                        source.push_str(&sep);
                    }
                    source.push_str(&format!("(?:{segment}*{sep})*"));
                    pending_sep = false;
                }
                "*" => {
                    if pending_sep {
                        source.push_str(&sep);
                    }
                    source.push_str(&format!("{segment}+"));
                    pending_sep = true;
                }
                literal if literal.contains("**") => {
                    return Err(invalid("\"**\" must be a whole segment"));
                }
                literal => {
                    if pending_sep {
                        source.push_str(&sep);
                    }
                    let parts: Vec<String> = literal.split('*').map(regex::escape).collect();
                    source.push_str(&parts.join(&format!("{segment}*")));
                    pending_sep = true;
                }
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Compiles a hostname pattern, segments split on `.`.
    pub fn hostname(pattern: &str) -> Result<Self, ConfigError> {
        Self::compile(pattern, '.')
    }

    /// Compiles a pathname pattern, segments split on `/`.
    pub fn pathname(pattern: &str) -> Result<Self, ConfigError> {
        Self::compile(pattern, '/')
    }

    pub fn test(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Compiled matchers keyed by separator and pattern. Remote patterns come
/// from the config, so the set is bounded.
#[derive(Debug, Default)]
pub struct GlobCache {
    matchers: Mutex<HashMap<(char, String), GlobMatcher>>,
}

impl GlobCache {
    pub fn global() -> &'static GlobCache {
        &GLOBAL_CACHE
    }

    pub fn get_or_compile(&self, pattern: &str, separator: char) -> Result<GlobMatcher, ConfigError> {
        let key = (separator, pattern.to_string());
        if let Some(matcher) = self.lock().get(&key) {
            return Ok(matcher.clone());
        }
        let matcher = GlobMatcher::compile(pattern, separator)?;
        self.lock().insert(key, matcher.clone());
        Ok(matcher)
    }

    pub fn hostname(&self, pattern: &str) -> Result<GlobMatcher, ConfigError> {
        self.get_or_compile(pattern, '.')
    }

    pub fn pathname(&self, pattern: &str) -> Result<GlobMatcher, ConfigError> {
        self.get_or_compile(pattern, '/')
    }

    pub fn contains(&self, pattern: &str, separator: char) -> bool {
        self.lock().contains_key(&(separator, pattern.to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(char, String), GlobMatcher>> {
        self.matchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod glob_tests {
    use super::*;

    #[test]
    fn single_star_matches_one_label() {
        let glob = GlobMatcher::hostname("*.example.com").unwrap();
        assert!(glob.test("img.example.com"));
        assert!(!glob.test("example.com"));
        assert!(!glob.test("cdn.img.example.com"));
        assert!(!glob.test(".example.com"));
    }

    #[test]
    fn double_star_matches_any_labels() {
        let glob = GlobMatcher::hostname("**.example.com").unwrap();
        assert!(glob.test("example.com"));
        assert!(glob.test("img.example.com"));
        assert!(glob.test("cdn.img.example.com"));
        assert!(!glob.test("example.org"));
        assert!(!glob.test("badexample.com"));
    }

    #[test]
    fn literal_hostname_is_exact() {
        let glob = GlobMatcher::hostname("image.tmdb.org").unwrap();
        assert!(glob.test("image.tmdb.org"));
        assert!(!glob.test("imageXtmdb.org"));
        assert!(!glob.test("cdn.image.tmdb.org"));
    }

    #[test]
    fn trailing_double_star_pathname() {
        let glob = GlobMatcher::pathname("/t/p/**").unwrap();
        assert!(glob.test("/t/p"));
        assert!(glob.test("/t/p/w780/poster.jpg"));
        assert!(!glob.test("/t/q/w780/poster.jpg"));
        assert!(!glob.test("/t/pw780"));
    }

    #[test]
    fn middle_double_star_pathname() {
        let glob = GlobMatcher::pathname("/assets/**/hero.png").unwrap();
        assert!(glob.test("/assets/hero.png"));
        assert!(glob.test("/assets/2023/blog/hero.png"));
        assert!(!glob.test("/assets/2023/blog/hero.jpg"));
    }

    #[test]
    fn single_star_pathname() {
        let glob = GlobMatcher::pathname("/avatars/*").unwrap();
        assert!(glob.test("/avatars/me.png"));
        assert!(!glob.test("/avatars/nested/me.png"));
    }

    #[test]
    fn match_everything() {
        let glob = GlobMatcher::pathname("**").unwrap();
        assert!(glob.test("/"));
        assert!(glob.test("/a/b/c.png"));
        assert!(glob.test(""));
    }

    #[test]
    fn star_inside_segment() {
        let glob = GlobMatcher::hostname("img-*.example.com").unwrap();
        assert!(glob.test("img-eu.example.com"));
        assert!(!glob.test("img.eu.example.com"));
    }

    #[test]
    fn malformed_patterns_are_config_errors() {
        assert!(matches!(
            GlobMatcher::hostname(""),
            Err(ConfigError::InvalidGlob { .. })
        ));
        assert!(matches!(
            GlobMatcher::hostname("a**.example.com"),
            Err(ConfigError::InvalidGlob { .. })
        ));
    }

    #[test]
    fn cache_compiles_each_pattern_once() {
        let cache = GlobCache::default();
        let first = cache.hostname("**.example.com").unwrap();
        let second = cache.hostname("**.example.com").unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(first.pattern(), second.pattern());
        assert!(second.test("img.example.com"));

        // Same text, different separator.
        cache.pathname("**.example.com").unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn cache_does_not_store_malformed_patterns() {
        let cache = GlobCache::default();
        assert!(cache.hostname("a**.example.com").is_err());
        assert!(cache.is_empty());
    }
}
