//! Approximate name matching.
//!
//! Players mistype names in query commands all the time. [`search`] finds
//! the candidates within a small case-insensitive Levenshtein distance of
//! the query, keeping the candidates' original order.

use serde::{Deserialize, Serialize};

/// Limits applied by [`search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Upper bound on returned matches.
    pub max_results: usize,
    /// Largest edit distance still considered a match (inclusive).
    pub max_distance: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 5,
            max_distance: 5,
        }
    }
}

/// Case-insensitive Levenshtein distance between `a` and `b`.
///
/// Works on Unicode scalar values, so CJK names count one edit per
/// character. Uses two rows of the DP table.
pub fn distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            let insertion = curr[j] + 1;
            let deletion = prev[j + 1] + 1;
            curr[j + 1] = substitution.min(insertion).min(deletion);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Returns the candidates within `options.max_distance` of `query`.
///
/// Matches keep their order in `candidates`; nothing is sorted by
/// distance. At most `options.max_results` are returned.
pub fn search<S: AsRef<str>>(query: &str, candidates: &[S], options: SearchOptions) -> Vec<String> {
    search_with_distance(query, candidates, options)
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

/// Like [`search`], but also returns each match's distance.
pub fn search_with_distance<S: AsRef<str>>(
    query: &str,
    candidates: &[S],
    options: SearchOptions,
) -> Vec<(String, usize)> {
    candidates
        .iter()
        .map(|c| (c.as_ref(), distance(query, c.as_ref())))
        .filter(|(_, d)| *d <= options.max_distance)
        .take(options.max_results)
        .map(|(c, d)| (c.to_string(), d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(max_results: usize, max_distance: usize) -> SearchOptions {
        SearchOptions {
            max_results,
            max_distance,
        }
    }

    #[test]
    fn test_distance_known_values() {
        assert_eq!(distance("kitten", "sitting"), 3);
        assert_eq!(distance("", "abc"), 3);
        assert_eq!(distance("abc", ""), 3);
        assert_eq!(distance("", ""), 0);
        assert_eq!(distance("flaw", "lawn"), 2);
    }

    #[test]
    fn test_distance_ignores_case() {
        assert_eq!(distance("SniperWolf", "sniperwolf"), 0);
    }

    #[test]
    fn test_distance_counts_chars_not_bytes() {
        assert_eq!(distance("狙击手", "狙击"), 1);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let pairs = [("abc", "yabd"), ("Tank_01", "tanky"), ("", "x"), ("暖服", "暖服机器人")];
        for (a, b) in pairs {
            assert_eq!(distance(a, b), distance(b, a), "{a} vs {b}");
        }
    }

    #[test]
    fn test_search_keeps_input_order() {
        let found = search("abc", &["abc", "abd", "xyz"], opts(5, 1));
        assert_eq!(found, vec!["abc", "abd"]);

        // "abdd" is farther than "abc" but listed first, so it stays first.
        let found = search("abc", &["abdd", "abc"], opts(5, 2));
        assert_eq!(found, vec!["abdd", "abc"]);
    }

    #[test]
    fn test_search_empty_inputs() {
        let empty: [&str; 0] = [];
        assert!(search("", &empty, SearchOptions::default()).is_empty());
        assert!(search("abc", &empty, SearchOptions::default()).is_empty());
    }

    #[test]
    fn test_search_caps_results() {
        let names = ["aa", "ab", "ac", "ad"];
        let found = search("a", &names, opts(2, 1));
        assert_eq!(found, vec!["aa", "ab"]);
    }

    #[test]
    fn test_search_with_distance_reports_distance() {
        let found = search_with_distance("Wolf", &["wolf", "wolves"], SearchOptions::default());
        assert_eq!(found, vec![("wolf".to_string(), 0), ("wolves".to_string(), 3)]);
    }

    #[test]
    fn test_default_options() {
        assert_eq!(SearchOptions::default(), opts(5, 5));
    }
}
