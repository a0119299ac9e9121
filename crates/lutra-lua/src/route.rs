//! Pure structural route matching for scripts.
//!
//! `match_route` lets a script branch on path shape without a routing table:
//! `:name` segments capture, literal segments compare exactly, and the
//! segment counts must agree. Nothing is consulted or mutated.

use std::collections::HashMap;

/// Match a concrete path against a pattern with `:name` parameter segments.
///
/// Returns the captured parameters on a match, `None` otherwise. Leading and
/// trailing slashes are insignificant; empty segments are skipped.
pub fn match_route(path: &str, pattern: &str) -> Option<HashMap<String, String>> {
    let path_segments: Vec<&str> = segments(path);
    let pattern_segments: Vec<&str> = segments(pattern);

    if path_segments.len() != pattern_segments.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (segment, expected) in path_segments.iter().zip(&pattern_segments) {
        match expected.strip_prefix(':') {
            Some(name) if !name.is_empty() => {
                params.insert(name.to_string(), (*segment).to_string());
            }
            _ => {
                if segment != expected {
                    return None;
                }
            }
        }
    }
    Some(params)
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
