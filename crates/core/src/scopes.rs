//! Scope set comparison
//!
//! Scope lists are compared as multisets: order is irrelevant, duplicate
//! counts are not. Small lists use a pairwise search; large lists switch to a
//! count map to stay linear.

use std::collections::HashMap;

use evesso_domain::constants::SCOPE_LOOP_THRESHOLD;

/// True iff `a` and `b` contain the same elements with the same counts.
#[must_use]
pub fn match_scopes<S: AsRef<str>>(a: &[S], b: &[S]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    if a.len() <= SCOPE_LOOP_THRESHOLD {
        match_pairwise(a, b)
    } else {
        match_counted(a, b)
    }
}

fn match_pairwise<S: AsRef<str>>(a: &[S], b: &[S]) -> bool {
    let mut visited = vec![false; b.len()];
    'outer: for scope in a {
        for (i, candidate) in b.iter().enumerate() {
            if !visited[i] && candidate.as_ref() == scope.as_ref() {
                visited[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

fn match_counted<S: AsRef<str>>(a: &[S], b: &[S]) -> bool {
    let mut counts: HashMap<&str, usize> = HashMap::with_capacity(a.len());
    for scope in a {
        *counts.entry(scope.as_ref()).or_default() += 1;
    }
    for scope in b {
        match counts.get_mut(scope.as_ref()) {
            Some(1) => {
                counts.remove(scope.as_ref());
            }
            Some(count) => *count -= 1,
            None => return false,
        }
    }
    counts.is_empty()
}

/// Canonical stored form: trimmed, empty entries dropped, sorted.
/// Duplicates are kept.
#[must_use]
pub fn normalize_scopes<I, S>(scopes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = scopes
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    normalized.sort_unstable();
    normalized
}
