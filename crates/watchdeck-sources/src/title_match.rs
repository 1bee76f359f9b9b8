//! Fuzzy title matching shared by every provider.
//!
//! A provider result is only trusted when its title is similar enough to the
//! locally tracked one; otherwise a search for "Mushishi" that returns some
//! unrelated show would propose a bogus episode count.

/// Lowercase and keep only letters and digits (Unicode aware)
pub fn normalize(s: &str) -> String {
    s.chars()
        .flat_map(|c| c.to_lowercase())
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Levenshtein edit distance over chars
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

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
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Decide whether `candidate` names the same title as `query`.
///
/// Substring containment either way is an immediate match. Otherwise the
/// similarity must be strictly above 0.7.
pub fn is_similar(query: &str, candidate: &str) -> bool {
    if candidate.trim().is_empty() {
        return false;
    }

    let q = normalize(query);
    let c = normalize(candidate);
    if q.is_empty() || c.is_empty() {
        return false;
    }

    if q.contains(&c) || c.contains(&q) {
        return true;
    }

    // similarity > 0.7  <=>  distance / max_len < 0.3  <=>  10 * distance < 3 * max_len
    // Integer form keeps the boundary exact.
    let max_len = q.chars().count().max(c.chars().count());
    let distance = levenshtein(&q, &c);
    10 * distance < 3 * max_len
}

/// True when any of the candidate titles matches
pub fn any_similar<'a, I>(query: &str, candidates: I) -> bool
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .any(|candidate| is_similar(query, candidate))
}
