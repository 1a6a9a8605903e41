//! Closest-name suggestions for "did you mean" hints

/// Similarity below which no suggestion is made
pub const DEFAULT_SUGGESTION_THRESHOLD: f64 = 0.5;

/// Find the candidate most similar to `target`.
///
/// Similarity is normalized Levenshtein over lowercased names. Candidates
/// scoring below `threshold` are ignored; ties go to the lexicographically
/// smallest candidate so the result is deterministic. An exact match is never
/// suggested.
pub fn closest_name<'a, I>(target: &str, candidates: I, threshold: f64) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let wanted = target.to_ascii_lowercase();
    let mut best: Option<(f64, &str)> = None;
    for candidate in candidates {
        if candidate == target {
            continue;
        }
        let score = strsim::normalized_levenshtein(&wanted, &candidate.to_ascii_lowercase());
        if score < threshold {
            continue;
        }
        best = match best {
            Some((s, c)) if s > score || (s == score && c <= candidate) => Some((s, c)),
            _ => Some((score, candidate)),
        };
    }
    best.map(|(_, c)| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_name_typo() {
        let names = ["revenue", "orders", "avg_amount"];
        assert_eq!(
            closest_name("revenu", names, DEFAULT_SUGGESTION_THRESHOLD),
            Some("revenue".to_string())
        );
    }

    #[test]
    fn test_closest_name_below_threshold() {
        assert_eq!(closest_name("zzz", ["revenue"], DEFAULT_SUGGESTION_THRESHOLD), None);
    }

    #[test]
    fn test_closest_name_tie_is_deterministic() {
        assert_eq!(closest_name("ab", ["ac", "aa"], 0.1), Some("aa".to_string()));
        assert_eq!(closest_name("ab", ["aa", "ac"], 0.1), Some("aa".to_string()));
    }
}
