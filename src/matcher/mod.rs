mod pool;

pub use pool::PooledBuf;
pub(crate) use pool::{EXPR_POOL, INDEX_POOL};

use crate::collation::{Collation, ANY_WEIGHT, SINGLE_WEIGHT};
use crate::expression::MatchExpression;

/// Returns the `collection_index` of every expression whose pattern matches
/// `candidate` under the given collation. The result buffer and the internal
/// candidate-weight buffer come from the process-wide scratch pools and are
/// handed back when dropped.
pub fn match_expressions(
    expressions: &[MatchExpression],
    candidate: &str,
    collation: Collation,
) -> PooledBuf<u32> {
    let mut candidate_weights = INDEX_POOL.acquire();
    for ch in candidate.chars() {
        collation.push_weights(ch, &mut candidate_weights);
    }

    let mut survivors = INDEX_POOL.acquire();
    for expression in expressions {
        if weights_match(expression.sort_orders.as_slice(), &candidate_weights) {
            survivors.push(expression.collection_index);
        }
    }
    survivors
}

/// LIKE over weight sequences: `SINGLE_WEIGHT` absorbs exactly one candidate
/// weight, `ANY_WEIGHT` absorbs zero or more, anything else must be equal.
/// Two-cursor scan with a single backtrack point per `%`.
fn weights_match(pattern: &[u32], candidate: &[u32]) -> bool {
    let mut p = 0;
    let mut c = 0;
    let mut backtrack: Option<(usize, usize)> = None;

    while c < candidate.len() {
        if p < pattern.len() && (pattern[p] == SINGLE_WEIGHT || pattern[p] == candidate[c]) {
            p += 1;
            c += 1;
        } else if p < pattern.len() && pattern[p] == ANY_WEIGHT {
            backtrack = Some((p, c));
            p += 1;
        } else if let Some((any_p, any_c)) = backtrack {
            // Let the last `%` absorb one more candidate weight and retry.
            backtrack = Some((any_p, any_c + 1));
            p = any_p + 1;
            c = any_c + 1;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == ANY_WEIGHT {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::{match_expressions, weights_match};
    use crate::collation::{Collation, ANY_WEIGHT, SINGLE_WEIGHT};
    use crate::expression::{parse_expression, MatchExpression};

    fn matches_single(pattern: &str, candidate: &str, collation: Collation) -> bool {
        let expressions = [MatchExpression::new(0, parse_expression(pattern, collation))];
        !match_expressions(&expressions, candidate, collation).is_empty()
    }

    /// Reference LIKE used to cross-check the iterative matcher.
    fn naive_match(pattern: &[u32], candidate: &[u32]) -> bool {
        match pattern.split_first() {
            None => candidate.is_empty(),
            Some((&ANY_WEIGHT, rest)) => (0..=candidate.len())
                .any(|skip| naive_match(rest, &candidate[skip..])),
            Some((&first, rest)) => match candidate.split_first() {
                None => false,
                Some((&head, tail)) => {
                    (first == SINGLE_WEIGHT || first == head) && naive_match(rest, tail)
                }
            },
        }
    }

    #[test]
    fn literal_and_wildcard_basics() {
        assert!(matches_single("main", "main", Collation::Utf8mb4Bin));
        assert!(!matches_single("main", "dev", Collation::Utf8mb4Bin));
        assert!(matches_single("%", "", Collation::Utf8mb4Bin));
        assert!(matches_single("%", "anything", Collation::Utf8mb4Bin));
        assert!(matches_single("_", "x", Collation::Utf8mb4Bin));
        assert!(!matches_single("_", "", Collation::Utf8mb4Bin));
        assert!(!matches_single("_", "xy", Collation::Utf8mb4Bin));
        assert!(matches_single("", "", Collation::Utf8mb4Bin));
        assert!(!matches_single("", "a", Collation::Utf8mb4Bin));
    }

    #[test]
    fn prefix_patterns_cover_subpaths() {
        assert!(matches_single("feat/%", "feat/x", Collation::Utf8mb4AiCi));
        assert!(matches_single("feat/%", "feat/", Collation::Utf8mb4AiCi));
        assert!(!matches_single("feat/%", "main", Collation::Utf8mb4AiCi));
        assert!(matches_single("%-hotfix", "v2-hotfix", Collation::Utf8mb4AiCi));
    }

    #[test]
    fn collation_governs_literal_equality_only() {
        assert!(matches_single("MAIN", "main", Collation::Utf8mb4AiCi));
        assert!(!matches_single("MAIN", "main", Collation::Utf8mb4Bin));
        assert!(matches_single("m_in", "mAin", Collation::Utf8mb4AiCi));
    }

    #[test]
    fn matching_is_insensitive_to_candidate_folding() {
        for (pattern, candidate) in [("caf_", "CAFÉ"), ("r%é", "RÉSUMÉ"), ("%", "ÜBER")] {
            let direct = matches_single(pattern, candidate, Collation::Utf8mb4AiCi);
            let folded = matches_single(
                pattern,
                &crate::expression::fold_expression(candidate),
                Collation::Utf8mb4AiCi,
            );
            assert_eq!(direct, folded, "pattern {pattern:?} candidate {candidate:?}");
        }
    }

    #[test]
    fn filtered_columns_report_their_collection_indexes() {
        let collation = Collation::Utf8mb4Bin;
        let expressions = [
            MatchExpression::new(4, parse_expression("al%", collation)),
            MatchExpression::new(7, parse_expression("bob", collation)),
            MatchExpression::new(9, parse_expression("%", collation)),
        ];
        let survivors = match_expressions(&expressions, "alice", collation);
        assert_eq!(survivors.as_slice(), &[4, 9]);
    }

    /// Sweeps every pattern over {a, b, %, _} up to length 3 against every
    /// candidate over {a, b} up to length 3 and cross-checks the iterative
    /// matcher against the recursive reference.
    #[test]
    fn matcher_agrees_with_naive_reference() {
        let pattern_alphabet = ['a', 'b', '%', '_'];
        let candidate_alphabet = ['a', 'b'];

        let mut patterns = vec![String::new()];
        for _ in 0..3 {
            let extended: Vec<String> = patterns
                .iter()
                .flat_map(|p| {
                    pattern_alphabet.iter().map(move |ch| {
                        let mut next = p.clone();
                        next.push(*ch);
                        next
                    })
                })
                .collect();
            patterns.extend(extended);
        }
        let mut candidates = vec![String::new()];
        for _ in 0..3 {
            let extended: Vec<String> = candidates
                .iter()
                .flat_map(|c| {
                    candidate_alphabet.iter().map(move |ch| {
                        let mut next = c.clone();
                        next.push(*ch);
                        next
                    })
                })
                .collect();
            candidates.extend(extended);
        }

        for pattern in &patterns {
            let orders = parse_expression(pattern, Collation::Utf8mb4Bin);
            for candidate in &candidates {
                let weights: Vec<u32> = candidate.chars().map(|ch| ch as u32).collect();
                assert_eq!(
                    weights_match(orders.as_slice(), &weights),
                    naive_match(orders.as_slice(), &weights),
                    "pattern {pattern:?} candidate {candidate:?}"
                );
            }
        }
    }
}
