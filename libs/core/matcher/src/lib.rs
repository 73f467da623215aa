//! Pure numerical core: no I/O, no async, no locks. Given a query embedding
//! and the set of active employees with their enrolled embeddings, find the
//! best match. Kept as a standalone crate — like the teacher's pure math
//! core — so its properties (P2, P3 in the base specification) are checkable
//! with plain unit and property tests, independent of the store or the
//! pipeline.

use serde::Serialize;

/// One candidate: an employee identifier, optional display name, and the
/// set of embeddings enrolled for them.
pub struct Candidate<'a> {
    pub employee_id: &'a str,
    pub display_name: Option<&'a str>,
    pub embeddings: &'a [Vec<f32>],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub employee_id: Option<String>,
    pub display_name: Option<String>,
    pub score: f32,
}

impl MatchResult {
    fn no_match(score: f32) -> Self {
        MatchResult {
            employee_id: None,
            display_name: None,
            score,
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity of two vectors, clamped to `[0, 1]` per the base
/// specification's P2 — negative cosine angles collapse to 0 rather than
/// being reported as a "worse than no match" signal, and floating error
/// above 1.0 is clamped down.
///
/// A zero-norm input yields `0.0` rather than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = l2_norm(a) * l2_norm(b);
    if denom == 0.0 {
        return 0.0;
    }
    (dot(a, b) / denom).clamp(0.0, 1.0)
}

/// For each candidate, the best (max) score across their embeddings against
/// `query`, then the candidate with the greatest such score, iff it meets
/// `threshold`. Ties go to whichever candidate was iterated first (the
/// store's natural iteration order), matching the base spec's tie-break
/// rule. An empty candidate list or a zero-norm query both yield "no match"
/// with score `0.0`.
pub fn find_best_match<'a>(
    query: &[f32],
    candidates: impl IntoIterator<Item = Candidate<'a>>,
    threshold: f32,
) -> MatchResult {
    if l2_norm(query) == 0.0 {
        return MatchResult::no_match(0.0);
    }

    let mut best: Option<(Candidate<'a>, f32)> = None;
    for candidate in candidates {
        let score = candidate
            .embeddings
            .iter()
            .map(|v| cosine_similarity(query, v))
            .fold(0.0_f32, f32::max);

        match &best {
            Some((_, best_score)) if *best_score >= score => {}
            _ => best = Some((candidate, score)),
        }
    }

    match best {
        None => MatchResult::no_match(0.0),
        Some((candidate, score)) if score >= threshold => MatchResult {
            employee_id: Some(candidate.employee_id.to_string()),
            display_name: candidate.display_name.map(str::to_string),
            score,
        },
        Some((_, score)) => MatchResult::no_match(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(v: &[f32]) -> Vec<f32> {
        let n = l2_norm(v);
        v.iter().map(|x| x / n).collect()
    }

    #[test]
    fn identical_vectors_score_one() {
        let v = normalize(&[1.0, 2.0, 3.0]);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn opposite_vectors_clamp_to_zero_not_negative() {
        let a = normalize(&[1.0, 0.0]);
        let b = normalize(&[-1.0, 0.0]);
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn zero_norm_query_yields_no_match() {
        let zero = vec![0.0, 0.0];
        let known = normalize(&[1.0, 0.0]);
        let result = find_best_match(
            &zero,
            [Candidate {
                employee_id: "E1",
                display_name: None,
                embeddings: std::slice::from_ref(&known),
            }],
            0.5,
        );
        assert_eq!(result.employee_id, None);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn empty_candidate_set_yields_no_match_with_zero_score() {
        let query = normalize(&[1.0, 0.0]);
        let result = find_best_match(&query, std::iter::empty(), 0.5);
        assert_eq!(result.employee_id, None);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn below_threshold_reports_best_score_but_no_identity() {
        let query = normalize(&[1.0, 0.0]);
        let far = normalize(&[0.0, 1.0]);
        let result = find_best_match(
            &query,
            [Candidate {
                employee_id: "E1",
                display_name: None,
                embeddings: std::slice::from_ref(&far),
            }],
            0.9,
        );
        assert_eq!(result.employee_id, None);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn first_encountered_wins_on_tie() {
        let query = normalize(&[1.0, 0.0]);
        let same = query.clone();
        let result = find_best_match(
            &query,
            [
                Candidate {
                    employee_id: "FIRST",
                    display_name: None,
                    embeddings: std::slice::from_ref(&same),
                },
                Candidate {
                    employee_id: "SECOND",
                    display_name: None,
                    embeddings: std::slice::from_ref(&same),
                },
            ],
            0.5,
        );
        assert_eq!(result.employee_id.as_deref(), Some("FIRST"));
    }

    proptest::proptest! {
        #[test]
        fn score_always_in_unit_range(
            a in proptest::collection::vec(-10.0_f32..10.0, 1..8),
            b in proptest::collection::vec(-10.0_f32..10.0, 1..8),
        ) {
            let len = a.len().min(b.len());
            let score = cosine_similarity(&a[..len], &b[..len]);
            proptest::prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn raising_threshold_never_turns_denied_into_granted(
            a in proptest::collection::vec(-1.0_f32..1.0, 4),
            b in proptest::collection::vec(-1.0_f32..1.0, 4),
            t1 in 0.0_f32..1.0,
            delta in 0.0_f32..1.0,
        ) {
            let t2 = (t1 + delta).min(1.0);
            let emb = vec![b.clone()];
            let low = find_best_match(&a, [Candidate { employee_id: "E1", display_name: None, embeddings: &emb }], t1);
            let high = find_best_match(&a, [Candidate { employee_id: "E1", display_name: None, embeddings: &emb }], t2);
            if low.employee_id.is_none() {
                proptest::prop_assert!(high.employee_id.is_none());
            }
        }
    }
}
