use super::ScoredDoc;
use crate::DocId;
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// Range of the additive perturbation given to tied documents.
pub const PERTURBATION: std::ops::Range<f64> = 0.01..0.1;

/// Random draws tried before stepping to the next free representable score.
const MAX_REDRAWS: usize = 16;

fn score_key(score: f64) -> u64 {
    // -0.0 and 0.0 tie
    if score == 0.0 { 0f64.to_bits() } else { score.to_bits() }
}

/// Smallest f64 above `x`; `x` itself for infinities and NaN.
fn next_up(x: f64) -> f64 {
    if !x.is_finite() || x == f64::MAX {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    f64::from_bits(if x > 0.0 { bits + 1 } else { bits - 1 })
}

/// A score above `score` not yet in `taken`, random where the float grid allows it.
///
/// At magnitudes where `score + 0.1` rounds back onto `score` the random draws
/// keep colliding; the fallback walks upward one representable value at a time.
/// Infinite or NaN scores cannot be separated and stay tied.
fn perturb<R: Rng + ?Sized>(score: f64, taken: &mut HashSet<u64>, rng: &mut R) -> f64 {
    for _ in 0..MAX_REDRAWS {
        let candidate = score + rng.gen_range(PERTURBATION);
        if taken.insert(score_key(candidate)) {
            return candidate;
        }
    }
    let mut candidate = next_up(score);
    while !taken.insert(score_key(candidate)) {
        let next = next_up(candidate);
        if next.to_bits() == candidate.to_bits() {
            tracing::debug!(score, "tie cannot be separated");
            return candidate;
        }
        candidate = next;
    }
    candidate
}

pub(crate) fn sort_descending(results: &mut [ScoredDoc]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

/// Breaks exact score ties.
///
/// In every group of equal scores, members are drawn at random and given
/// `score + U[0.01, 0.1)` until one is left; that survivor keeps the original
/// score. A draw landing on a score already present is repeated, so finite
/// output scores are pairwise distinct. Output is sorted descending.
pub fn ensure_unique_scores<R: Rng + ?Sized>(ranked: Vec<ScoredDoc>, rng: &mut R) -> Vec<ScoredDoc> {
    let mut groups: Vec<(f64, Vec<DocId>)> = Vec::new();
    let mut slots: HashMap<u64, usize> = HashMap::new();
    for doc in &ranked {
        let key = score_key(doc.score);
        match slots.get(&key) {
            Some(&slot) => groups[slot].1.push(doc.doc_id),
            None => {
                slots.insert(key, groups.len());
                groups.push((doc.score, vec![doc.doc_id]));
            }
        }
    }

    let mut taken: HashSet<u64> = slots.keys().copied().collect();
    let mut adjusted = Vec::with_capacity(ranked.len());
    for (score, mut docs) in groups {
        while docs.len() > 1 {
            let doc_id = docs.remove(rng.gen_range(0..docs.len()));
            let perturbed = perturb(score, &mut taken, rng);
            adjusted.push(ScoredDoc { doc_id, score: perturbed });
        }
        if let Some(doc_id) = docs.pop() {
            adjusted.push(ScoredDoc { doc_id, score });
        }
    }
    sort_descending(&mut adjusted);
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scored(pairs: &[(DocId, f64)]) -> Vec<ScoredDoc> {
        pairs.iter().map(|&(doc_id, score)| ScoredDoc { doc_id, score }).collect()
    }

    #[test]
    fn ties_become_distinct_with_one_survivor() {
        let input = scored(&[(0, 3.0), (1, 2.0), (2, 2.0), (3, 2.0), (4, 1.0), (5, 1.0)]);
        let out = ensure_unique_scores(input, &mut StdRng::seed_from_u64(7));
        assert_eq!(out.len(), 6);

        let keys: HashSet<u64> = out.iter().map(|d| d.score.to_bits()).collect();
        assert_eq!(keys.len(), out.len());

        assert_eq!(out.iter().filter(|d| d.score == 2.0).count(), 1);
        assert_eq!(out.iter().filter(|d| d.score == 1.0).count(), 1);
        assert_eq!(out.iter().filter(|d| d.score == 3.0).count(), 1);
        for d in &out {
            let bumped = [(2.0, 0.01, 0.1), (1.0, 0.01, 0.1)]
                .iter()
                .any(|&(base, lo, hi)| d.score >= base + lo && d.score < base + hi);
            assert!(bumped || [3.0, 2.0, 1.0].contains(&d.score));
        }
        assert!(out.windows(2).all(|w| w[0].score > w[1].score));
    }

    #[test]
    fn same_seed_same_order() {
        let input = scored(&[(0, 1.0), (1, 1.0), (2, 1.0), (3, 1.0)]);
        let a = ensure_unique_scores(input.clone(), &mut StdRng::seed_from_u64(42));
        let b = ensure_unique_scores(input, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn huge_ties_still_separate() {
        // 0.1 is below the float spacing here, so every random draw collides
        let big = 2e16;
        let input = scored(&[(0, big), (1, big), (2, big)]);
        let out = ensure_unique_scores(input, &mut StdRng::seed_from_u64(5));
        assert_eq!(out.len(), 3);
        let keys: HashSet<u64> = out.iter().map(|d| d.score.to_bits()).collect();
        assert_eq!(keys.len(), 3);
        assert!(out.iter().all(|d| d.score >= big));
        assert_eq!(out[2].score, big);
    }

    #[test]
    fn infinite_ties_terminate() {
        let input = scored(&[(0, f64::INFINITY), (1, f64::INFINITY)]);
        let out = ensure_unique_scores(input, &mut StdRng::seed_from_u64(5));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn next_up_steps_one_ulp() {
        assert!(next_up(1.0) > 1.0);
        assert!(next_up(-1.0) > -1.0);
        assert!(next_up(0.0) > 0.0);
        assert_eq!(next_up(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn untied_input_is_untouched() {
        let input = scored(&[(0, 3.0), (1, 2.0), (2, 1.0)]);
        let out = ensure_unique_scores(input.clone(), &mut StdRng::seed_from_u64(1));
        assert_eq!(out, input);
    }
}
