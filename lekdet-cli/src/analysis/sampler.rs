use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use lekdet_db::models::{CandidateKind, CandidateScore};

use super::scorer::Prediction;

pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// Tirage uniforme parmi les `top` premiers candidats classés.
pub fn pick_one<'a, R: Rng + ?Sized>(
    candidates: &'a [CandidateScore],
    top: usize,
    rng: &mut R,
) -> Option<&'a CandidateScore> {
    let n = top.min(candidates.len());
    candidates[..n].choose(rng)
}

/// Pronostic final : un quatre chiffres, ou un trois chiffres si le format n'en a pas.
pub fn final_guess<'a, R: Rng + ?Sized>(
    prediction: &'a Prediction,
    top: usize,
    rng: &mut R,
) -> Option<&'a CandidateScore> {
    [CandidateKind::Quad, CandidateKind::Triple]
        .iter()
        .map(|&kind| prediction.candidates(kind))
        .find(|list| !list.is_empty())
        .and_then(|list| pick_one(list, top, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::make_history;
    use crate::analysis::scorer::analyze;
    use crate::config::AnalysisConfig;

    fn candidates(values: &[&str]) -> Vec<CandidateScore> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| CandidateScore {
                value: v.to_string(),
                score: (values.len() - i) as f64,
                last_seen: None,
            })
            .collect()
    }

    #[test]
    fn test_pick_one_stays_in_top() {
        let list = candidates(&["11", "22", "33", "44", "55"]);
        let mut rng = make_rng(Some(7));
        for _ in 0..100 {
            let picked = pick_one(&list, 2, &mut rng).unwrap();
            assert!(picked.value == "11" || picked.value == "22");
        }
    }

    #[test]
    fn test_pick_one_empty() {
        let mut rng = make_rng(Some(1));
        assert!(pick_one(&[], 3, &mut rng).is_none());
        let list = candidates(&["11"]);
        assert!(pick_one(&list, 0, &mut rng).is_none());
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let list = candidates(&["1", "2", "3", "4", "5", "6", "7", "8"]);
        let run = |seed| {
            let mut rng = make_rng(Some(seed));
            (0..20)
                .map(|_| pick_one(&list, 8, &mut rng).unwrap().value.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_final_guess_prefers_quads() {
        let history = make_history(&["1234", "1234", "5678", "1234", "9012"]);
        let prediction = analyze(&history, &AnalysisConfig::default()).unwrap();
        let mut rng = make_rng(Some(3));
        let guess = final_guess(&prediction, 1, &mut rng).unwrap();
        assert_eq!(guess.value, "1234");
    }
}
