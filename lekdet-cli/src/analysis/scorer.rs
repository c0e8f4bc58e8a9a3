use serde::{Deserialize, Serialize};

use lekdet_db::models::{
    CandidateKind, CandidateScore, DIGITS, DigitStats, DigitTag, Draw, DrawFormat, History,
};

use super::{
    AnalysisError, DigitCounts, compute_stats, count_digits, ensure_min_history,
    missing_digits, missing_or_fallback, tag_digits,
};
use crate::config::AnalysisConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringMode {
    /// Comptage direct des combinaisons dans la fenêtre
    Cooccurrence,
    /// λ·fréquence empirique + (1−λ)·produit des fréquences par chiffre
    #[default]
    Smoothed,
}

/// Départage des candidats à score égal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    #[default]
    Ascending,
    MostRecent,
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub format: DrawFormat,
    pub window: usize,
    pub counts: DigitCounts,
    pub stats: Vec<DigitStats>,
    pub tags: Vec<(u8, DigitTag)>,
    pub missing: Vec<u8>,
    /// Vrai si `missing` contient le chiffre le moins fréquent faute d'absent.
    pub missing_is_fallback: bool,
    pub hot: Vec<u8>,
    pub ranked: Vec<(CandidateKind, Vec<CandidateScore>)>,
    /// Somme des scores de chaque catégorie, avant troncature.
    pub totals: Vec<(CandidateKind, f64)>,
}

impl Prediction {
    pub fn candidates(&self, kind: CandidateKind) -> &[CandidateScore] {
        self.ranked
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, list)| list.as_slice())
            .unwrap_or(&[])
    }

    /// Part d'un score dans sa catégorie complète (10^k candidats).
    pub fn share(&self, kind: CandidateKind, score: f64) -> f64 {
        let total = self
            .totals
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, t)| *t)
            .unwrap_or(0.0);
        if total > 0.0 { score / total } else { 0.0 }
    }

    /// Scores des dix chiffres ramenés à une part (somme = 1).
    pub fn single_shares(&self) -> [f64; DIGITS] {
        let mut shares = [0.0f64; DIGITS];
        for c in self.candidates(CandidateKind::Single) {
            if let Some(d) = c.value.parse::<usize>().ok().filter(|&d| d < DIGITS) {
                shares[d] = c.score;
            }
        }
        normalize_shares(&mut shares);
        shares
    }
}

pub fn normalize_shares(scores: &mut [f64; DIGITS]) {
    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        for s in scores.iter_mut() {
            *s /= total;
        }
    } else {
        *scores = [1.0 / DIGITS as f64; DIGITS];
    }
}

/// Somme pondérée des fréquences par position. Poids manquants = 1.0.
pub fn digit_scores(draws: &[Draw], format: DrawFormat, weights: &[f64]) -> [f64; DIGITS] {
    let counts = count_digits(draws, format);
    let mut scores = [0.0f64; DIGITS];
    for (pos, row) in counts.by_position.iter().enumerate() {
        let w = weights.get(pos).copied().unwrap_or(1.0);
        for (d, &c) in row.iter().enumerate() {
            scores[d] += w * c as f64;
        }
    }
    scores
}

struct GramCounts {
    counts: Vec<u32>,
    last_seen: Vec<Option<usize>>,
    total: u32,
}

/// Comptage des suites contiguës de `k` chiffres à l'intérieur de chaque segment.
fn count_grams(draws: &[Draw], k: usize) -> GramCounts {
    let size = 10usize.pow(k as u32);
    let mut counts = vec![0u32; size];
    let mut last_seen = vec![None; size];
    let mut total = 0u32;

    for (t, draw) in draws.iter().enumerate() {
        for seg in draw.segments() {
            if seg.len() < k {
                continue;
            }
            for gram in seg.windows(k) {
                let idx = gram.iter().fold(0usize, |acc, &d| acc * 10 + d as usize);
                counts[idx] += 1;
                last_seen[idx] = Some(t);
                total += 1;
            }
        }
    }

    GramCounts {
        counts,
        last_seen,
        total,
    }
}

fn gram_digits(mut idx: usize, k: usize) -> Vec<usize> {
    let mut digits = vec![0usize; k];
    for slot in digits.iter_mut().rev() {
        *slot = idx % 10;
        idx /= 10;
    }
    digits
}

/// Tous les candidats de longueur `kind.width()`, classés.
pub fn score_candidates(
    draws: &[Draw],
    format: DrawFormat,
    kind: CandidateKind,
    config: &AnalysisConfig,
) -> Vec<CandidateScore> {
    let k = kind.width();
    if k > format.max_candidate_len() {
        return Vec::new();
    }

    let scores: Vec<CandidateScore> = if k == 1 {
        let weighted = digit_scores(draws, format, &config.position_weights);
        (0..DIGITS)
            .map(|d| CandidateScore {
                value: d.to_string(),
                score: weighted[d],
                last_seen: draws.iter().rposition(|draw| draw.contains(d as u8)),
            })
            .collect()
    } else {
        let grams = count_grams(draws, k);
        let counts = count_digits(draws, format);
        let lambda = config.lambda;
        grams
            .counts
            .iter()
            .enumerate()
            .map(|(idx, &count)| {
                let score = match config.scoring {
                    ScoringMode::Cooccurrence => count as f64,
                    ScoringMode::Smoothed => {
                        let empirical = if grams.total > 0 {
                            count as f64 / grams.total as f64
                        } else {
                            0.0
                        };
                        let independent: f64 = gram_digits(idx, k)
                            .iter()
                            .map(|&d| counts.share(d as u8))
                            .product();
                        lambda * empirical + (1.0 - lambda) * independent
                    }
                };
                CandidateScore {
                    value: format!("{:0width$}", idx, width = k),
                    score,
                    last_seen: grams.last_seen[idx],
                }
            })
            .collect()
    };

    rank(scores, config.tie_break)
}

pub fn rank(mut scores: Vec<CandidateScore>, tie_break: TieBreak) -> Vec<CandidateScore> {
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| match tie_break {
                TieBreak::Ascending => a.value.cmp(&b.value),
                // None < Some : les jamais vus passent après
                TieBreak::MostRecent => b
                    .last_seen
                    .cmp(&a.last_seen)
                    .then_with(|| a.value.cmp(&b.value)),
            })
    });
    scores
}

/// Analyse complète sur la fenêtre glissante de l'historique.
pub fn analyze(history: &History, config: &AnalysisConfig) -> Result<Prediction, AnalysisError> {
    if config.window == 0 {
        return Err(AnalysisError::InvalidWindow);
    }
    ensure_min_history(history, config.min_history)?;

    let format = history.format();
    let draws = history.window(config.window);
    let counts = count_digits(draws, format);
    let stats = compute_stats(draws, format);
    let tags = tag_digits(&stats, draws.len(), format);
    let missing_is_fallback = missing_digits(&counts).is_empty();
    let missing = missing_or_fallback(&counts);

    let mut ranked = Vec::new();
    let mut totals = Vec::new();
    for kind in CandidateKind::ALL {
        if kind.width() > format.max_candidate_len() {
            continue;
        }
        let mut list = score_candidates(draws, format, kind, config);
        totals.push((kind, list.iter().map(|c| c.score).sum::<f64>()));
        if kind != CandidateKind::Single {
            list.truncate(config.top_n);
        }
        ranked.push((kind, list));
    }

    let hot: Vec<u8> = ranked
        .iter()
        .find(|(k, _)| *k == CandidateKind::Single)
        .map(|(_, list)| {
            list.iter()
                .filter(|c| c.score > 0.0)
                .take(3)
                .filter_map(|c| c.value.parse::<u8>().ok())
                .collect()
        })
        .unwrap_or_default();

    tracing::debug!(window = draws.len(), ?format, "analyse terminée");

    Ok(Prediction {
        format,
        window: draws.len(),
        counts,
        stats,
        tags,
        missing,
        missing_is_fallback,
        hot,
        ranked,
        totals,
    })
}
