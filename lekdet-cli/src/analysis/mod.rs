pub mod calibration;
pub mod sampler;
pub mod scorer;

use lekdet_db::models::{DIGITS, DigitStats, DigitTag, Draw, DrawFormat, History};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("données insuffisantes : {needed} tirages requis, {available} disponibles")]
    InsufficientData { needed: usize, available: usize },

    #[error("fenêtre d'analyse nulle")]
    InvalidWindow,
}

pub fn ensure_min_history(history: &History, min: usize) -> Result<(), AnalysisError> {
    if history.len() < min {
        return Err(AnalysisError::InsufficientData {
            needed: min,
            available: history.len(),
        });
    }
    Ok(())
}

/// Comptages par chiffre, global et par position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitCounts {
    pub overall: [u32; DIGITS],
    pub by_position: Vec<[u32; DIGITS]>,
    pub draws: usize,
}

impl DigitCounts {
    pub fn total(&self) -> u32 {
        self.overall.iter().sum()
    }

    pub fn share(&self, digit: u8) -> f64 {
        let total = self.total();
        if total == 0 {
            return 1.0 / DIGITS as f64;
        }
        self.overall[digit as usize] as f64 / total as f64
    }
}

pub fn count_digits(draws: &[Draw], format: DrawFormat) -> DigitCounts {
    let mut overall = [0u32; DIGITS];
    let mut by_position = vec![[0u32; DIGITS]; format.digit_count()];

    for draw in draws {
        for (pos, &d) in draw.digits().iter().enumerate() {
            let idx = d as usize;
            if idx < DIGITS && pos < by_position.len() {
                overall[idx] += 1;
                by_position[pos][idx] += 1;
            }
        }
    }

    DigitCounts {
        overall,
        by_position,
        draws: draws.len(),
    }
}

/// Fréquence et retard de chaque chiffre. `draws` est ordonné du plus ancien au plus récent.
pub fn compute_stats(draws: &[Draw], format: DrawFormat) -> Vec<DigitStats> {
    let counts = count_digits(draws, format);
    (0..DIGITS as u8)
        .map(|digit| {
            let gap = draws
                .iter()
                .rev()
                .position(|d| d.contains(digit))
                .unwrap_or(draws.len());
            DigitStats {
                digit,
                frequency: counts.overall[digit as usize],
                gap: gap as u32,
            }
        })
        .collect()
}

pub fn missing_digits(counts: &DigitCounts) -> Vec<u8> {
    (0..DIGITS as u8)
        .filter(|&d| counts.overall[d as usize] == 0)
        .collect()
}

pub fn seen_digits(counts: &DigitCounts) -> Vec<u8> {
    (0..DIGITS as u8)
        .filter(|&d| counts.overall[d as usize] > 0)
        .collect()
}

pub fn least_frequent_digit(counts: &DigitCounts) -> u8 {
    // min_by_key garde le premier minimum : départage par valeur croissante
    (0..DIGITS as u8)
        .min_by_key(|&d| counts.overall[d as usize])
        .unwrap_or(0)
}

/// Chiffres absents de la fenêtre, ou à défaut le moins fréquent.
pub fn missing_or_fallback(counts: &DigitCounts) -> Vec<u8> {
    let missing = missing_digits(counts);
    if missing.is_empty() {
        vec![least_frequent_digit(counts)]
    } else {
        missing
    }
}

pub fn tag_digits(stats: &[DigitStats], draws: usize, format: DrawFormat) -> Vec<(u8, DigitTag)> {
    let expected = (draws * format.digit_count()) as f64 / DIGITS as f64;
    let threshold = 0.3;

    stats
        .iter()
        .map(|s| {
            let tag = if s.frequency == 0 {
                DigitTag::Missing
            } else if expected > 0.0 {
                let deviation = (s.frequency as f64 - expected) / expected;
                if deviation > threshold {
                    DigitTag::Hot
                } else if deviation < -threshold {
                    DigitTag::Cold
                } else {
                    DigitTag::Normal
                }
            } else {
                DigitTag::Normal
            };
            (s.digit, tag)
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn make_history(tokens: &[&str]) -> History {
    let mut history = History::new(DrawFormat::Four);
    for token in tokens {
        history
            .push(Draw::from_token(token, DrawFormat::Four).unwrap())
            .unwrap();
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: [&str; 5] = ["9767", "5319", "1961", "4765", "2633"];

    #[test]
    fn test_manual_tally() {
        let history = make_history(&SAMPLE);
        let counts = count_digits(history.draws(), DrawFormat::Four);
        assert_eq!(counts.overall[9], 3);
        assert_eq!(counts.overall[6], 4);
        assert_eq!(counts.overall[1], 3);
        assert_eq!(counts.overall[0], 0);
        assert_eq!(counts.overall[8], 0);
        assert_eq!(counts.by_position[0][9], 1);
        assert_eq!(counts.by_position[3][9], 1);
        assert_eq!(counts.total(), 20);
    }

    #[test]
    fn test_repeated_digit_counts() {
        let history = make_history(&["1111", "2345"]);
        let counts = count_digits(history.draws(), DrawFormat::Four);
        // le global compte chaque occurrence, la position au plus une par tirage
        assert_eq!(counts.overall[1], 4);
        assert!(counts.by_position.iter().all(|row| row[1] <= 1));
        assert!(counts.by_position.iter().flatten().all(|&c| c as usize <= history.len()));
    }

    #[test]
    fn test_missing_digits_includes_absent() {
        let history = make_history(&["1234", "5612", "3456", "1290", "8888"]);
        let counts = count_digits(history.draws(), DrawFormat::Four);
        assert_eq!(missing_digits(&counts), vec![7]);
    }

    #[test]
    fn test_fallback_to_least_frequent() {
        // Tous les chiffres présents ; 0 et 5 apparaissent une seule fois
        let history = make_history(&["0123", "4567", "8912", "3467", "8912", "3467"]);
        let counts = count_digits(history.draws(), DrawFormat::Four);
        assert!(missing_digits(&counts).is_empty());
        assert_eq!(missing_or_fallback(&counts), vec![0]);
    }

    #[test]
    fn test_ensure_min_history() {
        let history = make_history(&SAMPLE);
        assert!(ensure_min_history(&history, 5).is_ok());
        assert_eq!(
            ensure_min_history(&history, 10),
            Err(AnalysisError::InsufficientData { needed: 10, available: 5 })
        );
    }

    #[test]
    fn test_stats_gap() {
        let history = make_history(&SAMPLE);
        let stats = compute_stats(history.draws(), DrawFormat::Four);
        // 3 dans le dernier tirage
        assert_eq!(stats[3].gap, 0);
        // 9 vu pour la dernière fois dans "1961" (2 tirages avant le dernier)
        assert_eq!(stats[9].gap, 2);
        // 0 jamais vu : retard = taille de la fenêtre
        assert_eq!(stats[0].gap, 5);
    }

    #[test]
    fn test_tags() {
        let history = make_history(&SAMPLE);
        let stats = compute_stats(history.draws(), DrawFormat::Four);
        let tags = tag_digits(&stats, history.len(), DrawFormat::Four);
        assert_eq!(tags[0].1, DigitTag::Missing);
        assert_eq!(tags[6].1, DigitTag::Hot);
        assert_eq!(tags[2].1, DigitTag::Cold);
    }

    #[test]
    fn test_empty_window_share_is_uniform() {
        let counts = count_digits(&[], DrawFormat::Four);
        assert!((counts.share(4) - 0.1).abs() < 1e-12);
        assert_eq!(missing_digits(&counts).len(), 10);
    }

    fn token_strategy() -> impl Strategy<Value = String> {
        "[0-9]{4}"
    }

    proptest! {
        #[test]
        fn total_is_four_per_draw(tokens in prop::collection::vec(token_strategy(), 0..40)) {
            let refs: Vec<&str> = tokens.iter().map(|s| s.as_str()).collect();
            let history = make_history(&refs);
            let counts = count_digits(history.draws(), DrawFormat::Four);
            prop_assert_eq!(counts.total() as usize, 4 * history.len());
            for &c in &counts.overall {
                prop_assert!(c as usize <= 4 * history.len());
            }
            // une position porte un seul chiffre par tirage
            for row in &counts.by_position {
                prop_assert_eq!(row.iter().sum::<u32>() as usize, history.len());
                for &c in row {
                    prop_assert!(c as usize <= history.len());
                }
            }
        }

        #[test]
        fn missing_and_seen_partition_digits(
            tokens in prop::collection::vec(token_strategy(), 0..20),
        ) {
            let refs: Vec<&str> = tokens.iter().map(|s| s.as_str()).collect();
            let history = make_history(&refs);
            let counts = count_digits(history.draws(), DrawFormat::Four);
            let mut all = missing_digits(&counts);
            all.extend(seen_digits(&counts));
            all.sort();
            prop_assert_eq!(all, (0..10).collect::<Vec<u8>>());
        }
    }
}
