use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;

use lekdet_db::models::{DIGITS, DrawFormat, History};

use super::scorer::{digit_scores, normalize_shares};
use crate::config::{AnalysisConfig, CalibrationConfig};

const EPS: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub center: f64,
    pub raw_rate: f64,
    /// Taux après maximum cumulé (monotone).
    pub rate: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Calibrator {
    Isotonic { bins: Vec<CalibrationBin> },
    Sigmoid { center: f64, scale: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCalibration {
    pub format: DrawFormat,
    pub window: usize,
    pub samples: usize,
    pub hit_rate: f64,
    pub calibrator: Calibrator,
}

impl SavedCalibration {
    /// Calibrateur utilisable pour une analyse ; `None` si le format diffère.
    pub fn calibrator_for(self, format: DrawFormat, window: usize) -> Option<Calibrator> {
        if self.format != format {
            tracing::warn!(
                saved = %self.format,
                %format,
                "calibration d'un autre format ignorée"
            );
            return None;
        }
        if self.window != window {
            tracing::warn!(
                saved_window = self.window,
                window,
                "calibration obtenue avec une autre fenêtre"
            );
        }
        Some(self.calibrator)
    }
}

impl Calibrator {
    /// Ajuste une fonction monotone score → probabilité sur des classes quantiles.
    pub fn fit(samples: &[(f64, bool)], config: &CalibrationConfig) -> Self {
        let mut sorted: Vec<(f64, bool)> = samples
            .iter()
            .copied()
            .filter(|(s, _)| s.is_finite())
            .collect();

        if sorted.len() < config.min_samples {
            tracing::warn!(
                samples = sorted.len(),
                min = config.min_samples,
                "échantillon trop petit, calibration sigmoïde"
            );
            return Self::sigmoid(&sorted, config);
        }

        sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let n = sorted.len();
        let n_bins = config.bins.min(n).max(1);
        let mut bins: Vec<CalibrationBin> = Vec::with_capacity(n_bins);

        for i in 0..n_bins {
            let chunk = &sorted[i * n / n_bins..(i + 1) * n / n_bins];
            if chunk.is_empty() {
                continue;
            }
            let count = chunk.len();
            let center = chunk.iter().map(|(s, _)| s).sum::<f64>() / count as f64;
            let hits = chunk.iter().filter(|(_, h)| *h).count();
            let raw_rate = hits as f64 / count as f64;

            match bins.last_mut() {
                // Centres confondus : fusion, l'abscisse reste strictement croissante
                Some(prev) if (center - prev.center).abs() < 1e-12 => {
                    let total = prev.count + count;
                    let prev_hits = prev.raw_rate * prev.count as f64;
                    prev.raw_rate = (prev_hits + hits as f64) / total as f64;
                    prev.count = total;
                }
                _ => bins.push(CalibrationBin {
                    center,
                    raw_rate,
                    rate: raw_rate,
                    count,
                }),
            }
        }

        if bins.len() < 2 {
            tracing::warn!("scores indiscernables, calibration sigmoïde");
            return Self::sigmoid(&sorted, config);
        }

        let mut running = 0.0f64;
        for bin in &mut bins {
            running = running.max(bin.raw_rate);
            bin.rate = running;
        }

        Calibrator::Isotonic { bins }
    }

    fn sigmoid(samples: &[(f64, bool)], config: &CalibrationConfig) -> Self {
        let center = if samples.is_empty() {
            1.0 / DIGITS as f64
        } else {
            samples.iter().map(|(s, _)| s).sum::<f64>() / samples.len() as f64
        };
        Calibrator::Sigmoid {
            center,
            scale: config.sigmoid_scale,
        }
    }

    /// Probabilité calibrée dans (0, 1), croissante avec le score.
    pub fn apply(&self, score: f64) -> f64 {
        let p = match self {
            Calibrator::Isotonic { bins } => interpolate(bins, score),
            Calibrator::Sigmoid { center, scale } => {
                if score.is_nan() {
                    0.0
                } else {
                    1.0 / (1.0 + (-scale * (score - center)).exp())
                }
            }
        };
        p.clamp(EPS, 1.0 - EPS)
    }

    pub fn is_isotonic(&self) -> bool {
        matches!(self, Calibrator::Isotonic { .. })
    }
}

fn interpolate(bins: &[CalibrationBin], score: f64) -> f64 {
    let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
        return 0.0;
    };
    if score.is_nan() || score <= first.center {
        return first.rate;
    }
    if score >= last.center {
        return last.rate;
    }
    for pair in bins.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if score < b.center {
            let t = (score - a.center) / (b.center - a.center);
            return a.rate + t * (b.rate - a.rate);
        }
    }
    last.rate
}

/// Tirages évaluables : chacun dispose d'au moins `min_history` tirages antérieurs.
pub fn backtest_range(history: &History, config: &AnalysisConfig) -> Range<usize> {
    config.min_history.max(1)..history.len().max(config.min_history.max(1))
}

/// Scores des dix chiffres sur la fenêtre strictement antérieure au tirage `t`,
/// couplés à leur présence dans ce tirage.
pub fn backtest_step(
    history: &History,
    t: usize,
    config: &AnalysisConfig,
) -> Vec<(f64, bool)> {
    let draws = history.draws();
    if t == 0 || t >= draws.len() {
        return Vec::new();
    }
    let train = &draws[t.saturating_sub(config.window)..t];
    let mut shares = digit_scores(train, history.format(), &config.position_weights);
    normalize_shares(&mut shares);

    let target = &draws[t];
    (0..DIGITS)
        .map(|d| (shares[d], target.contains(d as u8)))
        .collect()
}

pub fn backtest(history: &History, config: &AnalysisConfig) -> Vec<(f64, bool)> {
    backtest_range(history, config)
        .flat_map(|t| backtest_step(history, t, config))
        .collect()
}

pub fn save_calibration(saved: &SavedCalibration, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(saved)?;
    std::fs::write(path, json).with_context(|| format!("Impossible d'écrire {:?}", path))?;
    Ok(())
}

pub fn load_calibration(path: &Path) -> Result<SavedCalibration> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("Impossible de lire {:?}", path))?;
    let saved: SavedCalibration = serde_json::from_str(&json)
        .with_context(|| format!("Calibration invalide dans {:?}", path))?;
    Ok(saved)
}
