use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::scorer::{ScoringMode, TieBreak};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub bins: usize,
    pub min_samples: usize,
    pub sigmoid_scale: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            bins: 10,
            min_samples: 30,
            sigmoid_scale: 25.0,
        }
    }
}

/// Paramètres d'une analyse, passés explicitement à chaque requête.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub min_history: usize,
    pub window: usize,
    /// Poids par position (vide = uniforme).
    pub position_weights: Vec<f64>,
    pub scoring: ScoringMode,
    pub lambda: f64,
    pub tie_break: TieBreak,
    pub top_n: usize,
    pub calibration: CalibrationConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_history: 5,
            window: 5,
            position_weights: Vec::new(),
            scoring: ScoringMode::Smoothed,
            lambda: 0.8,
            tie_break: TieBreak::Ascending,
            top_n: 5,
            calibration: CalibrationConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.lambda) {
            bail!("λ doit être compris entre 0 et 1 (reçu {})", self.lambda);
        }
        if self.window == 0 {
            bail!("La fenêtre d'analyse doit être positive");
        }
        if self.top_n == 0 {
            bail!("Le nombre de candidats affichés doit être positif");
        }
        if self.position_weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            bail!("Les poids de position doivent être positifs et finis");
        }
        if self.calibration.bins < 2 {
            bail!("La calibration demande au moins 2 classes");
        }
        if self.calibration.sigmoid_scale.is_nan() || self.calibration.sigmoid_scale <= 0.0 {
            bail!("L'échelle sigmoïde doit être strictement positive");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {:?}", path))?;
    let config: AnalysisConfig = serde_json::from_str(&json)
        .with_context(|| format!("Configuration invalide dans {:?}", path))?;
    config.validate()?;
    Ok(config)
}
