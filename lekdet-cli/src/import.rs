use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

use lekdet_db::models::{Draw, DrawFormat, History};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExtractMode {
    /// La ligne entière doit correspondre au motif
    #[default]
    Exact,
    /// Les derniers chiffres trouvés dans la ligne
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    WrongLength,
    NotDigits,
    BadSeparator,
    TooFewDigits,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::WrongLength => write!(f, "longueur incorrecte"),
            RejectReason::NotDigits => write!(f, "caractères non numériques"),
            RejectReason::BadSeparator => write!(f, "séparateur haut/bas invalide"),
            RejectReason::TooFewDigits => write!(f, "pas assez de chiffres"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RejectedLine {
    pub line_no: usize,
    pub content: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone)]
pub struct ParseReport {
    pub history: History,
    pub rejected: Vec<RejectedLine>,
}

impl ParseReport {
    pub fn accepted(&self) -> usize {
        self.history.len()
    }
}

pub fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Erreur de lecture de l'entrée standard")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Impossible d'ouvrir {:?}", path))
}

fn digits_of(token: &str) -> Result<Vec<u8>, RejectReason> {
    token
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8).ok_or(RejectReason::NotDigits))
        .collect()
}

fn parse_exact(line: &str, format: DrawFormat) -> Result<Vec<u8>, RejectReason> {
    let segments = format.segments();
    if segments.len() == 1 {
        let digits = digits_of(line)?;
        if digits.len() != format.digit_count() {
            return Err(RejectReason::WrongLength);
        }
        return Ok(digits);
    }

    let parts: Vec<&str> = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != segments.len() {
        return Err(RejectReason::BadSeparator);
    }
    let mut digits = Vec::with_capacity(format.digit_count());
    for (part, &len) in parts.iter().zip(segments) {
        let seg = digits_of(part)?;
        if seg.len() != len {
            return Err(RejectReason::WrongLength);
        }
        digits.extend(seg);
    }
    Ok(digits)
}

/// Les derniers groupes de chiffres contigus de la ligne, un par segment.
fn parse_trailing(line: &str, format: DrawFormat) -> Result<Vec<u8>, RejectReason> {
    let runs: Vec<&str> = line
        .split(|c: char| !c.is_ascii_digit())
        .filter(|r| !r.is_empty())
        .collect();
    let segments = format.segments();
    if runs.len() < segments.len() {
        return Err(RejectReason::TooFewDigits);
    }

    let mut digits = Vec::with_capacity(format.digit_count());
    for (run, &len) in runs[runs.len() - segments.len()..].iter().zip(segments) {
        if run.len() < len {
            return Err(RejectReason::TooFewDigits);
        }
        if run.len() > len {
            return Err(RejectReason::WrongLength);
        }
        digits.extend(digits_of(run)?);
    }
    Ok(digits)
}

/// Découpe un texte collé en historique ; les lignes invalides sont ignorées et rapportées.
pub fn parse_history(text: &str, format: DrawFormat, mode: ExtractMode) -> ParseReport {
    let mut history = History::new(format);
    let mut rejected = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let parsed = match mode {
            ExtractMode::Exact => parse_exact(line, format),
            ExtractMode::Trailing => parse_trailing(line, format),
        };

        let outcome = parsed.and_then(|digits| {
            Draw::new(format, digits)
                .and_then(|draw| history.push(draw))
                .map_err(|_| RejectReason::WrongLength)
        });

        if let Err(reason) = outcome {
            tracing::warn!(line = i + 1, content = line, %reason, "ligne ignorée");
            rejected.push(RejectedLine {
                line_no: i + 1,
                content: line.to_string(),
                reason,
            });
        }
    }

    ParseReport { history, rejected }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(report: &ParseReport) -> Vec<String> {
        report.history.draws().iter().map(|d| d.encode()).collect()
    }

    #[test]
    fn test_exact_four() {
        let text = "9767\n\n 5319 \nabcd\n123\n1961\n";
        let report = parse_history(text, DrawFormat::Four, ExtractMode::Exact);
        assert_eq!(tokens(&report), vec!["9767", "5319", "1961"]);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].line_no, 4);
        assert_eq!(report.rejected[0].reason, RejectReason::NotDigits);
        assert_eq!(report.rejected[1].reason, RejectReason::WrongLength);
    }

    #[test]
    fn test_exact_top_bottom_separators() {
        let text = "123, 45\n678 90\n111,22\n12345\n1234, 5\n";
        let report = parse_history(text, DrawFormat::TopBottom, ExtractMode::Exact);
        assert_eq!(tokens(&report), vec!["12345", "67890", "11122"]);
        assert_eq!(report.rejected[0].reason, RejectReason::BadSeparator);
        assert_eq!(report.rejected[1].reason, RejectReason::WrongLength);
    }

    #[test]
    fn test_trailing_mode() {
        let text = "งวด 16/03/2567 : 9767\nprize 5319\n12\n";
        let report = parse_history(text, DrawFormat::Four, ExtractMode::Trailing);
        assert_eq!(tokens(&report), vec!["9767", "5319"]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].reason, RejectReason::TooFewDigits);
    }

    #[test]
    fn test_trailing_top_bottom_splits_three_two() {
        let report = parse_history(
            "draw 42: 583 29\n58329\n",
            DrawFormat::TopBottom,
            ExtractMode::Trailing,
        );
        assert_eq!(report.accepted(), 1);
        assert_eq!(report.history.draws()[0].to_string(), "583 29");
        assert_eq!(report.rejected[0].reason, RejectReason::TooFewDigits);
    }

    #[test]
    fn test_trailing_does_not_stitch_digit_runs() {
        let text = "16/03 : 567\n1 2 3 4\nréf 97671\n";
        let report = parse_history(text, DrawFormat::Four, ExtractMode::Trailing);
        assert_eq!(report.accepted(), 0);
        let reasons: Vec<RejectReason> = report.rejected.iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![
                RejectReason::TooFewDigits,
                RejectReason::TooFewDigits,
                RejectReason::WrongLength
            ]
        );
    }

    #[test]
    fn test_two_two_patterns() {
        let text = "12 34\n56,78\n1234\n123 4\n";
        let report = parse_history(text, DrawFormat::TwoTwo, ExtractMode::Exact);
        assert_eq!(tokens(&report), vec!["1234", "5678"]);
        assert_eq!(report.rejected[0].reason, RejectReason::BadSeparator);
        assert_eq!(report.rejected[1].reason, RejectReason::WrongLength);

        let report = parse_history("tirage 7 : 90 12", DrawFormat::TwoTwo, ExtractMode::Trailing);
        assert_eq!(report.history.draws()[0].to_string(), "90 12");
    }
}
