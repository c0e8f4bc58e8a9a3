use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const DIGITS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DrawFormat {
    /// Quatre chiffres (ex: 9767)
    Four,
    /// Trois chiffres du haut + deux chiffres du bas (ex: 123, 45)
    TopBottom,
    /// Deux paires de chiffres (ex: 12 34)
    TwoTwo,
}

impl DrawFormat {
    pub fn digit_count(&self) -> usize {
        match self {
            DrawFormat::Four => 4,
            DrawFormat::TopBottom => 5,
            DrawFormat::TwoTwo => 4,
        }
    }

    /// Longueurs des segments contigus d'un tirage.
    pub fn segments(&self) -> &'static [usize] {
        match self {
            DrawFormat::Four => &[4],
            DrawFormat::TopBottom => &[3, 2],
            DrawFormat::TwoTwo => &[2, 2],
        }
    }

    pub fn max_candidate_len(&self) -> usize {
        self.segments().iter().copied().max().unwrap_or(0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DrawFormat::Four => "four",
            DrawFormat::TopBottom => "top-bottom",
            DrawFormat::TwoTwo => "two-two",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "four" => Some(DrawFormat::Four),
            "top-bottom" => Some(DrawFormat::TopBottom),
            "two-two" => Some(DrawFormat::TwoTwo),
            _ => None,
        }
    }
}

impl std::fmt::Display for DrawFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    format: DrawFormat,
    digits: Vec<u8>,
}

impl Draw {
    pub fn new(format: DrawFormat, digits: Vec<u8>) -> Result<Self> {
        validate_digits(format, &digits)?;
        Ok(Self { format, digits })
    }

    /// Construit un tirage depuis sa forme compacte ("9767", "12345").
    pub fn from_token(token: &str, format: DrawFormat) -> Result<Self> {
        let mut digits = Vec::with_capacity(token.len());
        for c in token.chars() {
            match c.to_digit(10) {
                Some(d) => digits.push(d as u8),
                _ => bail!("Caractère non numérique '{}' dans '{}'", c, token),
            }
        }
        Self::new(format, digits)
    }

    pub fn format(&self) -> DrawFormat {
        self.format
    }

    pub fn digits(&self) -> &[u8] {
        &self.digits
    }

    pub fn segments(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let mut offset = 0;
        self.format.segments().iter().map(move |&len| {
            let seg = &self.digits[offset..offset + len];
            offset += len;
            seg
        })
    }

    pub fn contains(&self, digit: u8) -> bool {
        self.digits.contains(&digit)
    }

    pub fn encode(&self) -> String {
        self.digits.iter().map(|d| char::from(b'0' + d)).collect()
    }
}

impl std::fmt::Display for Draw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .segments()
            .map(|seg| seg.iter().map(|d| char::from(b'0' + d)).collect())
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

pub fn validate_digits(format: DrawFormat, digits: &[u8]) -> Result<()> {
    if digits.len() != format.digit_count() {
        bail!(
            "Tirage de {} chiffres attendu pour le format {}, reçu {}",
            format.digit_count(),
            format,
            digits.len()
        );
    }
    if let Some(&d) = digits.iter().find(|&&d| d > 9) {
        bail!("Chiffre {} hors limites (0-9)", d);
    }
    Ok(())
}

/// Historique des tirages, du plus ancien au plus récent. Ajout uniquement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    format: DrawFormat,
    draws: Vec<Draw>,
}

impl History {
    pub fn new(format: DrawFormat) -> Self {
        Self {
            format,
            draws: Vec::new(),
        }
    }

    pub fn push(&mut self, draw: Draw) -> Result<()> {
        if draw.format() != self.format {
            bail!(
                "Format {} incompatible avec l'historique ({})",
                draw.format(),
                self.format
            );
        }
        self.draws.push(draw);
        Ok(())
    }

    pub fn format(&self) -> DrawFormat {
        self.format
    }

    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn latest(&self) -> Option<&Draw> {
        self.draws.last()
    }

    /// Les `n` derniers tirages (ou tout l'historique s'il est plus court).
    pub fn window(&self, n: usize) -> &[Draw] {
        let start = self.draws.len().saturating_sub(n);
        &self.draws[start..]
    }
}

#[derive(Debug, Clone)]
pub struct DigitStats {
    pub digit: u8,
    pub frequency: u32,
    pub gap: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitTag {
    Hot,
    Cold,
    Missing,
    Normal,
}

impl std::fmt::Display for DigitTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DigitTag::Hot => write!(f, "HOT"),
            DigitTag::Cold => write!(f, "COLD"),
            DigitTag::Missing => write!(f, "ABSENT"),
            DigitTag::Normal => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    Single,
    Pair,
    Triple,
    Quad,
}

impl CandidateKind {
    pub const ALL: [CandidateKind; 4] = [
        CandidateKind::Single,
        CandidateKind::Pair,
        CandidateKind::Triple,
        CandidateKind::Quad,
    ];

    pub fn width(&self) -> usize {
        match self {
            CandidateKind::Single => 1,
            CandidateKind::Pair => 2,
            CandidateKind::Triple => 3,
            CandidateKind::Quad => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CandidateKind::Single => "Chiffre seul",
            CandidateKind::Pair => "Deux chiffres",
            CandidateKind::Triple => "Trois chiffres",
            CandidateKind::Quad => "Quatre chiffres",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub value: String,
    pub score: f64,
    /// Index (dans la fenêtre) du tirage le plus récent contenant le candidat.
    pub last_seen: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four(token: &str) -> Draw {
        Draw::from_token(token, DrawFormat::Four).unwrap()
    }

    #[test]
    fn test_from_token_ok() {
        let draw = four("9767");
        assert_eq!(draw.digits(), &[9, 7, 6, 7]);
        assert_eq!(draw.encode(), "9767");
        assert_eq!(draw.to_string(), "9767");
    }

    #[test]
    fn test_from_token_rejects_letters() {
        assert!(Draw::from_token("97a7", DrawFormat::Four).is_err());
        assert!(Draw::from_token("９７６７", DrawFormat::Four).is_err());
    }

    #[test]
    fn test_from_token_wrong_length() {
        assert!(Draw::from_token("976", DrawFormat::Four).is_err());
        assert!(Draw::from_token("9767", DrawFormat::TopBottom).is_err());
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(Draw::new(DrawFormat::Four, vec![1, 2, 3, 10]).is_err());
    }

    #[test]
    fn test_top_bottom_segments() {
        let draw = Draw::from_token("12345", DrawFormat::TopBottom).unwrap();
        let segs: Vec<&[u8]> = draw.segments().collect();
        assert_eq!(segs, vec![&[1u8, 2, 3][..], &[4u8, 5][..]]);
        assert_eq!(draw.to_string(), "123 45");
        assert_eq!(draw.encode(), "12345");
    }

    #[test]
    fn test_format_names() {
        for format in [DrawFormat::Four, DrawFormat::TopBottom, DrawFormat::TwoTwo] {
            assert_eq!(DrawFormat::from_name(format.as_str()), Some(format));
        }
        assert_eq!(DrawFormat::from_name("five"), None);
        assert_eq!(DrawFormat::TopBottom.max_candidate_len(), 3);
        assert_eq!(DrawFormat::TwoTwo.max_candidate_len(), 2);
    }

    #[test]
    fn test_two_two_segments() {
        let draw = Draw::from_token("1234", DrawFormat::TwoTwo).unwrap();
        let segs: Vec<&[u8]> = draw.segments().collect();
        assert_eq!(segs, vec![&[1u8, 2][..], &[3u8, 4][..]]);
        assert_eq!(draw.to_string(), "12 34");
        assert_ne!(draw, Draw::from_token("1234", DrawFormat::Four).unwrap());
    }

    #[test]
    fn test_history_window() {
        let mut history = History::new(DrawFormat::Four);
        for token in ["9767", "5319", "1961", "4765", "2633"] {
            history.push(four(token)).unwrap();
        }
        assert_eq!(history.len(), 5);
        let window = history.window(2);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].encode(), "4765");
        assert_eq!(window[1].encode(), "2633");
        assert_eq!(history.window(50).len(), 5);
        assert_eq!(history.latest().unwrap().encode(), "2633");
    }

    #[test]
    fn test_history_rejects_other_format() {
        let mut history = History::new(DrawFormat::Four);
        let draw = Draw::from_token("12345", DrawFormat::TopBottom).unwrap();
        assert!(history.push(draw).is_err());
        assert!(history.is_empty());
    }

    #[test]
    fn test_candidate_kind_width() {
        let lens: Vec<usize> = CandidateKind::ALL.iter().map(|k| k.width()).collect();
        assert_eq!(lens, vec![1, 2, 3, 4]);
    }
}
