//! Extraction of a relevance score in [0, 1] from free-form model output.
//!
//! Models are asked for a bare number, but replies range from `0.7` to
//! `"After weighing the abstract, the relevance score is 0.82."` to
//! `Score: 95/100`. The extractor is a pure function of its input:
//!
//! 1. Every number in the text is a candidate. A candidate may carry a
//!    denominator (`7/10`, `8 out of 10`) or a percent sign. Both ends of a
//!    range such as `(0-1)` or `0 to 1` are dropped, they restate the scale.
//! 2. Among candidates with a label (`score`, `relevance`, `rating`, ...)
//!    in the text just before them, the one nearest its label wins;
//!    otherwise the first candidate.
//! 3. The value is scaled into [0, 1]. Values slightly outside the range are
//!    clamped, anything else is rejected.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Characters before a number searched for a label
pub const DEFAULT_LOOKBACK: usize = 24;

/// Distance outside [0, 1] that is clamped instead of rejected
pub const CLAMP_TOLERANCE: f64 = 0.05;

const LABELS: &[&str] = &["score", "relevance", "relevant", "rating", "rate", "answer", "result"];

/// 7-point semantic differential phrases, longest first so that
/// "very slightly relevant" is not read as "slightly relevant"
const VERBAL_SCALE: &[(&str, u8)] = &[
    ("very slightly relevant", 2),
    ("not at all relevant", 1),
    ("moderately relevant", 5),
    ("extremely relevant", 7),
    ("not very relevant", 2),
    ("somewhat relevant", 4),
    ("slightly relevant", 3),
    ("very relevant", 6),
    ("not relevant", 1),
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseFailure {
    #[error("response is empty")]
    Empty,

    #[error("no numeric score found in response")]
    NoNumber,

    #[error("score {0} is outside the accepted range")]
    OutOfRange(f64),

    #[error("score has a zero denominator")]
    ZeroDenominator,
}

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\d+(?:\.\d+)?\s*(?:-|\x{2013}|\bto\b)\s*\d+(?:\.\d+)?")
            .expect("range pattern is valid")
    })
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(?P<num>-?(?:\d+(?:\.\d+)?|\.\d+))(?:\s*(?:/|out\s+of)\s*(?P<den>\d+(?:\.\d+)?)|\s*(?P<pct>%))?",
        )
        .expect("score pattern is valid")
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scale {
    Bare,
    Fraction(f64),
    Percent,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    value: f64,
    scale: Scale,
    /// Characters between the nearest label and the number
    label_distance: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ScoreExtractor {
    normalize_scale: bool,
    verbal_scale: bool,
    lookback: usize,
}

impl Default for ScoreExtractor {
    fn default() -> Self {
        Self {
            normalize_scale: true,
            verbal_scale: false,
            lookback: DEFAULT_LOOKBACK,
        }
    }
}

impl ScoreExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `95/100`, `80%` and bare 0-100 values by rescaling them.
    /// When disabled only values already in [0, 1] are accepted.
    pub fn with_normalize_scale(mut self, enabled: bool) -> Self {
        self.normalize_scale = enabled;
        self
    }

    /// Fall back to phrases like "very relevant" when no number is present
    pub fn with_verbal_scale(mut self, enabled: bool) -> Self {
        self.verbal_scale = enabled;
        self
    }

    pub fn with_lookback(mut self, chars: usize) -> Self {
        self.lookback = chars;
        self
    }

    pub fn extract(&self, text: &str) -> Result<f64, ParseFailure> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseFailure::Empty);
        }

        let candidates = self.candidates(text);
        let chosen = candidates
            .iter()
            .filter_map(|c| c.label_distance.map(|d| (d, c)))
            .min_by_key(|(d, _)| *d)
            .map(|(_, c)| c)
            .or_else(|| candidates.first());

        match chosen {
            Some(candidate) => self.normalize(candidate),
            None if self.verbal_scale => verbal_score(text).ok_or(ParseFailure::NoNumber),
            None => Err(ParseFailure::NoNumber),
        }
    }

    fn candidates(&self, text: &str) -> Vec<Candidate> {
        let mut found = Vec::new();
        let ranges: Vec<_> = range_pattern().find_iter(text).map(|m| m.range()).collect();

        for caps in number_pattern().captures_iter(text) {
            let Some(num) = caps.name("num") else { continue };
            let whole = caps.get(0).map_or(num.range(), |m| m.range());
            if ranges.iter().any(|r| r.contains(&num.start())) {
                continue;
            }

            let before = text[..num.start()].chars().next_back();
            let after = text[whole.end..].chars().next();
            // Digits glued to words ("gpt-4", "COVID19", "3rd") are not scores
            if before.is_some_and(|c| c.is_alphabetic() || c == '_')
                || after.is_some_and(|c| c.is_alphabetic())
            {
                continue;
            }

            let mut literal = num.as_str();
            if literal.starts_with('-') && before.is_some_and(|c| c.is_alphanumeric()) {
                literal = &literal[1..];
            }
            let Ok(value) = literal.parse::<f64>() else { continue };

            let scale = if let Some(den) = caps.name("den") {
                match den.as_str().parse::<f64>() {
                    Ok(d) => Scale::Fraction(d),
                    Err(_) => continue,
                }
            } else if caps.name("pct").is_some() {
                Scale::Percent
            } else {
                Scale::Bare
            };

            found.push(Candidate {
                value,
                scale,
                label_distance: self.label_distance(text, num.start()),
            });
        }

        found
    }

    fn label_distance(&self, text: &str, end: usize) -> Option<usize> {
        let prefix = &text[..end];
        let start = prefix
            .char_indices()
            .rev()
            .nth(self.lookback.saturating_sub(1))
            .map_or(0, |(idx, _)| idx);
        let window = prefix[start..].to_lowercase();
        LABELS
            .iter()
            .filter_map(|label| window.rfind(label).map(|pos| window[pos + label.len()..].chars().count()))
            .min()
    }

    fn normalize(&self, candidate: &Candidate) -> Result<f64, ParseFailure> {
        let value = candidate.value;
        let scaled = match candidate.scale {
            Scale::Fraction(den) if den == 0.0 => return Err(ParseFailure::ZeroDenominator),
            Scale::Fraction(den) if self.normalize_scale => value / den,
            Scale::Percent if self.normalize_scale => value / 100.0,
            Scale::Fraction(_) | Scale::Percent => return Err(ParseFailure::OutOfRange(value)),
            Scale::Bare if value > 1.0 + CLAMP_TOLERANCE && value <= 100.0 && self.normalize_scale => {
                value / 100.0
            }
            Scale::Bare => value,
        };
        clamp_with_tolerance(scaled)
    }
}

fn clamp_with_tolerance(value: f64) -> Result<f64, ParseFailure> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else if (-CLAMP_TOLERANCE..0.0).contains(&value) {
        Ok(0.0)
    } else if value > 1.0 && value <= 1.0 + CLAMP_TOLERANCE {
        Ok(1.0)
    } else {
        Err(ParseFailure::OutOfRange(value))
    }
}

fn verbal_score(text: &str) -> Option<f64> {
    let lower = text.to_lowercase();
    VERBAL_SCALE
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(_, point)| f64::from(point - 1) / 6.0)
}

/// Extract with the default policy
pub fn extract_score(text: &str) -> Result<f64, ParseFailure> {
    ScoreExtractor::default().extract(text)
}
