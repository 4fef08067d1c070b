//! Heart rate readings and training zones.

use core::fmt;
use std::borrow::Cow;
use std::str::FromStr;

/// A single heart rate reading, in beats per minute.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    bpm: f64,
}

impl Reading {
    /// Create a reading from a heart rate.
    ///
    /// `NaN` is rejected: every reading must fall in exactly one zone, and
    /// `NaN` compares neither below 100 nor at or above 170.
    pub fn new(bpm: f64) -> Result<Self, ParseError> {
        if bpm.is_nan() {
            return Err(ParseError::NotANumber);
        }

        Ok(Reading { bpm })
    }

    /// Parse a reading from a raw message payload.
    ///
    /// The payload must be UTF-8 text holding a single floating-point
    /// number. Surrounding whitespace is ignored, and single underscores
    /// between digits are accepted as separators (`1_000`).
    pub fn from_payload(payload: &[u8]) -> Result<Self, ParseError> {
        std::str::from_utf8(payload)?.parse()
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn zone(&self) -> Zone {
        Zone::classify(self.bpm)
    }
}

impl FromStr for Reading {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bpm = strip_digit_separators(trimmed)
            .parse::<f64>()
            .map_err(|source| ParseError::InvalidNumber {
                payload: trimmed.to_string(),
                source,
            })?;

        Reading::new(bpm)
    }
}

/// Remove underscores that sit between two ASCII digits.
///
/// Any other underscore is kept so the number fails to parse.
fn strip_digit_separators(s: &str) -> Cow<'_, str> {
    if !s.contains('_') {
        return Cow::Borrowed(s);
    }

    let bytes = s.as_bytes();
    let is_separator = |i: usize| {
        bytes[i] == b'_'
            && i > 0
            && i + 1 < bytes.len()
            && bytes[i - 1].is_ascii_digit()
            && bytes[i + 1].is_ascii_digit()
    };

    let stripped = s
        .char_indices()
        .filter(|&(i, _)| !is_separator(i))
        .map(|(_, c)| c)
        .collect();

    Cow::Owned(stripped)
}

/// The training zone of a heart rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Zone {
    /// Below 100 BPM.
    WarmUp,
    /// From 100 up to 140 BPM.
    FatBurning,
    /// From 140 up to 170 BPM.
    Cardiovascular,
    /// 170 BPM and above.
    Anaerobic,
}

impl Zone {
    pub const FAT_BURNING_FROM: f64 = 100.0;
    pub const CARDIOVASCULAR_FROM: f64 = 140.0;
    pub const ANAEROBIC_FROM: f64 = 170.0;

    /// Classify a heart rate into its zone.
    ///
    /// Every zone is a half-open interval `[lower, upper)`.
    pub fn classify(bpm: f64) -> Zone {
        if bpm < Self::FAT_BURNING_FROM {
            Zone::WarmUp
        } else if bpm < Self::CARDIOVASCULAR_FROM {
            Zone::FatBurning
        } else if bpm < Self::ANAEROBIC_FROM {
            Zone::Cardiovascular
        } else {
            Zone::Anaerobic
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Zone::WarmUp => "Warm-up",
            Zone::FatBurning => "Fat-burning",
            Zone::Cardiovascular => "Cardiovascular",
            Zone::Anaerobic => "Anaerobic",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("payload {payload:?} is not a number: {source}")]
    InvalidNumber {
        payload: String,
        source: std::num::ParseFloatError,
    },

    #[error("payload is NaN")]
    NotANumber,
}
