//! Structural validators for the three extracted fields.

use regex::Regex;

use crate::config::Settings;

/// Cyrillic letters permitted on Russian registration plates.
pub const PLATE_LETTERS: &str = "АВЕКМНОРСТУХ";

/// ISO 3779 VIN length.
pub const VIN_LENGTH: usize = 17;

/// Compiled field patterns, built once per parser.
#[derive(Debug, Clone)]
pub struct FieldPatterns {
    plate: Regex,
}

impl FieldPatterns {
    pub fn new() -> Result<Self, regex::Error> {
        // letter, three digits, two letters, two or three region digits
        let plate = format!(
            "[{letters}][0-9]{{3}}[{letters}]{{2}}[0-9]{{2,3}}",
            letters = PLATE_LETTERS
        );
        Ok(Self {
            plate: Regex::new(&plate)?,
        })
    }

    /// First substring of `text` matching the plate grammar, whitespace removed.
    pub fn find_plate(&self, text: &str) -> Option<String> {
        self.plate
            .find(text)
            .map(|m| m.as_str().chars().filter(|c| !c.is_whitespace()).collect())
    }

    /// True iff the whole of `candidate` is a plate.
    pub fn is_valid_plate(&self, candidate: &str) -> bool {
        self.plate
            .find(candidate)
            .is_some_and(|m| m.start() == 0 && m.end() == candidate.len())
    }
}

/// Bounds for the line-based plate fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlateLineBounds {
    pub min_len: usize,
    pub max_len: usize,
    pub min_letters: usize,
    pub max_letters: usize,
    pub min_digits: usize,
    pub max_digits: usize,
}

impl PlateLineBounds {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            min_len: settings.min_reg_number_length,
            max_len: settings.max_reg_number_length,
            min_letters: settings.min_reg_number_letters,
            max_letters: settings.max_reg_number_letters,
            min_digits: settings.min_reg_number_digits,
            max_digits: settings.max_reg_number_digits,
        }
    }

    fn accepts(&self, cleaned: &str) -> bool {
        let len = cleaned.chars().count();
        let digits = cleaned.chars().filter(|c| c.is_ascii_digit()).count();
        let letters = len - digits;

        (self.min_len..=self.max_len).contains(&len)
            && letters > 0
            && digits > 0
            && (self.min_letters..=self.max_letters).contains(&letters)
            && (self.min_digits..=self.max_digits).contains(&digits)
    }
}

fn is_upper_cyrillic(c: char) -> bool {
    ('А'..='Я').contains(&c)
}

/// Line-by-line plate fallback: strip everything but upper-case Cyrillic and
/// digits, then accept the first line whose shape fits `bounds`.
pub fn plate_from_lines(text: &str, bounds: &PlateLineBounds) -> Option<String> {
    text.split('\n')
        .map(|line| {
            line.chars()
                .filter(|&c| is_upper_cyrillic(c) || c.is_ascii_digit())
                .collect::<String>()
        })
        .find(|cleaned| bounds.accepts(cleaned))
}

/// True for Latin A-Z without I, O, Q, and for 0-9.
pub fn is_vin_char(c: char) -> bool {
    c.is_ascii_digit() || (c.is_ascii_uppercase() && !matches!(c, 'I' | 'O' | 'Q'))
}

/// True iff `candidate` is exactly [`VIN_LENGTH`] VIN-alphabet characters.
pub fn is_valid_vin(candidate: &str) -> bool {
    candidate.len() == VIN_LENGTH && candidate.chars().all(is_vin_char)
}

/// Upper-cases OCR text and drops every character outside the VIN alphabet.
pub fn clean_vin_text(text: &str) -> String {
    text.to_uppercase().chars().filter(|&c| is_vin_char(c)).collect()
}

/// Every `len`-character window of already-cleaned text, left to right.
pub fn vin_windows(cleaned: &str, len: usize) -> Vec<String> {
    // cleaned text is ASCII, so byte offsets are character offsets
    if len == 0 || cleaned.len() < len {
        return Vec::new();
    }
    (0..=cleaned.len() - len)
        .map(|i| cleaned[i..i + len].to_string())
        .collect()
}

/// Cleans raw OCR text and returns its VIN-shaped windows.
pub fn vin_candidates(raw: &str, len: usize) -> Vec<String> {
    vin_windows(&clean_vin_text(raw), len)
}
