//! Field extraction: plate, VIN and body number.
//!
//! Each extractor is independent. OCR failures inside an extractor are
//! absorbed as [`OcrOutcome::Absent`] and never surface as errors; an
//! extractor either finds a value or reports `None`.

pub mod body;
pub mod consensus;
pub mod glyphs;
pub mod patterns;
pub mod plate;
pub mod vin;

pub use body::{EnhancementVariant, enumerate_variants, extract_body_number};
pub use consensus::{Tally, consensus_score, structural_score, vin_score};
pub use glyphs::{Alphabet, normalize};
pub use patterns::{FieldPatterns, PlateLineBounds, is_valid_vin, vin_candidates};
pub use plate::extract_reg_number;
pub use vin::extract_vin;

use image::GrayImage;
use tracing::debug;

use crate::ocr::{OcrEngine, OcrError, PageSegMode};

/// Result of one OCR call as seen by the candidate collectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrOutcome {
    Text(String),
    Absent,
}

impl OcrOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            OcrOutcome::Text(text) => Some(text),
            OcrOutcome::Absent => None,
        }
    }
}

impl From<Result<String, OcrError>> for OcrOutcome {
    fn from(result: Result<String, OcrError>) -> Self {
        match result {
            Ok(text) => OcrOutcome::Text(text),
            Err(e) => {
                debug!("OCR pass dropped: {}", e);
                OcrOutcome::Absent
            }
        }
    }
}

/// Runs one OCR pass, folding any failure into [`OcrOutcome::Absent`].
pub fn read_text(
    engine: &dyn OcrEngine,
    image: &GrayImage,
    lang: &str,
    psm: PageSegMode,
) -> OcrOutcome {
    if image.width() == 0 || image.height() == 0 {
        debug!("Skipping OCR on empty image (psm {})", psm);
        return OcrOutcome::Absent;
    }
    engine.recognize(image, lang, psm).into()
}
