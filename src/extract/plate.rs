use image::DynamicImage;
use tracing::{debug, info};

use super::glyphs::{Alphabet, normalize};
use super::patterns::{FieldPatterns, PlateLineBounds, plate_from_lines};
use super::{OcrOutcome, read_text};
use crate::config::Settings;
use crate::imaging::{enhance_contrast, extract_window, upscale_if_needed};
use crate::ocr::{OcrEngine, PageSegMode};

/// Extracts the registration plate with a single OCR pass.
///
/// The plate band is upscaled only when the whole page is below the minimum
/// height, enhanced with the default contrast preset, read once at the default
/// PSM, folded to Cyrillic and matched against the plate grammar with a
/// line-shape fallback.
pub fn extract_reg_number(
    engine: &dyn OcrEngine,
    image: &DynamicImage,
    settings: &Settings,
    patterns: &FieldPatterns,
) -> Option<String> {
    let region = extract_window(image, settings.reg_number_region);
    let region = if image.height() < settings.min_image_height {
        upscale_if_needed(&region, settings.min_image_height, settings.upscale_method).into_owned()
    } else {
        region
    };

    let processed = enhance_contrast(&region, settings.default_contrast());
    let OcrOutcome::Text(text) = read_text(
        engine,
        &processed,
        &settings.ocr_lang,
        PageSegMode(settings.ocr_psm),
    ) else {
        return None;
    };

    let found = plate_from_text(&text, settings, patterns);
    info!("Plate: {:?}", found);
    found
}

/// Plate lookup on raw OCR text.
pub fn plate_from_text(text: &str, settings: &Settings, patterns: &FieldPatterns) -> Option<String> {
    let normalized = normalize(&text.to_uppercase(), Alphabet::Plate);

    if let Some(plate) = patterns.find_plate(&normalized) {
        return Some(plate);
    }

    debug!("No plate grammar match, trying line fallback");
    plate_from_lines(&normalized, &PlateLineBounds::from_settings(settings))
}
