use image::DynamicImage;
use tracing::{debug, info};

use super::consensus::{first_max_by_key, vin_score};
use super::patterns::vin_candidates;
use super::read_text;
use crate::config::Settings;
use crate::imaging::{enhance_contrast, extract_window, upscale_if_needed};
use crate::ocr::{OcrEngine, PageSegMode};

/// Extracts the VIN from a handful of OCR passes over one enhanced band.
///
/// The VIN band is always brought up to the minimum height, enhanced once and
/// read at every configured PSM. All 17-character windows from every pass are
/// ranked by [`vin_score`]; the earliest of the best wins.
pub fn extract_vin(engine: &dyn OcrEngine, image: &DynamicImage, settings: &Settings) -> Option<String> {
    let region = extract_window(image, settings.vin_region);
    let region = upscale_if_needed(&region, settings.min_image_height, settings.upscale_method);
    let processed = enhance_contrast(&region, settings.default_contrast());

    let texts: Vec<String> = settings
        .vin_psm_modes
        .iter()
        .filter_map(|&psm| {
            read_text(engine, &processed, &settings.ocr_lang, PageSegMode(psm))
                .text()
                .map(str::to_string)
        })
        .collect();

    let vin = select_vin(texts.iter().map(String::as_str), settings.vin_length)
        .map(|vin| apply_wmi_correction(vin, settings.correct_vin_wmi));
    info!("VIN: {:?}", vin);
    vin
}

/// Best-scoring VIN window across several raw OCR texts.
pub fn select_vin<'a>(texts: impl IntoIterator<Item = &'a str>, len: usize) -> Option<String> {
    let candidates: Vec<String> = texts
        .into_iter()
        .flat_map(|text| vin_candidates(text, len))
        .collect();
    debug!("{} VIN candidates", candidates.len());

    first_max_by_key(candidates, |c| vin_score(c))
}

/// OCR often reads a leading W as N; "NP" is not a manufacturer prefix, "WP" is.
fn apply_wmi_correction(vin: String, enabled: bool) -> String {
    if enabled && vin.starts_with("NP") {
        format!("W{}", &vin[1..])
    } else {
        vin
    }
}
