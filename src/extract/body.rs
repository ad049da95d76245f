//! Body-number extraction by ensemble vote.
//!
//! A single OCR pass over the body-number band is unreliable, so the band is
//! read under every combination of contrast preset, scale factor and page
//! segmentation mode (36 variants with the default settings). Every VIN-shaped
//! window from every variant is a vote; the candidate that survives the most
//! perturbations wins, with the VIN structural heuristic as a minor term.

use image::DynamicImage;
use rayon::prelude::*;
use tracing::{debug, info};

use super::consensus::Tally;
use super::patterns::vin_candidates;
use super::read_text;
use crate::config::{ContrastPreset, Settings, UpscaleMethod};
use crate::imaging::{clahe, extract_window, rescale, to_luminance};
use crate::ocr::{OcrEngine, PageSegMode};

/// One point of the sampling grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnhancementVariant {
    pub preset: ContrastPreset,
    pub scale: f64,
    pub psm: PageSegMode,
}

/// Cartesian product presets x scales x PSMs, preset-major.
///
/// Regions at least `body_tall_region_min_height` rows tall use the tall scale
/// set, smaller ones the (larger) small-region set.
pub fn enumerate_variants(settings: &Settings, region_height: u32) -> Vec<EnhancementVariant> {
    let scales = if region_height >= settings.body_tall_region_min_height {
        &settings.body_scale_factors_tall
    } else {
        &settings.body_scale_factors_small
    };

    settings
        .contrast_presets
        .iter()
        .flat_map(|&preset| {
            scales.iter().flat_map(move |&scale| {
                settings.body_psm_modes.iter().map(move |&psm| EnhancementVariant {
                    preset,
                    scale,
                    psm: PageSegMode(psm),
                })
            })
        })
        .collect()
}

/// Reads one variant and returns its VIN-shaped windows.
/// A failed OCR call contributes nothing.
pub fn run_variant(
    engine: &dyn OcrEngine,
    region: &DynamicImage,
    variant: &EnhancementVariant,
    settings: &Settings,
) -> Vec<String> {
    let scaled = rescale(region, variant.scale, UpscaleMethod::Cubic);
    let gray = to_luminance(&scaled);
    let enhanced = clahe(&gray, variant.preset.clip_limit, variant.preset.tile_grid);

    match read_text(engine, &enhanced, &settings.ocr_lang, variant.psm).text() {
        Some(text) => vin_candidates(text, settings.vin_length),
        None => Vec::new(),
    }
}

/// Merges per-variant candidate lists in variant order and picks the winner.
pub fn vote(per_variant: impl IntoIterator<Item = Vec<String>>) -> Option<String> {
    let mut tally = Tally::new();
    for candidates in per_variant {
        tally.merge(candidates.into_iter().collect());
    }

    debug!("{} votes for {} distinct candidates", tally.total(), tally.len());
    tally.winner().map(|(candidate, score)| {
        debug!("Winner {} (score {}, {} votes)", candidate, score, tally.count(candidate));
        candidate.to_string()
    })
}

/// Extracts the body number by sweeping every enhancement variant.
pub fn extract_body_number(
    engine: &dyn OcrEngine,
    image: &DynamicImage,
    settings: &Settings,
) -> Option<String> {
    let region = extract_window(image, settings.body_number_region);
    if region.height() == 0 {
        debug!("Empty body-number region");
        return None;
    }

    let variants = enumerate_variants(settings, region.height());
    debug!(
        "Body-number sweep: {} variants over {}x{} region",
        variants.len(),
        region.width(),
        region.height()
    );

    // collect() keeps variant order, so the vote is identical to a sequential run
    let per_variant: Vec<Vec<String>> = if settings.parallel_variants {
        variants
            .par_iter()
            .map(|variant| run_variant(engine, &region, variant, settings))
            .collect()
    } else {
        variants
            .iter()
            .map(|variant| run_variant(engine, &region, variant, settings))
            .collect()
    };

    let body = vote(per_variant);
    info!("Body number: {:?}", body);
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CONTRAST_PRESETS;
    use crate::ocr::OcrError;
    use crate::ocr::testing::ScriptedEngine;
    use image::{GrayImage, Luma};

    const TRUE_VIN: &str = "WP1ZZZ9PZ9LA42290";
    const MISREAD: &str = "WP1ZZZ9PZ9LA42298";

    fn page(height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(40, height, |x, y| {
            Luma([((x * 5 + y * 3) % 256) as u8])
        }))
    }

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_variant_space() {
        let settings = Settings::default();

        let tall = enumerate_variants(&settings, 250);
        assert_eq!(tall.len(), 36);
        assert_eq!(tall[0].preset, DEFAULT_CONTRAST_PRESETS[0]);
        assert_eq!(tall[0].scale, 1.0);
        assert_eq!(tall[0].psm, PageSegMode::AUTO);
        assert_eq!(tall[1].psm, PageSegMode::SINGLE_BLOCK);
        assert_eq!(tall[2].psm, PageSegMode::SPARSE_TEXT);
        assert_eq!(tall[3].scale, 1.5);
        assert_eq!(tall[35].preset, DEFAULT_CONTRAST_PRESETS[3]);
        assert_eq!(tall[35].scale, 2.0);

        let small = enumerate_variants(&settings, 199);
        assert_eq!(small.len(), 36);
        assert_eq!(small[0].scale, 2.0);
        assert_eq!(small[35].scale, 3.0);
    }

    #[test]
    fn test_vote_frequency_wins() {
        let per_variant = vec![
            words(&[MISREAD]),
            words(&[TRUE_VIN]),
            words(&[TRUE_VIN, MISREAD]),
            words(&[TRUE_VIN]),
        ];
        assert_eq!(vote(per_variant).as_deref(), Some(TRUE_VIN));
    }

    #[test]
    fn test_vote_empty() {
        assert_eq!(vote(vec![Vec::new(), Vec::new()]), None);
        assert_eq!(vote(Vec::<Vec<String>>::new()), None);
    }

    #[test]
    fn test_failing_variant_does_not_change_winner() {
        let healthy = vec![
            words(&[TRUE_VIN]),
            words(&[MISREAD]),
            words(&[TRUE_VIN]),
            words(&[MISREAD, TRUE_VIN]),
        ];
        let baseline = vote(healthy.clone());

        // a failed variant contributes an empty list
        let mut with_failure = healthy;
        with_failure.insert(2, Vec::new());
        assert_eq!(vote(with_failure), baseline);
    }

    #[test]
    fn test_sweep_survives_failures() {
        // first call fails, every other variant reads the VIN
        let engine = ScriptedEngine::new(|_, _, call| {
            if call == 0 {
                Err(OcrError::Timeout(std::time::Duration::from_secs(30)))
            } else {
                Ok(format!("Кузов {}", TRUE_VIN))
            }
        });
        let settings = Settings {
            parallel_variants: false,
            ..Settings::default()
        };

        let body = extract_body_number(&engine, &page(1000), &settings);
        assert_eq!(body.as_deref(), Some(TRUE_VIN));
        assert_eq!(engine.calls(), 36);
    }

    #[test]
    fn test_parallel_sweep_matches_sequential() {
        // answers depend only on the variant, not on call order
        let script = |img: &GrayImage, psm: PageSegMode, _: usize| -> Result<String, OcrError> {
            match (psm, img.width() % 3) {
                (PageSegMode::SPARSE_TEXT, _) => Err(OcrError::EmptyImage),
                (_, 0) => Ok(MISREAD.to_string()),
                _ => Ok(format!("{} x", TRUE_VIN)),
            }
        };

        let sequential = Settings {
            parallel_variants: false,
            ..Settings::default()
        };
        let parallel = Settings::default();

        let a = extract_body_number(&ScriptedEngine::new(script), &page(1000), &sequential);
        let b = extract_body_number(&ScriptedEngine::new(script), &page(1000), &parallel);
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn test_small_region_uses_large_scales() {
        let engine = ScriptedEngine::new(|img, _, _| {
            // 0.52..0.68 of 500 rows = 80 rows, scaled by at least 2.0
            assert!(img.height() >= 160, "height {}", img.height());
            Ok(String::new())
        });
        let settings = Settings {
            parallel_variants: false,
            ..Settings::default()
        };

        assert_eq!(extract_body_number(&engine, &page(500), &settings), None);
        assert_eq!(engine.calls(), 36);
    }

    #[test]
    fn test_nothing_read_is_not_found() {
        let engine = ScriptedEngine::failing();
        assert_eq!(extract_body_number(&engine, &page(1000), &Settings::default()), None);
    }
}
