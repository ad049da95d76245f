//! Extraction settings.
//!
//! Every tunable the pipeline reads lives in [`Settings`]. Settings are loaded
//! from a `config.json` (any subset of keys) and passed by reference through the
//! pipeline; nothing here is global.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// A horizontal band of the page in relative coordinates (0.0 = top, 1.0 = bottom).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionWindow {
    pub start: f64,
    pub end: f64,
}

impl RegionWindow {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(self.start) || !in_range(self.end) || self.start >= self.end {
            return Err(ConfigError::Invalid {
                name,
                reason: format!(
                    "expected 0 <= start < end <= 1, got {:.3}..{:.3}",
                    self.start, self.end
                ),
            });
        }
        Ok(())
    }
}

/// Resampling kernel used when a region is upscaled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpscaleMethod {
    Linear,
    #[default]
    Cubic,
    Lanczos,
}

impl UpscaleMethod {
    pub fn filter(self) -> image::imageops::FilterType {
        use image::imageops::FilterType;
        match self {
            UpscaleMethod::Linear => FilterType::Triangle,
            UpscaleMethod::Cubic => FilterType::CatmullRom,
            UpscaleMethod::Lanczos => FilterType::Lanczos3,
        }
    }
}

/// Clip limit and tile grid for one contrast-enhancement pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContrastPreset {
    pub clip_limit: f32,
    /// Number of tiles along each image axis.
    pub tile_grid: u32,
}

impl ContrastPreset {
    pub const fn new(clip_limit: f32, tile_grid: u32) -> Self {
        Self {
            clip_limit,
            tile_grid,
        }
    }
}

/// The four presets the body-number sweep cycles through.
pub const DEFAULT_CONTRAST_PRESETS: [ContrastPreset; 4] = [
    ContrastPreset::new(2.0, 8),
    ContrastPreset::new(3.0, 8),
    ContrastPreset::new(2.0, 4),
    ContrastPreset::new(1.5, 16),
];

/// Complete extraction configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tesseract language hint, `+`-joined (e.g. "rus+eng")
    pub ocr_lang: String,
    /// Default page segmentation mode for single-pass extraction
    pub ocr_psm: u8,
    /// Per-call OCR timeout in seconds; 0 disables the timeout
    pub ocr_timeout_secs: u64,
    /// Explicit tesseract executable, otherwise looked up on PATH
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory
    pub tessdata_dir: Option<PathBuf>,

    pub clahe_clip_limit: f32,
    pub clahe_tile_size: u32,
    /// Regions shorter than this are upscaled before OCR
    pub min_image_height: u32,
    pub upscale_method: UpscaleMethod,

    pub reg_number_region: RegionWindow,
    pub vin_region: RegionWindow,
    pub body_number_region: RegionWindow,

    pub vin_length: usize,
    pub min_reg_number_length: usize,
    pub max_reg_number_length: usize,
    pub min_reg_number_letters: usize,
    pub max_reg_number_letters: usize,
    pub min_reg_number_digits: usize,
    pub max_reg_number_digits: usize,

    /// PSM modes for the VIN passes
    pub vin_psm_modes: Vec<u8>,
    /// Rewrite a leading "NP" to "WP" in the selected VIN
    pub correct_vin_wmi: bool,

    pub contrast_presets: Vec<ContrastPreset>,
    pub body_scale_factors_tall: Vec<f64>,
    pub body_scale_factors_small: Vec<f64>,
    /// Regions at least this tall use `body_scale_factors_tall`
    pub body_tall_region_min_height: u32,
    pub body_psm_modes: Vec<u8>,

    pub parallel_documents: bool,
    pub parallel_variants: bool,
    /// Size of the rayon pool; `None` keeps rayon's default
    pub max_threads: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ocr_lang: "eng".to_string(),
            ocr_psm: 6,
            ocr_timeout_secs: 30,
            tesseract_path: None,
            tessdata_dir: None,

            clahe_clip_limit: 2.0,
            clahe_tile_size: 8,
            min_image_height: 800,
            upscale_method: UpscaleMethod::Cubic,

            reg_number_region: RegionWindow::new(0.15, 0.30),
            vin_region: RegionWindow::new(0.25, 0.60),
            body_number_region: RegionWindow::new(0.52, 0.68),

            vin_length: 17,
            min_reg_number_length: 8,
            max_reg_number_length: 10,
            min_reg_number_letters: 3,
            max_reg_number_letters: 4,
            min_reg_number_digits: 4,
            max_reg_number_digits: 6,

            vin_psm_modes: vec![3, 6],
            correct_vin_wmi: false,

            contrast_presets: DEFAULT_CONTRAST_PRESETS.to_vec(),
            body_scale_factors_tall: vec![1.0, 1.5, 2.0],
            body_scale_factors_small: vec![2.0, 2.5, 3.0],
            body_tall_region_min_height: 200,
            body_psm_modes: vec![3, 6, 11],

            parallel_documents: true,
            parallel_variants: true,
            max_threads: None,
        }
    }
}

impl Settings {
    /// The contrast preset used by single-pass plate and VIN extraction.
    pub fn default_contrast(&self) -> ContrastPreset {
        ContrastPreset::new(self.clahe_clip_limit, self.clahe_tile_size)
    }

    /// Reads and validates settings from a JSON file. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads `path` if it exists, otherwise returns defaults.
    /// Unreadable or invalid files are logged and replaced by defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("{} not found, using default settings", path.display());
            return Settings::default();
        }

        match Settings::load(path) {
            Ok(settings) => {
                info!("Settings loaded from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("{}. Using default settings.", e);
                Settings::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reg_number_region.validate("reg_number_region")?;
        self.vin_region.validate("vin_region")?;
        self.body_number_region.validate("body_number_region")?;

        if self.ocr_lang.trim().is_empty() {
            return Err(invalid("ocr_lang", "must not be empty"));
        }
        if self.clahe_tile_size == 0 {
            return Err(invalid("clahe_tile_size", "must be at least 1"));
        }
        if self.clahe_clip_limit <= 0.0 {
            return Err(invalid("clahe_clip_limit", "must be positive"));
        }
        if self.min_image_height == 0 {
            return Err(invalid("min_image_height", "must be at least 1"));
        }
        if self.vin_length == 0 {
            return Err(invalid("vin_length", "must be at least 1"));
        }
        if self.min_reg_number_length > self.max_reg_number_length {
            return Err(invalid("min_reg_number_length", "exceeds max_reg_number_length"));
        }
        if self.min_reg_number_letters > self.max_reg_number_letters {
            return Err(invalid("min_reg_number_letters", "exceeds max_reg_number_letters"));
        }
        if self.min_reg_number_digits > self.max_reg_number_digits {
            return Err(invalid("min_reg_number_digits", "exceeds max_reg_number_digits"));
        }
        if let Some(preset) = self
            .contrast_presets
            .iter()
            .find(|p| p.tile_grid == 0 || p.clip_limit <= 0.0)
        {
            return Err(invalid(
                "contrast_presets",
                format!("bad preset {:?}", preset),
            ));
        }
        let bad_scale = |s: &f64| !s.is_finite() || *s <= 0.0;
        if self.body_scale_factors_tall.iter().any(bad_scale)
            || self.body_scale_factors_small.iter().any(bad_scale)
        {
            return Err(invalid("body_scale_factors", "scale factors must be positive"));
        }
        if self.max_threads == Some(0) {
            return Err(invalid("max_threads", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.into(),
    }
}
