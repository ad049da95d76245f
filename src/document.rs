//! Per-document orchestration.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Settings;
use crate::extract::{self, FieldPatterns};
use crate::ocr::OcrEngine;

/// The three fields read from one certificate. `None` means not found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub file: String,
    pub reg_number: Option<String>,
    pub vin: Option<String>,
    pub body_number: Option<String>,
}

impl ExtractionResult {
    /// Result with every field unset.
    pub fn empty(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    pub fn found_any(&self) -> bool {
        self.reg_number.is_some() || self.vin.is_some() || self.body_number.is_some()
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
}

/// Display name used in results: the file name, or the whole path if it has none.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Runs the three field extractors over decoded certificates.
pub struct VehicleParser<E: OcrEngine> {
    settings: Settings,
    engine: E,
    patterns: FieldPatterns,
}

impl<E: OcrEngine> VehicleParser<E> {
    pub fn new(settings: Settings, engine: E) -> Result<Self, regex::Error> {
        Ok(Self {
            settings,
            engine,
            patterns: FieldPatterns::new()?,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn extract_reg_number(&self, image: &DynamicImage) -> Option<String> {
        extract::extract_reg_number(&self.engine, image, &self.settings, &self.patterns)
    }

    pub fn extract_vin(&self, image: &DynamicImage) -> Option<String> {
        extract::extract_vin(&self.engine, image, &self.settings)
    }

    pub fn extract_body_number(&self, image: &DynamicImage) -> Option<String> {
        extract::extract_body_number(&self.engine, image, &self.settings)
    }

    /// Extracts all three fields from an already decoded image.
    ///
    /// The extractors are independent: the body number is never derived from
    /// the VIN, even though the two usually agree.
    pub fn parse_image(&self, file: &str, image: &DynamicImage) -> ExtractionResult {
        debug!("Parsing {} ({}x{})", file, image.width(), image.height());

        let result = ExtractionResult {
            file: file.to_string(),
            reg_number: self.extract_reg_number(image),
            vin: self.extract_vin(image),
            body_number: self.extract_body_number(image),
        };

        info!(
            "{}: plate={:?} vin={:?} body={:?}",
            file, result.reg_number, result.vin, result.body_number
        );
        result
    }

    /// Decodes the image at `path` and extracts its fields.
    pub fn parse_document(&self, path: &Path) -> Result<ExtractionResult, DocumentError> {
        let image = image::open(path).map_err(|source| DocumentError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.parse_image(&file_label(path), &image))
    }
}
