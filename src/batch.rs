//! Batch processing and JSON results.
//!
//! Scans an input directory for certificate images, runs each one through a
//! [`VehicleParser`] and writes the collected results as pretty-printed JSON.
//! A document that cannot be decoded is logged and recorded with every field
//! empty; it never stops the batch.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::document::{ExtractionResult, VehicleParser, file_label};
use crate::ocr::OcrEngine;

/// File extensions (lower-case) treated as certificate images.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "tiff", "tif", "bmp"];

/// Counts of documents where each field was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub reg_numbers_found: usize,
    pub vins_found: usize,
    pub body_numbers_found: usize,
}

impl Statistics {
    pub fn from_results(results: &[ExtractionResult]) -> Self {
        Self {
            reg_numbers_found: results.iter().filter(|r| r.reg_number.is_some()).count(),
            vins_found: results.iter().filter(|r| r.vin.is_some()).count(),
            body_numbers_found: results.iter().filter(|r| r.body_number.is_some()).count(),
        }
    }
}

/// Everything written to the results file.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub documents: Vec<ExtractionResult>,
    pub total_processed: usize,
    pub statistics: Statistics,
    pub version: String,
    pub processed_at: String,
}

impl BatchResult {
    pub fn from_results(documents: Vec<ExtractionResult>) -> Self {
        Self {
            total_processed: documents.len(),
            statistics: Statistics::from_results(&documents),
            documents,
            version: env!("CARGO_PKG_VERSION").to_string(),
            processed_at: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Image files directly inside `dir`, sorted by path.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory {}", dir.display()))?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry.context("Failed to read directory entry")?.path();
        if path.is_file() && is_image_file(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn process_one<E: OcrEngine>(parser: &VehicleParser<E>, path: &Path) -> ExtractionResult {
    info!("Processing {}", path.display());
    match parser.parse_document(path) {
        Ok(result) => result,
        Err(e) => {
            warn!("{}", e);
            ExtractionResult::empty(file_label(path))
        }
    }
}

/// Parses every path, in parallel when the parser's settings allow it.
/// The output order always matches `paths`.
pub fn process_paths<E: OcrEngine>(parser: &VehicleParser<E>, paths: &[PathBuf]) -> Vec<ExtractionResult> {
    if parser.settings().parallel_documents {
        paths.par_iter().map(|path| process_one(parser, path)).collect()
    } else {
        paths.iter().map(|path| process_one(parser, path)).collect()
    }
}

/// Parses every certificate image in `dir`.
pub fn process_directory<E: OcrEngine>(parser: &VehicleParser<E>, dir: &Path) -> Result<BatchResult> {
    let paths = list_images(dir)?;
    info!("Found {} images in {}", paths.len(), dir.display());

    Ok(BatchResult::from_results(process_paths(parser, &paths)))
}

/// Writes `batch` as pretty-printed UTF-8 JSON, creating parent directories.
pub fn save_results(path: &Path, batch: &BatchResult) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(batch).context("Failed to serialize results")?;
    fs::write(path, json).with_context(|| format!("Failed to write results to {}", path.display()))?;

    info!("Results saved to {}", path.display());
    Ok(())
}
