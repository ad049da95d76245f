//! Field extraction for photographed Russian vehicle registration certificates.
//!
//! Each certificate yields up to three fields: the registration plate, the VIN
//! and the body number. Fields are located by fixed vertical bands of the page,
//! enhanced, read with Tesseract and validated against their grammars.

pub mod batch;
pub mod config;
pub mod document;
pub mod extract;
pub mod imaging;
pub mod ocr;
pub mod paths;

pub use batch::{BatchResult, Statistics, process_directory, process_paths, save_results};
pub use config::{ConfigError, Settings};
pub use document::{DocumentError, ExtractionResult, VehicleParser};
pub use ocr::{OcrEngine, OcrError, PageSegMode, TesseractEngine};
