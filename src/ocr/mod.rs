pub mod engine;
pub mod setup;

pub use engine::{OcrEngine, OcrError, PageSegMode, TesseractEngine};
pub use setup::{ensure_traineddata, locate_tessdata, locate_tesseract};
