//! Region selection and image enhancement ahead of OCR.

pub mod clahe;
pub mod enhance;
pub mod region;

pub use clahe::clahe;
pub use enhance::{enhance_contrast, rescale, to_luminance, upscale_if_needed};
pub use region::{extract_region, extract_window};
